//! Diagnostic-command connection source.
//!
//! Runs `netstat -ano` (Windows) or `ss -Htunap` (Linux) and parses one
//! socket per line. The raw output is cached for a short TTL so a burst of
//! scans spawns the command once.

use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::adapters::cache::{DiagnosticCache, Snapshot};
use crate::domain::{normalize_tcp_state, ConnectionRecord, Protocol, STATE_LISTENING};
use crate::ports::{Clock, CommandRunner, ConnectionSource, SourceError, SystemClock};

// ============================================================================
// Dialects
// ============================================================================

/// Output format of the diagnostic command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Windows `netstat -ano`: `proto local remote [state] pid`.
    Netstat,
    /// Linux `ss -Htunap`: `netid state recv-q send-q local peer users:((..))`.
    Ss,
}

impl Dialect {
    /// The dialect of the platform's diagnostic tool, if it has one.
    pub fn platform_default() -> Option<Self> {
        if cfg!(windows) {
            Some(Dialect::Netstat)
        } else if cfg!(target_os = "linux") {
            Some(Dialect::Ss)
        } else {
            None
        }
    }

    /// Program and arguments that produce this dialect.
    pub fn command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Dialect::Netstat => ("netstat", &["-ano"]),
            Dialect::Ss => ("ss", &["-Htunap"]),
        }
    }

    /// Parse a whole output, skipping lines that do not describe a socket.
    pub fn parse(&self, output: &str) -> Vec<ConnectionRecord> {
        let parse_line = match self {
            Dialect::Netstat => parse_netstat_line,
            Dialect::Ss => parse_ss_line,
        };

        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let record = parse_line(line);
                if record.is_none() {
                    trace!(line = line, "Skipping diagnostic line");
                }
                record
            })
            .collect()
    }
}

/// Parse a line of `netstat -ano` output.
///
/// ```text
///   Proto  Local Address          Foreign Address        State           PID
///   TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020
///   TCP    [::]:445               [::]:0                 LISTENING       4
///   UDP    0.0.0.0:5353           *:*                                    2212
/// ```
fn parse_netstat_line(line: &str) -> Option<ConnectionRecord> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let protocol = Protocol::parse(parts.first()?)?;
    let (local_address, local_port) = split_endpoint(parts.get(1)?)?;
    let (remote_address, remote_port) = parts
        .get(2)
        .map(|r| split_endpoint_lenient(r))
        .unwrap_or_else(|| ("0.0.0.0".to_string(), 0));

    // UDP has no state column, so the pid moves one field left.
    let (state, pid_field) = match protocol {
        Protocol::Udp => (STATE_LISTENING.to_string(), parts.get(3)?),
        Protocol::Tcp => (normalize_tcp_state(parts.get(3)?), parts.get(4)?),
    };
    let pid: u32 = pid_field.parse().ok()?;

    Some(ConnectionRecord {
        local_address,
        local_port,
        remote_address,
        remote_port,
        protocol,
        state,
        pid,
    })
}

fn ss_pid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"pid=(\d+)").expect("pid pattern is valid"))
}

/// Parse a line of `ss -Htunap` output.
///
/// ```text
/// tcp   LISTEN 0      4096   127.0.0.53%lo:53    0.0.0.0:*    users:(("systemd-resolve",pid=640,fd=14))
/// udp   UNCONN 0      0            0.0.0.0:5353  0.0.0.0:*
/// ```
///
/// `ss` hides the process column for sockets of other users, in which case
/// the pid is 0.
fn parse_ss_line(line: &str) -> Option<ConnectionRecord> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 6 {
        return None;
    }

    let protocol = Protocol::parse(parts[0])?;
    let (local_address, local_port) = split_endpoint(parts[4])?;
    let (remote_address, remote_port) = split_endpoint_lenient(parts[5]);

    let state = match protocol {
        Protocol::Udp => STATE_LISTENING.to_string(),
        Protocol::Tcp => normalize_tcp_state(parts[1]),
    };

    let pid = parts[6..]
        .iter()
        .find_map(|field| ss_pid_regex().captures(field))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0);

    Some(ConnectionRecord {
        local_address,
        local_port,
        remote_address,
        remote_port,
        protocol,
        state,
        pid,
    })
}

/// Split `address:port` on the last colon.
///
/// IPv6 brackets and `%zone` suffixes are removed from the address.
fn split_endpoint(endpoint: &str) -> Option<(String, u16)> {
    let colon = endpoint.rfind(':')?;
    let port: u16 = endpoint[colon + 1..].parse().ok()?;
    Some((clean_address(&endpoint[..colon]), port))
}

/// Like `split_endpoint`, but `*:*` and other odd remotes map to port 0.
fn split_endpoint_lenient(endpoint: &str) -> (String, u16) {
    match endpoint.rfind(':') {
        Some(colon) => (
            clean_address(&endpoint[..colon]),
            endpoint[colon + 1..].parse().unwrap_or(0),
        ),
        None => (clean_address(endpoint), 0),
    }
}

fn clean_address(address: &str) -> String {
    let address = address
        .strip_prefix('[')
        .and_then(|a| a.strip_suffix(']'))
        .unwrap_or(address);
    let address = address.split('%').next().unwrap_or(address);
    if address.is_empty() {
        "*".to_string()
    } else {
        address.to_string()
    }
}

// ============================================================================
// Command runner
// ============================================================================

/// Runs a real external command.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    program: String,
    args: Vec<String>,
}

impl SystemCommandRunner {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Runner for the command that produces `dialect`.
    pub fn for_dialect(dialect: Dialect) -> Self {
        let (program, args) = dialect.command();
        Self::new(program, args.iter().copied())
    }
}

impl CommandRunner for SystemCommandRunner {
    async fn run(&self, timeout: Duration) -> Result<String, SourceError> {
        debug!(program = %self.program, "Running diagnostic command");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let child = command.spawn().map_err(|e| SourceError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;

        // On timeout the child is dropped with the future, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SourceError::Spawn {
                    program: self.program.clone(),
                    source: e,
                })
            }
            Err(_) => {
                warn!(program = %self.program, timeout = ?timeout, "Diagnostic command timed out");
                return Err(SourceError::Timeout(timeout));
            }
        };

        if !output.status.success() {
            return Err(SourceError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ============================================================================
// Source
// ============================================================================

/// Connection source over a cached diagnostic command.
pub struct DiagnosticSource<R: CommandRunner = SystemCommandRunner, C: Clock = SystemClock> {
    runner: R,
    dialect: Option<Dialect>,
    cache: DiagnosticCache<C>,
    timeout: Duration,
}

impl DiagnosticSource {
    /// The platform's diagnostic tool on the system clock.
    pub fn platform_default(timeout: Duration, cache_ttl: Duration) -> Self {
        let dialect = Dialect::platform_default();
        let runner = SystemCommandRunner::for_dialect(dialect.unwrap_or(Dialect::Netstat));
        Self {
            runner,
            dialect,
            cache: DiagnosticCache::new(cache_ttl),
            timeout,
        }
    }
}

impl<R: CommandRunner, C: Clock> DiagnosticSource<R, C> {
    pub fn new(runner: R, dialect: Dialect, cache: DiagnosticCache<C>, timeout: Duration) -> Self {
        Self {
            runner,
            dialect: Some(dialect),
            cache,
            timeout,
        }
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// Raw command output, from cache when fresh.
    pub async fn raw(&self) -> Result<Arc<Snapshot>, SourceError> {
        if self.dialect.is_none() {
            return Err(SourceError::Unsupported);
        }
        self.cache
            .get_or_refresh(|| self.runner.run(self.timeout))
            .await
    }
}

impl<R: CommandRunner, C: Clock> ConnectionSource for DiagnosticSource<R, C> {
    fn name(&self) -> &'static str {
        "diagnostic"
    }

    async fn connections(&self) -> Result<Vec<ConnectionRecord>, SourceError> {
        let dialect = self.dialect.ok_or(SourceError::Unsupported)?;
        let snapshot = self.raw().await?;
        let records = dialect.parse(&snapshot.raw);
        debug!(count = records.len(), "Parsed diagnostic output");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::test_clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NETSTAT_OUTPUT: &str = r#"
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1020
  TCP    [::]:445               [::]:0                 LISTENING       4
  TCP    127.0.0.1:3000         127.0.0.1:52144        ESTABLISHED     5432
  TCP    [fe80::1%4]:8080       [::]:0                 LISTENING       8080
  UDP    0.0.0.0:5353           *:*                                    2212
  UDP    [::]:123               *:*                                    980
  TCP    0.0.0.0:notaport       0.0.0.0:0              LISTENING       1
  TCP    0.0.0.0:22             0.0.0.0:0              LISTENING       abc
"#;

    const SS_OUTPUT: &str = r#"tcp   LISTEN 0      4096   127.0.0.53%lo:53        0.0.0.0:*     users:(("systemd-resolve",pid=640,fd=14))
tcp   ESTAB  0      0      192.168.1.5:22          192.168.1.9:51000  users:(("sshd",pid=1200,fd=4))
tcp   LISTEN 0      511    [::ffff:127.0.0.1]:3000      *:*
udp   UNCONN 0      0            0.0.0.0:5353       0.0.0.0:*     users:(("avahi-daemon",pid=700,fd=12))
tcp   LISTEN 0      128    garbage                 0.0.0.0:*
"#;

    #[test]
    fn test_parse_netstat_output() {
        let records = Dialect::Netstat.parse(NETSTAT_OUTPUT);
        assert_eq!(records.len(), 6);

        let rpc = &records[0];
        assert_eq!(rpc.local_port, 135);
        assert_eq!(rpc.protocol, Protocol::Tcp);
        assert_eq!(rpc.state, "LISTENING");
        assert_eq!(rpc.pid, 1020);

        assert_eq!(records[1].local_address, "::");
        assert_eq!(records[1].local_port, 445);

        let established = &records[2];
        assert_eq!(established.state, "ESTABLISHED");
        assert_eq!(established.remote_address, "127.0.0.1");
        assert_eq!(established.remote_port, 52144);

        assert_eq!(records[3].local_address, "fe80::1");
    }

    #[test]
    fn test_parse_netstat_udp_pid_column() {
        let records = Dialect::Netstat.parse(NETSTAT_OUTPUT);
        let udp: Vec<_> = records.iter().filter(|r| r.protocol == Protocol::Udp).collect();
        assert_eq!(udp.len(), 2);
        assert_eq!(udp[0].local_port, 5353);
        assert_eq!(udp[0].state, "LISTENING");
        assert_eq!(udp[0].pid, 2212);
        assert_eq!(udp[0].remote_port, 0);
        assert_eq!(udp[1].pid, 980);
    }

    #[test]
    fn test_netstat_splits_on_last_colon() {
        let record = parse_netstat_line("TCP [2001:db8::7]:8443 [::]:0 LISTENING 77").unwrap();
        assert_eq!(record.local_address, "2001:db8::7");
        assert_eq!(record.local_port, 8443);
    }

    #[test]
    fn test_netstat_lowercase_protocol() {
        let record = parse_netstat_line("tcp 0.0.0.0:80 0.0.0.0:0 LISTENING 900").unwrap();
        assert_eq!(record.protocol, Protocol::Tcp);
    }

    #[test]
    fn test_netstat_skips_truncated_lines() {
        assert!(parse_netstat_line("TCP 0.0.0.0:80 0.0.0.0:0 LISTENING").is_none());
        assert!(parse_netstat_line("UDP 0.0.0.0:53 *:*").is_none());
        assert!(parse_netstat_line("Proto Local Address").is_none());
    }

    #[test]
    fn test_parse_ss_output() {
        let records = Dialect::Ss.parse(SS_OUTPUT);
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].local_address, "127.0.0.53");
        assert_eq!(records[0].local_port, 53);
        assert_eq!(records[0].state, "LISTENING");
        assert_eq!(records[0].pid, 640);

        assert_eq!(records[1].state, "ESTABLISHED");
        assert_eq!(records[1].remote_port, 51000);
        assert_eq!(records[1].pid, 1200);

        // Process column hidden for another user's socket.
        assert_eq!(records[2].local_address, "::ffff:127.0.0.1");
        assert_eq!(records[2].pid, 0);

        assert_eq!(records[3].protocol, Protocol::Udp);
        assert_eq!(records[3].state, "LISTENING");
        assert_eq!(records[3].pid, 700);
    }

    /// Runner returning canned output and counting invocations.
    struct CannedRunner {
        output: Result<String, ()>,
        calls: AtomicUsize,
    }

    impl CannedRunner {
        fn ok(output: &str) -> Self {
            Self {
                output: Ok(output.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn timing_out() -> Self {
            Self {
                output: Err(()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CommandRunner for CannedRunner {
        async fn run(&self, timeout: Duration) -> Result<String, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.output.clone().map_err(|_| SourceError::Timeout(timeout))
        }
    }

    fn source(runner: CannedRunner, clock: ManualClock) -> DiagnosticSource<CannedRunner, ManualClock> {
        DiagnosticSource::new(
            runner,
            Dialect::Netstat,
            DiagnosticCache::with_clock(Duration::from_secs(1), clock),
            Duration::from_secs(8),
        )
    }

    #[tokio::test]
    async fn test_source_caches_within_ttl() {
        let clock = ManualClock::new();
        let source = source(CannedRunner::ok(NETSTAT_OUTPUT), clock.clone());

        let first = source.connections().await.unwrap();
        let second = source.connections().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.runner.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_millis(1500));
        source.connections().await.unwrap();
        assert_eq!(source.runner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_source_timeout_is_an_error_not_a_hang() {
        let source = source(CannedRunner::timing_out(), ManualClock::new());
        let result = source.connections().await;
        assert!(matches!(result, Err(SourceError::Timeout(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_kills_on_timeout() {
        let runner = SystemCommandRunner::new("sleep", ["5"]);
        let started = std::time::Instant::now();
        let result = runner.run(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(SourceError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_system_runner_reports_missing_program() {
        let runner = SystemCommandRunner::new("definitely-not-a-real-program-42", Vec::<String>::new());
        let result = runner.run(Duration::from_secs(1)).await;
        assert!(matches!(result, Err(SourceError::Spawn { .. })));
    }
}
