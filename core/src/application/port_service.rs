//! Port scanning application service.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use super::reconcile::reconcile;
use crate::domain::{ConnectionRecord, PortInfo, ScanTarget, UNKNOWN_PROCESS};
use crate::error::{Error, Result};
use crate::ports::{ConnectionSource, ProcessIdentity};

/// Pid to process name, resolved once per scan.
pub type NameLookup = HashMap<u32, String>;

/// Application service for port scanning operations.
///
/// Queries both connection sources, reconciles them, resolves each distinct
/// pid once and builds the per-port report. Sources and identity are
/// injected, so any of them can be replaced in tests.
pub struct PortService<S, D, I>
where
    S: ConnectionSource,
    D: ConnectionSource,
    I: ProcessIdentity,
{
    structured: S,
    diagnostic: D,
    identity: I,
}

impl<S, D, I> PortService<S, D, I>
where
    S: ConnectionSource,
    D: ConnectionSource,
    I: ProcessIdentity,
{
    /// Create a new port service over the given sources.
    pub fn new(structured: S, diagnostic: D, identity: I) -> Self {
        Self {
            structured,
            diagnostic,
            identity,
        }
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    /// The reconciled connection list.
    ///
    /// Fails only when both sources fail. A diagnostic failure on its own
    /// counts as an empty diagnostic list.
    pub async fn connections(&self) -> Result<Vec<ConnectionRecord>> {
        let (structured, diagnostic) =
            tokio::join!(self.structured.connections(), self.diagnostic.connections());

        match (structured, diagnostic) {
            (Err(s), Err(d)) => {
                warn!(structured = %s, diagnostic = %d, "All connection sources failed");
                Err(Error::SourcesUnavailable {
                    structured: s.to_string(),
                    diagnostic: d.to_string(),
                })
            }
            (structured, Ok(diagnostic)) => Ok(reconcile(structured, diagnostic)),
            (structured, Err(d)) => {
                warn!(source = self.diagnostic.name(), error = %d, "Diagnostic source failed");
                Ok(reconcile(structured, Vec::new()))
            }
        }
    }

    /// Run one scan. Never fails: a scan failure becomes a single error row.
    pub async fn scan(&self, target: &ScanTarget) -> Vec<PortInfo> {
        let scanned_at = Local::now();

        let connections = match self.connections().await {
            Ok(connections) => connections,
            Err(e) => return vec![PortInfo::error(e.to_string(), scanned_at)],
        };

        let names = self.resolve_names(&connections);
        let rows = match target {
            ScanTarget::Ports(ports) => build_port_infos(ports, &connections, &names, scanned_at),
            ScanTarget::All => build_all(&connections, &names, scanned_at),
        };
        debug!(rows = rows.len(), "Scan complete");
        rows
    }

    /// Resolve each distinct non-zero pid once.
    fn resolve_names(&self, connections: &[ConnectionRecord]) -> NameLookup {
        let mut names = NameLookup::new();
        for pid in connections.iter().map(|c| c.pid).filter(|&pid| pid > 0) {
            names.entry(pid).or_insert_with(|| match self.identity.resolve(pid) {
                Ok(record) => record.name,
                Err(e) => {
                    debug!(pid = pid, error = %e, "Could not resolve process");
                    UNKNOWN_PROCESS.to_string()
                }
            });
        }
        names
    }
}

fn name_for(pid: u32, names: &NameLookup) -> String {
    if pid == 0 {
        return UNKNOWN_PROCESS.to_string();
    }
    names
        .get(&pid)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_PROCESS.to_string())
}

/// Report for the requested ports.
///
/// A port with no connection gets one "available" row; otherwise there is
/// one row per connection. Sorted by port, stable within a port.
pub fn build_port_infos(
    ports: &[u16],
    connections: &[ConnectionRecord],
    names: &NameLookup,
    scanned_at: DateTime<Local>,
) -> Vec<PortInfo> {
    let mut rows = Vec::new();
    for &port in ports {
        let owners: Vec<&ConnectionRecord> =
            connections.iter().filter(|c| c.local_port == port).collect();

        if owners.is_empty() {
            rows.push(PortInfo::available(port, scanned_at));
        } else {
            rows.extend(
                owners
                    .into_iter()
                    .map(|c| PortInfo::owned(c, name_for(c.pid, names), scanned_at)),
            );
        }
    }
    rows.sort_by_key(|r| r.port);
    rows
}

/// Report over every connection, one row each, sorted by port.
pub fn build_all(
    connections: &[ConnectionRecord],
    names: &NameLookup,
    scanned_at: DateTime<Local>,
) -> Vec<PortInfo> {
    let mut rows: Vec<PortInfo> = connections
        .iter()
        .map(|c| PortInfo::owned(c, name_for(c.pid, names), scanned_at))
        .collect();
    rows.sort_by_key(|r| r.port);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProcessRecord, Protocol, NOT_IN_USE, STATE_AVAILABLE, STATE_ERROR};
    use crate::ports::{ResolveError, SourceError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock source returning a fixed list, or failing.
    struct MockSource {
        records: Option<Vec<ConnectionRecord>>,
    }

    impl MockSource {
        fn ok(records: Vec<ConnectionRecord>) -> Self {
            Self {
                records: Some(records),
            }
        }

        fn failing() -> Self {
            Self { records: None }
        }
    }

    impl ConnectionSource for MockSource {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn connections(&self) -> std::result::Result<Vec<ConnectionRecord>, SourceError> {
            self.records.clone().ok_or(SourceError::Unsupported)
        }
    }

    /// Mock identity resolving from a fixed table, counting lookups.
    struct MockIdentity {
        processes: Vec<(u32, &'static str)>,
        lookups: AtomicUsize,
    }

    impl MockIdentity {
        fn new(processes: Vec<(u32, &'static str)>) -> Self {
            Self {
                processes,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    impl ProcessIdentity for MockIdentity {
        fn resolve(&self, pid: u32) -> std::result::Result<ProcessRecord, ResolveError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.processes
                .iter()
                .find(|(p, _)| *p == pid)
                .map(|(p, name)| ProcessRecord {
                    pid: *p,
                    name: name.to_string(),
                    executable_path: String::new(),
                    session_id: None,
                    is_protected: false,
                })
                .ok_or(ResolveError::NotFound(pid))
        }

        fn list(&self) -> Vec<ProcessRecord> {
            Vec::new()
        }

        fn is_running(&self, pid: u32) -> bool {
            self.processes.iter().any(|(p, _)| *p == pid)
        }
    }

    fn listener(port: u16, pid: u32) -> ConnectionRecord {
        ConnectionRecord::listener(Protocol::Tcp, "0.0.0.0", port, pid)
    }

    #[tokio::test]
    async fn test_scan_requested_ports() {
        let service = PortService::new(
            MockSource::ok(vec![listener(443, 500)]),
            MockSource::ok(vec![]),
            MockIdentity::new(vec![(500, "nginx")]),
        );

        let rows = service.scan(&ScanTarget::Ports(vec![80, 443])).await;
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].port, 80);
        assert_eq!(rows[0].pid, 0);
        assert_eq!(rows[0].process_name, NOT_IN_USE);
        assert_eq!(rows[0].protocol_label(), "");
        assert_eq!(rows[0].state, STATE_AVAILABLE);

        assert_eq!(rows[1].port, 443);
        assert_eq!(rows[1].pid, 500);
        assert_eq!(rows[1].process_name, "nginx");
        assert_eq!(rows[1].protocol_label(), "TCP");
        assert_eq!(rows[1].state, "LISTENING");
    }

    #[tokio::test]
    async fn test_scan_pid_from_diagnostic_source() {
        let service = PortService::new(
            MockSource::ok(vec![listener(443, 0)]),
            MockSource::ok(vec![listener(443, 1234)]),
            MockIdentity::new(vec![(1234, "caddy")]),
        );

        let rows = service.scan(&ScanTarget::Ports(vec![443])).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pid, 1234);
        assert_eq!(rows[0].process_name, "caddy");
    }

    #[tokio::test]
    async fn test_scan_both_sources_failing_gives_one_error_row() {
        let service = PortService::new(
            MockSource::failing(),
            MockSource::failing(),
            MockIdentity::new(vec![]),
        );

        let rows = service.scan(&ScanTarget::Ports(vec![80, 443, 8080])).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, STATE_ERROR);
        assert_eq!(rows[0].port, 0);
        assert!(rows[0].protocol.is_none());
        assert!(rows[0].process_name.contains("not supported"));
    }

    #[tokio::test]
    async fn test_scan_with_failed_diagnostic_uses_structured_rows() {
        let service = PortService::new(
            MockSource::ok(vec![listener(443, 500), listener(5432, 77)]),
            MockSource::failing(),
            MockIdentity::new(vec![(500, "nginx"), (77, "postgres")]),
        );

        let rows = service.scan(&ScanTarget::All).await;
        let summary: Vec<(u16, &str)> = rows
            .iter()
            .map(|r| (r.port, r.process_name.as_str()))
            .collect();
        assert_eq!(summary, vec![(443, "nginx"), (5432, "postgres")]);
        assert!(rows.iter().all(|r| r.state != STATE_ERROR));

        let requested = service.scan(&ScanTarget::Ports(vec![80, 443])).await;
        assert_eq!(requested.len(), 2);
        assert_eq!(requested[0].state, STATE_AVAILABLE);
        assert_eq!(requested[1].pid, 500);
    }

    #[tokio::test]
    async fn test_scan_falls_back_to_diagnostic() {
        let service = PortService::new(
            MockSource::failing(),
            MockSource::ok(vec![listener(3000, 42)]),
            MockIdentity::new(vec![(42, "node")]),
        );

        let rows = service.scan(&ScanTarget::All).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].process_name, "node");
    }

    #[tokio::test]
    async fn test_scan_resolves_each_pid_once() {
        let mut established = listener(8080, 42);
        established.state = "ESTABLISHED".to_string();

        let service = PortService::new(
            MockSource::ok(vec![listener(8080, 42), established, listener(8081, 42)]),
            MockSource::ok(vec![]),
            MockIdentity::new(vec![(42, "node")]),
        );

        let rows = service.scan(&ScanTarget::All).await;
        assert_eq!(rows.len(), 3);
        assert_eq!(service.identity().lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_build_unknown_names() {
        let connections = vec![listener(22, 0), listener(25, 99)];
        let rows = build_all(&connections, &NameLookup::new(), Local::now());
        assert!(rows.iter().all(|r| r.process_name == UNKNOWN_PROCESS));
    }

    #[test]
    fn test_build_sorted_and_stable_within_port() {
        let mut v6 = listener(443, 8);
        v6.local_address = "::".to_string();
        let connections = vec![listener(8080, 3), listener(443, 7), v6];

        let rows = build_port_infos(&[8080, 443], &connections, &NameLookup::new(), Local::now());
        let summary: Vec<(u16, u32)> = rows.iter().map(|r| (r.port, r.pid)).collect();
        assert_eq!(summary, vec![(443, 7), (443, 8), (8080, 3)]);
    }
}
