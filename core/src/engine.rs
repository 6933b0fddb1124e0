//! PortSweep Engine - synchronous entry point for front ends.
//!
//! Wires the platform adapters into the scan and kill services and drives
//! them on a private single-threaded runtime, so callers never deal with
//! async code. Every call returns a complete value.

use tokio::runtime::{Builder, Runtime};
use tracing::warn;

use crate::adapters::{
    privileges, DiagnosticSource, DirectTerminator, ElevatedTerminator, SocketTableSource,
    SysinfoIdentity,
};
use crate::application::{KillService, PortService, TerminationEngine};
use crate::config::{Config, ConfigStore};
use crate::domain::{port_spec, KillRecord, PortInfo, ProcessRecord, ScanTarget};
use crate::error::Result;
use crate::ports::ProcessIdentity;

type Scanner = PortService<SocketTableSource, DiagnosticSource, SysinfoIdentity>;
type Killer = KillService<SysinfoIdentity, DirectTerminator<SysinfoIdentity>, ElevatedTerminator>;

/// The main PortSweep engine.
///
/// Holds no scan state between calls apart from the short-lived diagnostic
/// output cache. Safe to share across threads; calls serialize on the
/// internal runtime.
pub struct PortSweepEngine {
    scanner: Scanner,
    killer: Killer,
    config: Config,
    runtime: Runtime,
}

impl PortSweepEngine {
    /// Create an engine from the configuration in `~/.portsweep`.
    ///
    /// An unreadable configuration falls back to defaults.
    pub fn new() -> Result<Self> {
        let runtime = Self::build_runtime()?;

        let config = match ConfigStore::new() {
            Ok(store) => runtime.block_on(store.load()).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }),
            Err(e) => {
                warn!(error = %e, "No config location, using defaults");
                Config::default()
            }
        };

        Ok(Self::assemble(config, runtime))
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        let runtime = Self::build_runtime()?;
        Ok(Self::assemble(config, runtime))
    }

    fn build_runtime() -> Result<Runtime> {
        // Use single-threaded runtime - the work is a handful of short I/O calls
        Ok(Builder::new_current_thread().enable_all().build()?)
    }

    fn assemble(config: Config, runtime: Runtime) -> Self {
        let identity = SysinfoIdentity::new(config.protection_policy());

        let scanner = PortService::new(
            SocketTableSource::new(),
            DiagnosticSource::platform_default(
                config.diagnostic_timeout(),
                config.diagnostic_cache_ttl(),
            ),
            identity.clone(),
        );

        let direct = DirectTerminator::with_timing(
            identity.clone(),
            config.kill_grace_period(),
            config.exit_wait(),
        );
        let elevated = ElevatedTerminator::new(config.elevated_kill_timeout());
        let killer = KillService::new(TerminationEngine::new(identity, direct, elevated));

        Self {
            scanner,
            killer,
            config,
            runtime,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Port specs
    // =========================================================================

    /// Parse a port specification such as `"80, 443; 8000-8010"`.
    pub fn parse(&self, text: &str) -> Vec<u16> {
        port_spec::parse(text)
    }

    pub fn is_valid_input(&self, text: &str) -> bool {
        port_spec::is_valid_input(text)
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Scan the given ports, or every socket.
    ///
    /// Never fails; a scan failure is reported as a single "Error" row.
    pub fn scan(&self, target: &ScanTarget) -> Vec<PortInfo> {
        self.runtime.block_on(self.scanner.scan(target))
    }

    /// Parse `text` and scan the resulting ports.
    pub fn scan_spec(&self, text: &str) -> Vec<PortInfo> {
        self.scan(&ScanTarget::Ports(self.parse(text)))
    }

    // =========================================================================
    // Killing
    // =========================================================================

    /// Kill each distinct pid, one record per pid.
    pub fn kill_many(&self, pids: &[u32]) -> Vec<KillRecord> {
        self.runtime.block_on(self.killer.kill_many(pids))
    }

    /// Kill the owners of scanned rows.
    pub fn kill_by_port_infos(&self, port_infos: &[PortInfo]) -> Vec<KillRecord> {
        self.runtime.block_on(self.killer.kill_by_port_infos(port_infos))
    }

    pub fn can_kill(&self, pid: u32) -> bool {
        self.killer.engine().can_kill(pid)
    }

    pub fn requires_elevation(&self, pid: u32) -> bool {
        self.killer.engine().requires_elevation(pid)
    }

    // =========================================================================
    // Processes and privileges
    // =========================================================================

    pub fn is_current_user_administrator(&self) -> bool {
        privileges::is_current_user_administrator()
    }

    /// Every visible process, sorted by pid.
    pub fn list_processes(&self) -> Vec<ProcessRecord> {
        self.killer.engine().identity().list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::KillOutcome;

    fn engine() -> PortSweepEngine {
        PortSweepEngine::with_config(Config::default()).unwrap()
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PortSweepEngine>();
    }

    #[test]
    fn test_parse_through_engine() {
        let engine = engine();
        assert_eq!(engine.parse("443, 80,80"), vec![80, 443]);
        assert!(engine.is_valid_input("8080"));
        assert!(!engine.is_valid_input("abc"));
    }

    #[test]
    fn test_scan_always_returns_rows() {
        let engine = engine();
        let rows = engine.scan(&ScanTarget::Ports(vec![1, 2]));
        assert!(!rows.is_empty());
        assert!(rows.windows(2).all(|w| w[0].port <= w[1].port));
    }

    #[test]
    fn test_kill_reserved_pid_is_protected_or_missing() {
        let engine = engine();
        assert!(!engine.can_kill(1));
        let records = engine.kill_many(&[1, 1]);
        assert_eq!(records.len(), 1);
        assert!(matches!(
            records[0].outcome,
            KillOutcome::ProtectedProcess | KillOutcome::ProcessNotFound
        ));
    }

    #[test]
    fn test_list_processes_includes_self() {
        let engine = engine();
        let pid = std::process::id();
        assert!(engine.list_processes().iter().any(|p| p.pid == pid));
    }
}
