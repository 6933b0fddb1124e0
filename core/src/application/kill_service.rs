//! Termination: the per-pid escalation engine and the batch driver.
//!
//! ```text
//! Requested
//!   ├─ pid 0 / not found ──────────────► ProcessNotFound
//!   ├─ protected ──────────────────────► ProtectedProcess
//!   └─ direct terminate
//!        ├─ ok / vanished ─────────────► Success
//!        ├─ other failure ─────────────► UnknownError
//!        └─ access denied ─► elevated terminate
//!                              ├─ ok ──────────► Success
//!                              ├─ declined ────► AccessDenied
//!                              └─ other ───────► UnknownError
//! ```

use std::collections::HashSet;

use chrono::Local;
use tracing::{debug, warn};

use crate::adapters::privileges;
use crate::domain::{
    same_process_name, KillOutcome, KillRecord, PortInfo, ProcessRecord, MAX_RESERVED_PID,
    UNKNOWN_PROCESS,
};
use crate::ports::{ProcessIdentity, ResolveError, TerminateError, Terminator};

/// Result of the checks that run before any signal is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precheck {
    /// pid 0, or no such process.
    NotFound,
    /// The process must never be terminated.
    Protected(ProcessRecord),
    /// The process may be terminated.
    Killable(ProcessRecord),
}

impl Precheck {
    /// Name for reports, "Unknown" when the process was not found.
    pub fn process_name(&self) -> &str {
        match self {
            Precheck::NotFound => UNKNOWN_PROCESS,
            Precheck::Protected(p) | Precheck::Killable(p) => &p.name,
        }
    }

    /// The terminal outcome, if the checks already decide it.
    pub fn outcome(&self) -> Option<KillOutcome> {
        match self {
            Precheck::NotFound => Some(KillOutcome::ProcessNotFound),
            Precheck::Protected(_) => Some(KillOutcome::ProtectedProcess),
            Precheck::Killable(_) => None,
        }
    }
}

/// Kills one process, escalating from direct to elevated termination.
pub struct TerminationEngine<I, D, E>
where
    I: ProcessIdentity,
    D: Terminator,
    E: Terminator,
{
    identity: I,
    direct: D,
    elevated: E,
    is_administrator: bool,
}

impl<I, D, E> TerminationEngine<I, D, E>
where
    I: ProcessIdentity,
    D: Terminator,
    E: Terminator,
{
    pub fn new(identity: I, direct: D, elevated: E) -> Self {
        Self {
            identity,
            direct,
            elevated,
            is_administrator: privileges::is_current_user_administrator(),
        }
    }

    /// Override the administrator flag captured at construction.
    pub fn with_administrator(mut self, is_administrator: bool) -> Self {
        self.is_administrator = is_administrator;
        self
    }

    pub fn identity(&self) -> &I {
        &self.identity
    }

    pub fn is_administrator(&self) -> bool {
        self.is_administrator
    }

    /// Checks shared by `can_kill` and `kill`.
    pub fn precheck(&self, pid: u32) -> Precheck {
        if pid == 0 {
            return Precheck::NotFound;
        }

        let record = match self.identity.resolve(pid) {
            Ok(record) => record,
            Err(ResolveError::NotFound(_)) => return Precheck::NotFound,
            // Exists but cannot be inspected; only the pid rule applies.
            Err(ResolveError::AccessDenied(_)) => ProcessRecord {
                pid,
                name: UNKNOWN_PROCESS.to_string(),
                executable_path: String::new(),
                session_id: None,
                is_protected: pid <= MAX_RESERVED_PID,
            },
        };

        if record.is_protected {
            Precheck::Protected(record)
        } else {
            Precheck::Killable(record)
        }
    }

    /// Whether `kill` would attempt termination at all.
    pub fn can_kill(&self, pid: u32) -> bool {
        matches!(self.precheck(pid), Precheck::Killable(_))
    }

    /// Whether terminating `pid` will need the elevated path.
    pub fn requires_elevation(&self, pid: u32) -> bool {
        match self.precheck(pid) {
            Precheck::NotFound => false,
            Precheck::Protected(_) => true,
            Precheck::Killable(record) => {
                privileges::requires_elevation(&record, self.is_administrator)
            }
        }
    }

    /// Kill one pid. The record is timestamped when the attempt finishes.
    pub async fn kill(&self, pid: u32) -> KillRecord {
        self.kill_expecting(pid, UNKNOWN_PROCESS).await
    }

    /// Kill one pid only if it still runs the program named `expected`.
    ///
    /// A killable process under a different name means the pid was reused
    /// since `expected` was observed; it is reported as `ProcessNotFound`
    /// and never signalled. `"Unknown"` disables the name check.
    pub async fn kill_expecting(&self, pid: u32, expected: &str) -> KillRecord {
        let precheck = self.precheck(pid);
        let mut process_name = precheck.process_name().to_string();

        let reused = matches!(&precheck, Precheck::Killable(record)
            if expected != UNKNOWN_PROCESS && !same_process_name(&record.name, expected));

        let (outcome, detail) = match precheck.outcome() {
            Some(outcome) => {
                debug!(pid = pid, outcome = ?outcome, "Kill rejected before termination");
                (outcome, None)
            }
            None if reused => {
                warn!(
                    pid = pid,
                    expected = expected,
                    found = %process_name,
                    "Pid now belongs to a different process, not killing"
                );
                process_name = expected.to_string();
                (KillOutcome::ProcessNotFound, None)
            }
            None => self.terminate(pid).await,
        };

        KillRecord {
            pid,
            process_name,
            outcome,
            timestamp: Local::now(),
            detail,
        }
    }

    async fn terminate(&self, pid: u32) -> (KillOutcome, Option<String>) {
        match self.direct.terminate(pid).await {
            Ok(()) => {
                debug!(pid = pid, strategy = self.direct.name(), "Process terminated");
                (KillOutcome::Success, None)
            }
            Err(TerminateError::NotFound(_)) => {
                debug!(pid = pid, "Process exited before it was signalled");
                (KillOutcome::Success, None)
            }
            Err(TerminateError::AccessDenied(_)) => {
                debug!(pid = pid, "Direct termination denied, escalating");
                self.escalate(pid).await
            }
            Err(e) => {
                warn!(pid = pid, error = %e, "Direct termination failed");
                (KillOutcome::UnknownError, Some(e.to_string()))
            }
        }
    }

    async fn escalate(&self, pid: u32) -> (KillOutcome, Option<String>) {
        match self.elevated.terminate(pid).await {
            Ok(()) | Err(TerminateError::NotFound(_)) => {
                debug!(pid = pid, strategy = self.elevated.name(), "Process terminated");
                (KillOutcome::Success, None)
            }
            Err(TerminateError::Declined(_)) | Err(TerminateError::AccessDenied(_)) => {
                warn!(pid = pid, "Elevated termination was not permitted");
                (KillOutcome::AccessDenied, None)
            }
            Err(e) => {
                warn!(pid = pid, error = %e, "Elevated termination failed");
                (KillOutcome::UnknownError, Some(e.to_string()))
            }
        }
    }
}

/// Drives the termination engine over a batch of pids.
pub struct KillService<I, D, E>
where
    I: ProcessIdentity,
    D: Terminator,
    E: Terminator,
{
    engine: TerminationEngine<I, D, E>,
}

impl<I, D, E> KillService<I, D, E>
where
    I: ProcessIdentity,
    D: Terminator,
    E: Terminator,
{
    pub fn new(engine: TerminationEngine<I, D, E>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &TerminationEngine<I, D, E> {
        &self.engine
    }

    /// One record per distinct pid, in first-occurrence order.
    ///
    /// Attempts run one after another; a failure never stops the batch.
    pub async fn kill_many(&self, pids: &[u32]) -> Vec<KillRecord> {
        let targets = dedup_pids(pids.iter().copied());
        debug!(requested = pids.len(), distinct = targets.len(), "Killing batch");

        let mut records = Vec::with_capacity(targets.len());
        for pid in targets {
            records.push(self.engine.kill(pid).await);
        }
        records
    }

    /// Kill the owners of the given rows, skipping free and synthetic ones.
    ///
    /// Each pid is killed only while it still runs the program the row was
    /// scanned with.
    pub async fn kill_by_port_infos(&self, port_infos: &[PortInfo]) -> Vec<KillRecord> {
        let mut seen = HashSet::new();
        let targets: Vec<(u32, &str)> = port_infos
            .iter()
            .filter(|p| p.has_owner() && seen.insert(p.pid))
            .map(|p| (p.pid, p.process_name.as_str()))
            .collect();
        debug!(rows = port_infos.len(), distinct = targets.len(), "Killing port owners");

        let mut records = Vec::with_capacity(targets.len());
        for (pid, expected) in targets {
            records.push(self.engine.kill_expecting(pid, expected).await);
        }
        records
    }
}

/// Deduplicate, keeping first-occurrence order.
pub fn dedup_pids(pids: impl IntoIterator<Item = u32>) -> Vec<u32> {
    let mut seen = HashSet::new();
    pids.into_iter().filter(|pid| seen.insert(*pid)).collect()
}
