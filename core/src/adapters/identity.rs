//! Process identity adapter built on `sysinfo`.

use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::trace;

use crate::domain::{ProcessRecord, ProtectionPolicy};
use crate::ports::{ProcessIdentity, ResolveError};

/// Resolves pids through a fresh `sysinfo` refresh on every call.
///
/// `sysinfo` lists processes of other users without error; when their
/// executable cannot be read the record has an empty `executable_path`.
/// `ResolveError::AccessDenied` is therefore never returned.
#[derive(Debug, Clone, Default)]
pub struct SysinfoIdentity {
    policy: ProtectionPolicy,
}

impl SysinfoIdentity {
    pub fn new(policy: ProtectionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet)
    }

    fn to_record(&self, pid: u32, process: &Process) -> ProcessRecord {
        let name = display_name(&process.name().to_string_lossy());
        let executable_path = process
            .exe()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let session_id = session_id(pid, process);
        let is_protected = self.policy.is_protected(pid, &name, session_id);

        ProcessRecord {
            pid,
            name,
            executable_path,
            session_id,
            is_protected,
        }
    }
}

impl ProcessIdentity for SysinfoIdentity {
    fn resolve(&self, pid: u32) -> Result<ProcessRecord, ResolveError> {
        if pid == 0 {
            return Err(ResolveError::NotFound(pid));
        }

        let mut system = System::new();
        let target = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            Self::refresh_kind(),
        );

        match system.process(target) {
            Some(process) if process.status() != ProcessStatus::Zombie => {
                Ok(self.to_record(pid, process))
            }
            _ => {
                trace!(pid = pid, "Process not found");
                Err(ResolveError::NotFound(pid))
            }
        }
    }

    fn list(&self) -> Vec<ProcessRecord> {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, Self::refresh_kind());

        let mut records: Vec<ProcessRecord> = system
            .processes()
            .iter()
            .filter(|(_, p)| p.status() != ProcessStatus::Zombie)
            .map(|(pid, p)| self.to_record(pid.as_u32(), p))
            .collect();
        records.sort_by_key(|r| r.pid);
        records
    }

    fn is_running(&self, pid: u32) -> bool {
        let mut system = System::new();
        let target = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );
        system
            .process(target)
            .is_some_and(|p| p.status() != ProcessStatus::Zombie)
    }
}

/// Process name without a Windows `.exe` suffix.
fn display_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let split = trimmed.len().saturating_sub(4);
    match (trimmed.get(..split), trimmed.get(split..)) {
        (Some(stem), Some(suffix)) if !stem.is_empty() && suffix.eq_ignore_ascii_case(".exe") => {
            stem.to_string()
        }
        _ => trimmed.to_string(),
    }
}

#[cfg(windows)]
fn session_id(pid: u32, _process: &Process) -> Option<u32> {
    use windows::Win32::System::RemoteDesktop::ProcessIdToSessionId;

    let mut session = 0u32;
    // SAFETY: `session` is a valid out pointer for the duration of the call.
    unsafe { ProcessIdToSessionId(pid, &mut session) }
        .ok()
        .map(|_| session)
}

#[cfg(not(windows))]
fn session_id(_pid: u32, process: &Process) -> Option<u32> {
    process.session_id().map(|p| p.as_u32())
}
