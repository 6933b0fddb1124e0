//! Process identity and protection rules.

use serde::{Deserialize, Serialize};

/// Name shown when a process cannot be resolved.
pub const UNKNOWN_PROCESS: &str = "Unknown";

/// Pids at or below this value always belong to the kernel or init.
pub const MAX_RESERVED_PID: u32 = 4;

#[cfg(windows)]
const PLATFORM_PROTECTED_NAMES: &[&str] = &[
    "System", "Idle", "svchost", "csrss", "winlogon", "services", "lsass", "smss", "wininit",
    "dwm", "spoolsv", "conhost",
];

#[cfg(not(windows))]
const PLATFORM_PROTECTED_NAMES: &[&str] = &["init", "systemd", "kthreadd", "launchd", "kernel_task"];

/// A resolved process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    /// Empty when the executable path is not readable.
    pub executable_path: String,
    pub session_id: Option<u32>,
    pub is_protected: bool,
}

/// Decides which processes must never be terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionPolicy {
    names: Vec<String>,
    interactive_shell: Option<String>,
    system_session: Option<u32>,
}

impl ProtectionPolicy {
    /// Build a policy from explicit parts.
    ///
    /// `system_session` marks a session id whose processes are protected,
    /// except for the `interactive_shell` process.
    pub fn new(
        names: impl IntoIterator<Item = impl Into<String>>,
        interactive_shell: Option<String>,
        system_session: Option<u32>,
    ) -> Self {
        Self {
            names: names.into_iter().map(|n| canonical_name(&n.into())).collect(),
            interactive_shell: interactive_shell.map(|s| canonical_name(&s)),
            system_session,
        }
    }

    /// The policy for the platform this crate was built for.
    #[cfg(windows)]
    pub fn platform_default() -> Self {
        Self::new(
            PLATFORM_PROTECTED_NAMES.iter().copied(),
            Some("explorer".to_string()),
            Some(0),
        )
    }

    /// The policy for the platform this crate was built for.
    ///
    /// Unix session ids are not a reliable system marker (inside containers
    /// `getsid` reports 0 for ordinary processes), so only names and reserved
    /// pids apply.
    #[cfg(not(windows))]
    pub fn platform_default() -> Self {
        Self::new(PLATFORM_PROTECTED_NAMES.iter().copied(), None, None)
    }

    /// Add extra protected names, e.g. from configuration.
    pub fn with_extra_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for name in names {
            let name = canonical_name(&name.into());
            if !name.is_empty() && !self.names.contains(&name) {
                self.names.push(name);
            }
        }
        self
    }

    /// Whether the name is on the protected list.
    pub fn is_protected_name(&self, name: &str) -> bool {
        let name = canonical_name(name);
        self.names.iter().any(|n| *n == name)
    }

    /// Full protection check.
    pub fn is_protected(&self, pid: u32, name: &str, session_id: Option<u32>) -> bool {
        if pid <= MAX_RESERVED_PID || self.is_protected_name(name) {
            return true;
        }

        match (self.system_session, session_id) {
            (Some(system), Some(session)) if system == session => {
                let name = canonical_name(name);
                self.interactive_shell.as_deref() != Some(name.as_str())
            }
            _ => false,
        }
    }

    /// Protection check over a resolved record.
    pub fn check(&self, record: &ProcessRecord) -> bool {
        self.is_protected(record.pid, &record.name, record.session_id)
    }
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Whether two process names refer to the same program.
///
/// Case and a trailing `.exe` are ignored.
pub fn same_process_name(a: &str, b: &str) -> bool {
    canonical_name(a) == canonical_name(b)
}

/// Lower-case with any trailing `.exe` removed.
fn canonical_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix(".exe") {
        Some(stripped) => stripped.to_string(),
        None => lower,
    }
}
