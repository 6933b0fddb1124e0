//! Termination outcomes.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Final classification of one termination attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KillOutcome {
    Success,
    AccessDenied,
    ProcessNotFound,
    ProtectedProcess,
    UnknownError,
}

impl KillOutcome {
    /// Human-readable message for this outcome.
    pub fn message(&self) -> &'static str {
        match self {
            KillOutcome::Success => "Process terminated successfully",
            KillOutcome::AccessDenied => "Access denied - Administrator privileges required",
            KillOutcome::ProcessNotFound => "Process not found or already terminated",
            KillOutcome::ProtectedProcess => "Cannot terminate system process",
            KillOutcome::UnknownError => "Unknown error occurred",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, KillOutcome::Success)
    }
}

impl std::fmt::Display for KillOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of killing one pid in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillRecord {
    pub pid: u32,
    pub process_name: String,
    pub outcome: KillOutcome,
    /// When this pid's attempt finished.
    pub timestamp: DateTime<Local>,
    pub detail: Option<String>,
}

impl KillRecord {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// `PID <pid> (<name>): <message>[ - <detail>]`
    pub fn display_message(&self) -> String {
        let base = format!("PID {} ({}): {}", self.pid, self.process_name, self.outcome);
        match self.detail.as_deref() {
            Some(detail) if !detail.is_empty() => format!("{} - {}", base, detail),
            _ => base,
        }
    }
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl KillSummary {
    pub fn from_records(records: &[KillRecord]) -> Self {
        let succeeded = records.iter().filter(|r| r.is_success()).count();
        Self {
            succeeded,
            failed: records.len() - succeeded,
        }
    }
}
