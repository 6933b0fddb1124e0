//! Process identity port (interface).

use thiserror::Error;

use crate::domain::ProcessRecord;

/// Why a pid could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("process {0} not found")]
    NotFound(u32),

    /// The process exists but nothing about it can be read.
    ///
    /// Adapters that can still read a name report the process normally,
    /// with an empty `executable_path`.
    #[error("access denied to process {0}")]
    AccessDenied(u32),
}

/// Port for looking up processes.
///
/// Lookups are not cached between calls; a pid may be reused at any time.
pub trait ProcessIdentity: Send + Sync {
    /// Resolve one pid, classifying it as protected or not.
    fn resolve(&self, pid: u32) -> Result<ProcessRecord, ResolveError>;

    /// Enumerate every visible process.
    fn list(&self) -> Vec<ProcessRecord>;

    /// Check if a process is still running. Zombies count as exited.
    fn is_running(&self, pid: u32) -> bool;
}
