//! Process terminator port (interface).

use thiserror::Error;

/// Failure modes of a termination strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerminateError {
    /// The caller lacks the privilege to end the process.
    #[error("access denied to process {0}")]
    AccessDenied(u32),

    /// The process vanished before it could be signalled.
    #[error("process {0} not found")]
    NotFound(u32),

    /// The user declined the elevation prompt.
    #[error("elevation declined for process {0}")]
    Declined(u32),

    /// The kill command ran but reported failure.
    #[error("kill command for process {pid} exited with code {code}")]
    ExitCode { pid: u32, code: i32 },

    /// The process, or the kill command, did not finish in time.
    #[error("timed out terminating process {0}")]
    TimedOut(u32),

    /// Anything else.
    #[error("{0}")]
    Io(String),
}

/// Port for ending a process.
///
/// There are two strategies: a direct call made with the caller's own
/// privileges, and an elevated external command.
pub trait Terminator: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// End the process and wait (bounded) for it to exit.
    fn terminate(
        &self,
        pid: u32,
    ) -> impl std::future::Future<Output = Result<(), TerminateError>> + Send;
}
