//! Connection source port (interface).

use std::time::Duration;

use thiserror::Error;

use crate::domain::ConnectionRecord;

/// Why a connection source produced no data.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No implementation for this platform.
    #[error("not supported on this platform")]
    Unsupported,

    /// The external command could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external command ran past its time bound and was killed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The external command exited unsuccessfully.
    #[error("{program} exited with {status}")]
    CommandFailed { program: String, status: String },

    /// The OS socket-table query failed.
    #[error("socket table query failed: {0}")]
    Query(String),
}

/// Port for enumerating sockets.
///
/// Implementations are the structured OS socket table and the parsed output
/// of a diagnostic command.
pub trait ConnectionSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Take one snapshot of the sockets this source can see.
    fn connections(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ConnectionRecord>, SourceError>> + Send;
}

/// Port for running the diagnostic command and capturing its stdout.
pub trait CommandRunner: Send + Sync {
    /// Run the command, killing it if it outlives `timeout`.
    fn run(
        &self,
        timeout: Duration,
    ) -> impl std::future::Future<Output = Result<String, SourceError>> + Send;
}
