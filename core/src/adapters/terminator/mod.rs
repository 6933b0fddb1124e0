//! Process termination strategies.
//!
//! # Direct
//! A terminate call made with the caller's own privileges.
//! - Unix: SIGTERM, a short grace period, then SIGKILL
//! - Windows: `TerminateProcess`
//!
//! Both wait (bounded) for the process to actually exit.
//!
//! # Elevated
//! An external kill command run through the platform's elevation prompt.
//! - Windows: `taskkill /PID <pid> /F` via the `runas` verb
//! - Linux: `pkexec kill -9 <pid>`
//! - macOS: `osascript ... with administrator privileges`

use std::time::Duration;

use tracing::debug;

use crate::ports::{ProcessIdentity, TerminateError, Terminator};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use self::unix as platform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use self::windows as platform;

/// Default wait between the graceful and the forceful signal.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Default bound on waiting for a terminated process to exit.
pub const DEFAULT_EXIT_WAIT: Duration = Duration::from_millis(5000);

/// Default bound on the elevated kill command.
pub const DEFAULT_ELEVATED_TIMEOUT: Duration = Duration::from_secs(30);

/// Terminates with the caller's own privileges.
#[derive(Debug, Clone)]
pub struct DirectTerminator<I: ProcessIdentity> {
    identity: I,
    grace_period: Duration,
    exit_wait: Duration,
}

impl<I: ProcessIdentity> DirectTerminator<I> {
    /// `identity` is used to poll whether the process has exited.
    pub fn new(identity: I) -> Self {
        Self::with_timing(identity, DEFAULT_GRACE_PERIOD, DEFAULT_EXIT_WAIT)
    }

    pub fn with_timing(identity: I, grace_period: Duration, exit_wait: Duration) -> Self {
        Self {
            identity,
            grace_period,
            exit_wait,
        }
    }
}

impl<I: ProcessIdentity> Terminator for DirectTerminator<I> {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn terminate(&self, pid: u32) -> Result<(), TerminateError> {
        debug!(pid = pid, strategy = self.name(), "Terminating process");
        platform::terminate_direct(pid, &self.identity, self.grace_period, self.exit_wait).await
    }
}

/// Terminates through an elevated external command.
#[derive(Debug, Clone)]
pub struct ElevatedTerminator {
    timeout: Duration,
}

impl ElevatedTerminator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ElevatedTerminator {
    fn default() -> Self {
        Self::new(DEFAULT_ELEVATED_TIMEOUT)
    }
}

impl Terminator for ElevatedTerminator {
    fn name(&self) -> &'static str {
        "elevated"
    }

    async fn terminate(&self, pid: u32) -> Result<(), TerminateError> {
        debug!(pid = pid, strategy = self.name(), "Terminating process");
        platform::terminate_elevated(pid, self.timeout).await
    }
}

/// Poll `identity` until `pid` is gone or `bound` elapses.
///
/// Returns true if the process exited.
#[cfg_attr(windows, allow(dead_code))]
pub(crate) async fn wait_for_exit<I: ProcessIdentity>(identity: &I, pid: u32, bound: Duration) -> bool {
    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    let deadline = tokio::time::Instant::now() + bound;
    loop {
        if !identity.is_running(pid) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProcessRecord;
    use crate::ports::ResolveError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports the process as running for a fixed number of polls.
    struct ExitsAfter {
        polls: AtomicUsize,
        after: usize,
    }

    impl ProcessIdentity for ExitsAfter {
        fn resolve(&self, pid: u32) -> Result<ProcessRecord, ResolveError> {
            Err(ResolveError::NotFound(pid))
        }

        fn list(&self) -> Vec<ProcessRecord> {
            Vec::new()
        }

        fn is_running(&self, _pid: u32) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst) < self.after
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_exit_sees_exit() {
        let identity = ExitsAfter {
            polls: AtomicUsize::new(0),
            after: 3,
        };
        assert!(wait_for_exit(&identity, 42, Duration::from_secs(1)).await);
        assert_eq!(identity.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_exit_gives_up_at_bound() {
        let identity = ExitsAfter {
            polls: AtomicUsize::new(0),
            after: usize::MAX,
        };
        assert!(!wait_for_exit(&identity, 42, Duration::from_millis(200)).await);
    }
}
