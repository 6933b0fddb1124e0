//! Unix termination: signals via `nix`, elevation via `pkexec` or `osascript`.

use std::process::Stdio;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{debug, warn};

use super::wait_for_exit;
use crate::ports::{ProcessIdentity, TerminateError};

/// pkexec: the authentication dialog was dismissed.
const PKEXEC_DISMISSED: i32 = 126;
/// pkexec: not authorized, or pkexec itself is missing.
const PKEXEC_NOT_AUTHORIZED: i32 = 127;

fn send_signal(pid: u32, signal: Signal) -> Result<(), TerminateError> {
    let raw = i32::try_from(pid).map_err(|_| TerminateError::NotFound(pid))?;
    debug!(pid = pid, signal = signal.as_str(), "Sending signal to process");

    kill(Pid::from_raw(raw), signal).map_err(|errno| match errno {
        Errno::ESRCH => TerminateError::NotFound(pid),
        Errno::EPERM => TerminateError::AccessDenied(pid),
        other => TerminateError::Io(other.desc().to_string()),
    })
}

pub(super) async fn terminate_direct<I: ProcessIdentity>(
    pid: u32,
    identity: &I,
    grace_period: Duration,
    exit_wait: Duration,
) -> Result<(), TerminateError> {
    send_signal(pid, Signal::SIGTERM)?;

    if wait_for_exit(identity, pid, grace_period).await {
        debug!(pid = pid, "Process exited after SIGTERM");
        return Ok(());
    }

    debug!(pid = pid, "Process still running after grace period, sending SIGKILL");
    match send_signal(pid, Signal::SIGKILL) {
        Ok(()) => {}
        // Exited between the last poll and the signal.
        Err(TerminateError::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e),
    }

    if wait_for_exit(identity, pid, exit_wait).await {
        debug!(pid = pid, "Process exited after SIGKILL");
        Ok(())
    } else {
        warn!(pid = pid, wait = ?exit_wait, "Process did not exit after SIGKILL");
        Err(TerminateError::TimedOut(pid))
    }
}

#[cfg(target_os = "macos")]
fn elevated_command(pid: u32) -> Command {
    let script = format!(
        "do shell script \"kill -9 {}\" with administrator privileges",
        pid
    );
    let mut command = Command::new("osascript");
    command.arg("-e").arg(script);
    command
}

#[cfg(not(target_os = "macos"))]
fn elevated_command(pid: u32) -> Command {
    let mut command = Command::new("pkexec");
    command.arg("kill").arg("-9").arg(pid.to_string());
    command
}

/// Whether the elevated command's failure means the user said no.
fn is_declined(code: Option<i32>, stderr: &str) -> bool {
    if cfg!(target_os = "macos") {
        stderr.contains("User canceled") || stderr.contains("(-128)")
    } else {
        matches!(code, Some(PKEXEC_DISMISSED) | Some(PKEXEC_NOT_AUTHORIZED))
    }
}

pub(super) async fn terminate_elevated(pid: u32, timeout: Duration) -> Result<(), TerminateError> {
    let mut command = elevated_command(pid);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
        warn!(pid = pid, error = %e, "Elevation helper could not be launched");
        TerminateError::Declined(pid)
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(TerminateError::Io(e.to_string())),
        Err(_) => {
            warn!(pid = pid, timeout = ?timeout, "Elevated kill timed out");
            return Err(TerminateError::TimedOut(pid));
        }
    };

    if output.status.success() {
        debug!(pid = pid, "Elevated kill succeeded");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output.status.code();
    if is_declined(code, &stderr) {
        warn!(pid = pid, "Elevation declined");
        return Err(TerminateError::Declined(pid));
    }

    Err(TerminateError::ExitCode {
        pid,
        code: code.unwrap_or(-1),
    })
}
