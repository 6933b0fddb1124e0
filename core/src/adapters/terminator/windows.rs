//! Windows termination through Win32.
//!
//! All Win32 calls block, so they run on tokio's blocking pool.

use std::time::Duration;

use ::windows::core::{Error as WinError, HSTRING, PCWSTR};
use ::windows::Win32::Foundation::{
    CloseHandle, ERROR_ACCESS_DENIED, ERROR_CANCELLED, ERROR_INVALID_PARAMETER, HANDLE,
    WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use ::windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, TerminateProcess, WaitForSingleObject, PROCESS_SYNCHRONIZE,
    PROCESS_TERMINATE,
};
use ::windows::Win32::UI::Shell::{ShellExecuteExW, SEE_MASK_NOCLOSEPROCESS, SHELLEXECUTEINFOW};
use ::windows::Win32::UI::WindowsAndMessaging::SW_HIDE;
use tracing::{debug, warn};

use crate::ports::{ProcessIdentity, TerminateError};

fn classify(pid: u32, error: &WinError) -> TerminateError {
    let code = error.code();
    if code == ERROR_ACCESS_DENIED.to_hresult() {
        TerminateError::AccessDenied(pid)
    } else if code == ERROR_INVALID_PARAMETER.to_hresult() {
        // OpenProcess reports a pid that no longer exists this way.
        TerminateError::NotFound(pid)
    } else if code == ERROR_CANCELLED.to_hresult() {
        TerminateError::Declined(pid)
    } else {
        TerminateError::Io(error.to_string())
    }
}

fn millis(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}

/// Owns a process handle and closes it on drop.
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcess/ShellExecuteExW and is closed once.
        let _ = unsafe { CloseHandle(self.0) };
    }
}

async fn run_blocking<F>(job: F) -> Result<(), TerminateError>
where
    F: FnOnce() -> Result<(), TerminateError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| TerminateError::Io(e.to_string()))?
}

fn terminate_blocking(pid: u32, exit_wait: Duration) -> Result<(), TerminateError> {
    // SAFETY: plain Win32 calls on a handle we own for the duration of this function.
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE | PROCESS_SYNCHRONIZE, false, pid)
            .map(OwnedHandle)
            .map_err(|e| classify(pid, &e))?;

        TerminateProcess(handle.0, 1).map_err(|e| classify(pid, &e))?;

        let waited = WaitForSingleObject(handle.0, millis(exit_wait));
        if waited == WAIT_OBJECT_0 {
            debug!(pid = pid, "Process exited after TerminateProcess");
            Ok(())
        } else if waited == WAIT_TIMEOUT {
            warn!(pid = pid, wait = ?exit_wait, "Process did not exit in time");
            Err(TerminateError::TimedOut(pid))
        } else {
            Err(TerminateError::Io(format!("wait failed for process {}", pid)))
        }
    }
}

pub(super) async fn terminate_direct<I: ProcessIdentity>(
    pid: u32,
    _identity: &I,
    _grace_period: Duration,
    exit_wait: Duration,
) -> Result<(), TerminateError> {
    run_blocking(move || terminate_blocking(pid, exit_wait)).await
}

fn elevated_blocking(pid: u32, timeout: Duration) -> Result<(), TerminateError> {
    let verb = HSTRING::from("runas");
    let file = HSTRING::from("taskkill");
    let parameters = HSTRING::from(format!("/PID {} /F", pid));

    let mut info = SHELLEXECUTEINFOW {
        cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
        fMask: SEE_MASK_NOCLOSEPROCESS,
        lpVerb: PCWSTR(verb.as_ptr()),
        lpFile: PCWSTR(file.as_ptr()),
        lpParameters: PCWSTR(parameters.as_ptr()),
        nShow: SW_HIDE.0,
        ..Default::default()
    };

    // SAFETY: `info` and the strings it points to outlive the call; the
    // returned process handle is owned by `OwnedHandle`.
    unsafe {
        if let Err(e) = ShellExecuteExW(&mut info) {
            let error = classify(pid, &e);
            if matches!(error, TerminateError::Declined(_)) {
                warn!(pid = pid, "Elevation declined");
            }
            return Err(match error {
                TerminateError::AccessDenied(_) => TerminateError::Declined(pid),
                other => other,
            });
        }
        if info.hProcess.is_invalid() {
            return Err(TerminateError::Io("elevated taskkill returned no process handle".into()));
        }
        let handle = OwnedHandle(info.hProcess);

        let waited = WaitForSingleObject(handle.0, millis(timeout));
        if waited == WAIT_TIMEOUT {
            warn!(pid = pid, timeout = ?timeout, "Elevated kill timed out");
            let _ = TerminateProcess(handle.0, 1);
            return Err(TerminateError::TimedOut(pid));
        }
        if waited != WAIT_OBJECT_0 {
            return Err(TerminateError::Io(format!("wait failed for elevated kill of {}", pid)));
        }

        let mut exit_code = 0u32;
        GetExitCodeProcess(handle.0, &mut exit_code).map_err(|e| classify(pid, &e))?;
        if exit_code == 0 {
            debug!(pid = pid, "Elevated kill succeeded");
            Ok(())
        } else {
            Err(TerminateError::ExitCode {
                pid,
                code: exit_code as i32,
            })
        }
    }
}

pub(super) async fn terminate_elevated(pid: u32, timeout: Duration) -> Result<(), TerminateError> {
    run_blocking(move || elevated_blocking(pid, timeout)).await
}
