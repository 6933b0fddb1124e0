//! Current-user privilege checks.

use crate::domain::ProcessRecord;

/// Whether the current user is an administrator (root on Unix).
#[cfg(windows)]
pub fn is_current_user_administrator() -> bool {
    // SAFETY: takes no arguments and has no side effects.
    unsafe { ::windows::Win32::UI::Shell::IsUserAnAdmin() }.as_bool()
}

/// Whether the current user is an administrator (root on Unix).
#[cfg(unix)]
pub fn is_current_user_administrator() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Whether terminating `process` will need the elevated path.
///
/// True for protected processes, and for processes whose executable path
/// the current user cannot read unless that user is already an administrator.
pub fn requires_elevation(process: &ProcessRecord, is_administrator: bool) -> bool {
    process.is_protected || (process.executable_path.is_empty() && !is_administrator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, is_protected: bool) -> ProcessRecord {
        ProcessRecord {
            pid: 4321,
            name: "worker".to_string(),
            executable_path: path.to_string(),
            session_id: Some(1),
            is_protected,
        }
    }

    #[test]
    fn test_protected_always_requires_elevation() {
        assert!(requires_elevation(&record("/usr/bin/worker", true), true));
    }

    #[test]
    fn test_unreadable_path_depends_on_admin() {
        assert!(requires_elevation(&record("", false), false));
        assert!(!requires_elevation(&record("", false), true));
        assert!(!requires_elevation(&record("/usr/bin/worker", false), false));
    }

    #[test]
    fn test_admin_check_is_side_effect_free() {
        assert_eq!(is_current_user_administrator(), is_current_user_administrator());
    }
}
