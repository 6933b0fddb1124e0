//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.
//! Each adapter handles communication with external systems.

pub mod cache;
pub mod identity;
pub mod privileges;
pub mod sources;
pub mod terminator;

// Re-export main types for convenience
pub use cache::{DiagnosticCache, Snapshot};
pub use identity::SysinfoIdentity;
pub use privileges::{is_current_user_administrator, requires_elevation};
pub use sources::{DiagnosticSource, Dialect, SocketTableSource, SystemCommandRunner};
pub use terminator::{DirectTerminator, ElevatedTerminator};
