//! Connection sources.
//!
//! - `socket_table`: the structured OS socket table
//! - `diagnostic`: parsed output of `netstat`/`ss`, cached briefly

pub mod diagnostic;
pub mod socket_table;

pub use diagnostic::{Dialect, DiagnosticSource, SystemCommandRunner};
pub use socket_table::SocketTableSource;
