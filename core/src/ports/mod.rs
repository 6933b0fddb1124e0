//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with external systems. Implementations live in `adapters`.

mod clock;
mod identity;
mod source;
mod terminator;

pub use clock::{Clock, SystemClock};
pub use identity::{ProcessIdentity, ResolveError};
pub use source::{CommandRunner, ConnectionSource, SourceError};
pub use terminator::{TerminateError, Terminator};
