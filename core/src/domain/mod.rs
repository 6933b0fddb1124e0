//! Domain layer - Pure business logic and data models.
//!
//! This module contains domain entities that represent core business concepts.
//! These types have no I/O dependencies and can be tested in isolation.

mod connection;
mod kill;
mod port;
pub mod port_spec;
mod process;

// Re-export all domain types
pub use connection::{
    normalize_tcp_state, ConnectionRecord, Protocol, STATE_ESTABLISHED, STATE_LISTENING,
    STATE_UNKNOWN,
};
pub use kill::{KillOutcome, KillRecord, KillSummary};
pub use port::{PortInfo, ScanTarget, NOT_IN_USE, STATE_AVAILABLE, STATE_ERROR};
pub use process::{
    same_process_name, ProcessRecord, ProtectionPolicy, MAX_RESERVED_PID, UNKNOWN_PROCESS,
};
