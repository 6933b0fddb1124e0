//! Application layer - Use case services.
//!
//! This module contains application services that orchestrate
//! domain logic and adapter interactions.
//!
//! Services are designed to be thin orchestrators that:
//! - Accept domain types as inputs
//! - Use ports (traits) for external dependencies
//! - Return domain types as outputs

mod kill_service;
mod port_service;
pub mod reconcile;

pub use kill_service::{dedup_pids, KillService, Precheck, TerminationEngine};
pub use port_service::{build_all, build_port_infos, NameLookup, PortService};
pub use reconcile::reconcile;
