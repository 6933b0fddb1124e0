//! PortSweep Core Library
//!
//! Cross-platform library that finds which processes own network ports and
//! terminates them safely. Provides functionality to:
//! - Parse port specifications (`"80, 443; 8000-8010"`)
//! - Scan ports by merging the OS socket table with a diagnostic tool
//! - Classify processes as protected or killable
//! - Kill processes with direct-then-elevated escalation, one outcome per pid
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure business logic and data models
//! - `ports`: Trait definitions (interfaces)
//! - `adapters`: External system implementations
//! - `application`: Use case services
//!
//! # Platform Support
//! - Windows: IP Helper socket table, `netstat -ano`, `TerminateProcess`, `runas taskkill`
//! - Linux: sock_diag socket table, `ss -Htunap`, signals, `pkexec`
//! - macOS: socket table, signals, `osascript` elevation
//!
//! # Logging
//! Events are emitted through `tracing`. No subscriber is installed.

// Hexagonal architecture layers
pub mod adapters;
pub mod application;
pub mod domain;
pub mod ports;

pub mod config;
pub mod engine;
pub mod error;

// Re-export domain types (primary API)
pub use domain::{
    ConnectionRecord, KillOutcome, KillRecord, KillSummary, PortInfo, ProcessRecord,
    ProtectionPolicy, Protocol, ScanTarget,
};

// Re-export other commonly used types
pub use config::{Config, ConfigStore};
pub use engine::PortSweepEngine;
pub use error::{Error, Result};
