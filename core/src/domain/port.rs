//! Per-port scan results.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::connection::{ConnectionRecord, Protocol};

/// Process name shown for a port nobody owns.
pub const NOT_IN_USE: &str = "Not in use";

/// State shown for a port nobody owns.
pub const STATE_AVAILABLE: &str = "Available";

/// State of a synthetic row that carries a scan failure.
pub const STATE_ERROR: &str = "Error";

// ============================================================================
// ScanTarget
// ============================================================================

/// What a scan should cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanTarget {
    /// Only these ports; unowned ones are reported as available.
    Ports(Vec<u16>),
    /// Every socket the system reports.
    All,
}

// ============================================================================
// PortInfo
// ============================================================================

/// One row of a scan: a port and the process that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    /// Unique identifier for this row.
    pub id: Uuid,
    /// The port number.
    pub port: u16,
    /// Owning process, 0 when none.
    pub pid: u32,
    /// Process name, or a sentinel such as "Not in use".
    pub process_name: String,
    /// Protocol of the owning socket, absent for free ports.
    pub protocol: Option<Protocol>,
    /// Socket state, or "Available"/"Error" for synthetic rows.
    pub state: String,
    /// When the scan that produced this row ran.
    pub scanned_at: DateTime<Local>,
}

impl PortInfo {
    /// Row for a socket owned (possibly) by a resolved process.
    pub fn owned(
        connection: &ConnectionRecord,
        process_name: impl Into<String>,
        scanned_at: DateTime<Local>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            port: connection.local_port,
            pid: connection.pid,
            process_name: process_name.into(),
            protocol: Some(connection.protocol),
            state: connection.state.clone(),
            scanned_at,
        }
    }

    /// Row for a requested port with no socket.
    pub fn available(port: u16, scanned_at: DateTime<Local>) -> Self {
        Self {
            id: Uuid::new_v4(),
            port,
            pid: 0,
            process_name: NOT_IN_USE.to_string(),
            protocol: None,
            state: STATE_AVAILABLE.to_string(),
            scanned_at,
        }
    }

    /// Synthetic row carrying a scan failure.
    pub fn error(message: impl Into<String>, scanned_at: DateTime<Local>) -> Self {
        Self {
            id: Uuid::new_v4(),
            port: 0,
            pid: 0,
            process_name: message.into(),
            protocol: None,
            state: STATE_ERROR.to_string(),
            scanned_at,
        }
    }

    /// Protocol label, empty for free ports.
    pub fn protocol_label(&self) -> &'static str {
        self.protocol.map(|p| p.as_str()).unwrap_or("")
    }

    pub fn is_available(&self) -> bool {
        self.state == STATE_AVAILABLE
    }

    pub fn is_error(&self) -> bool {
        self.state == STATE_ERROR
    }

    /// Whether this row names a process that could be a kill target.
    pub fn has_owner(&self) -> bool {
        self.pid > 0 && !self.is_available()
    }
}

impl std::fmt::Display for PortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (PID: {}, Process: {}, State: {})",
            self.protocol_label(),
            self.port,
            self.pid,
            self.process_name,
            self.state
        )
    }
}
