//! Socket connection records shared by every connection source.

use serde::{Deserialize, Serialize};

/// State reported for listening sockets, and for every UDP socket.
pub const STATE_LISTENING: &str = "LISTENING";

/// State reported for established TCP connections.
pub const STATE_ESTABLISHED: &str = "ESTABLISHED";

/// State used when a source gives no usable state.
pub const STATE_UNKNOWN: &str = "UNKNOWN";

/// Transport protocol of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Upper-case label as printed by netstat.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }

    /// Case-insensitive parse of `tcp`/`udp` (netstat also prints `tcp6` etc.
    /// on some systems, those are accepted too).
    pub fn parse(text: &str) -> Option<Self> {
        let lower = text.to_ascii_lowercase();
        match lower.as_str() {
            "tcp" | "tcp4" | "tcp6" => Some(Protocol::Tcp),
            "udp" | "udp4" | "udp6" => Some(Protocol::Udp),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a TCP state name to the netstat vocabulary.
///
/// Accepts the Windows `netstat` spelling, the Linux `ss` abbreviations and
/// a few common variants. Unrecognized inputs are upper-cased as-is.
pub fn normalize_tcp_state(state: &str) -> String {
    let upper = state.trim().to_ascii_uppercase().replace('-', "_");
    let normalized = match upper.as_str() {
        "LISTEN" | "LISTENING" => STATE_LISTENING,
        "ESTAB" | "ESTABLISHED" => STATE_ESTABLISHED,
        "SYN_SENT" | "SYNSENT" => "SYN_SENT",
        "SYN_RECV" | "SYN_RECEIVED" | "SYNRECEIVED" => "SYN_RECEIVED",
        "FIN_WAIT1" | "FIN_WAIT_1" | "FINWAIT1" => "FIN_WAIT_1",
        "FIN_WAIT2" | "FIN_WAIT_2" | "FINWAIT2" => "FIN_WAIT_2",
        "CLOSE_WAIT" | "CLOSEWAIT" => "CLOSE_WAIT",
        "CLOSING" => "CLOSING",
        "LAST_ACK" | "LASTACK" => "LAST_ACK",
        "TIME_WAIT" | "TIMEWAIT" => "TIME_WAIT",
        "CLOSE" | "CLOSED" | "UNCONN" => "CLOSED",
        "DELETE_TCB" | "DELETETCB" => "DELETE_TCB",
        "" => STATE_UNKNOWN,
        _ => return upper,
    };
    normalized.to_string()
}

/// One socket as reported by a connection source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub protocol: Protocol,
    /// Free-form state such as `LISTENING` or `ESTABLISHED`.
    pub state: String,
    /// Owning process, or 0 when the source could not attribute one.
    pub pid: u32,
}

impl ConnectionRecord {
    /// A listening socket with no remote peer.
    pub fn listener(
        protocol: Protocol,
        local_address: impl Into<String>,
        local_port: u16,
        pid: u32,
    ) -> Self {
        Self {
            local_address: local_address.into(),
            local_port,
            remote_address: "0.0.0.0".to_string(),
            remote_port: 0,
            protocol,
            state: STATE_LISTENING.to_string(),
            pid,
        }
    }

    /// Key used to collapse duplicates across sources.
    pub fn dedup_key(&self) -> (u16, Protocol, &str) {
        (self.local_port, self.protocol, self.state.as_str())
    }

    pub fn has_pid(&self) -> bool {
        self.pid > 0
    }
}
