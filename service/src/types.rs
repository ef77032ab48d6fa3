//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Core types for the wireline pipeline service

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Unique identifier for a connection.
///
/// Built exactly once per accepted socket from the local and remote socket
/// addresses (by the configured builder, or `"<peer_ip>:<peer_port>"` by
/// default) and cheap to clone afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Arc<str>);

impl ConnectionId {
    /// Create a connection ID from an already-built string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a session reached its terminal state.
///
/// Every session reports exactly one cause, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// The peer closed the connection, or requested closure through a
    /// dispatched command.
    ClosedByClient,
    /// The server closed the connection (shutdown or explicit removal).
    ClosedByServer,
    /// The idle timeout elapsed without a complete record arriving.
    TimedOut,
    /// A read or write on the socket failed.
    IoFault,
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClosedByClient => write!(f, "closed by client"),
            Self::ClosedByServer => write!(f, "closed by server"),
            Self::TimedOut => write!(f, "timed out"),
            Self::IoFault => write!(f, "i/o fault"),
        }
    }
}

/// Connection state (stored as atomic u8 for lock-free state management)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Connection is being established (TLS handshake pending if configured)
    Connecting = 0,
    /// Connection is in the read/frame/dispatch/write loop
    Active = 1,
    /// Connection is closing (cleanup in progress)
    Closing = 2,
    /// Connection is closed
    Closed = 3,
}

impl ConnectionState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the connection is in a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Active => write!(f, "active"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Connection information snapshot (for non-blocking queries)
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection ID
    pub id: ConnectionId,
    /// Current state
    pub state: ConnectionState,
    /// Peer address
    pub peer_addr: SocketAddr,
    /// Listener that accepted the connection
    pub listener: SocketAddr,
    /// When the connection was created
    pub created_at: Instant,
    /// Total records received
    pub records_received: u64,
    /// Total replies sent
    pub replies_sent: u64,
    /// Total reply bytes sent
    pub bytes_sent: u64,
}

impl ConnectionInfo {
    /// Get the connection duration
    pub fn duration(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Number of active connections across all listeners
    pub active_connections: usize,
    /// Total connections since server start
    pub total_connections: u64,
    /// Addresses of all attached listeners
    pub listeners: Vec<SocketAddr>,
    /// Server uptime
    pub uptime: Duration,
    /// Server start time
    pub started_at: Instant,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ServerGroup {{ active: {}, total: {}, listeners: {:?}, uptime: {:?} }}",
            self.active_connections, self.total_connections, self.listeners, self.uptime
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id1 = ConnectionId::new("127.0.0.1:5000");
        let id2 = ConnectionId::new("127.0.0.1:5001");

        assert_eq!(id1.as_str(), "127.0.0.1:5000");
        assert_eq!(id1.to_string(), "127.0.0.1:5000");
        assert_ne!(id1, id2);
        assert_eq!(id1.clone(), id1);
    }

    #[test]
    fn test_connection_state_conversion() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Active,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            let as_u8 = state.as_u8();
            let back = ConnectionState::from_u8(as_u8);
            assert_eq!(state, back);
        }
    }

    #[test]
    fn test_connection_state_terminal() {
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Active.is_terminal());
        assert!(ConnectionState::Closing.is_terminal());
        assert!(ConnectionState::Closed.is_terminal());
    }

    #[test]
    fn test_close_cause_display() {
        assert_eq!(CloseCause::ClosedByClient.to_string(), "closed by client");
        assert_eq!(CloseCause::TimedOut.to_string(), "timed out");
    }
}
