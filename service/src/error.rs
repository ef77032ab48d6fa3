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

//! Error types for the wireline pipeline service

use crate::types::ConnectionId;
use thiserror::Error;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// Service error types
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error from the underlying TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error from the codec layer
    #[error("Codec error: {0}")]
    Codec(#[from] wireline_csvcodec::CodecError),

    /// TLS configuration or handshake error
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection with the given ID was not found
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server is already running
    #[error("Server already running")]
    AlreadyRunning,

    /// Maximum number of connections reached
    #[error("Maximum connections ({0}) reached")]
    MaxConnectionsReached(usize),

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

impl ServerError {
    /// Check if the error terminates only a single session.
    ///
    /// Session-scoped errors never take a listener or the server group down
    /// with them.
    pub fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            ServerError::Io(_)
                | ServerError::Codec(_)
                | ServerError::ConnectionClosed
                | ServerError::Timeout
        )
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ServerError::ConnectionNotFound(_) | ServerError::ConnectionClosed | ServerError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_session_scoped() {
        assert!(ServerError::Timeout.is_session_scoped());
        assert!(ServerError::ConnectionClosed.is_session_scoped());
        assert!(!ServerError::ServerNotRunning.is_session_scoped());
        assert!(!ServerError::MaxConnectionsReached(100).is_session_scoped());
    }

    #[test]
    fn test_error_is_connection_error() {
        let id = ConnectionId::new("127.0.0.1:4242");
        assert!(ServerError::ConnectionNotFound(id).is_connection_error());
        assert!(ServerError::ConnectionClosed.is_connection_error());
        assert!(!ServerError::Timeout.is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let err = ServerError::ConnectionNotFound(ConnectionId::new("10.0.0.1:9"));
        assert_eq!(err.to_string(), "Connection 10.0.0.1:9 not found");

        let err = ServerError::MaxConnectionsReached(1000);
        assert_eq!(err.to_string(), "Maximum connections (1000) reached");
    }
}
