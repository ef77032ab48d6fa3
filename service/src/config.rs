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

//! Server group configuration
//!
//! One [`ServerConfig`] is shared read-only by every listener of a group.
//! The max-connections ceiling is the only knob that may be changed after
//! attach (through
//! [`ServerGroup::set_max_connections`](crate::ServerGroup::set_max_connections));
//! it affects future admission decisions only.

use crate::tls::TlsPolicy;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use wireline_csvcodec::DEFAULT_MAX_RECORD_LENGTH;

/// Builds a connection id from the local and remote socket addresses.
pub type ConnectionIdBuilder = Arc<dyn Fn(SocketAddr, SocketAddr) -> String + Send + Sync>;

/// Server group configuration
///
/// # Example
///
/// ```
/// use wireline_service::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::new("csv-echo")
///     .with_banner("Welcome to csv-echo")
///     .with_max_connections(500)
///     .with_idle_timeout(Duration::from_secs(600));
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    /// Service name, used in listener notifications and worker task names
    pub service_name: String,

    /// Banner line written to the peer immediately after admission
    pub banner: Option<String>,

    /// Delimiter characters used to split records into fields
    pub delimiters: Vec<char>,

    /// Cap on the accumulated length of a single record
    pub max_record_length: usize,

    /// Maximum number of concurrent connections per listener
    ///
    /// Enforced at admission; excess sockets are closed immediately without
    /// creating a session.
    pub max_connections: usize,

    /// Timeout for idle connections (no complete record arriving)
    pub idle_timeout: Duration,

    /// Timeout for writing a reply
    pub write_timeout: Duration,

    /// Timeout for graceful shutdown
    ///
    /// With `wait` requested, shutdown blocks up to this long for in-flight
    /// sessions to reach a terminal state.
    pub shutdown_timeout: Duration,

    /// Opaque scheduling hint: prefix for worker task names in traces
    pub worker_name_prefix: String,

    /// Connection-id builder; defaults to `"<peer_ip>:<peer_port>"`
    pub connection_id_builder: Option<ConnectionIdBuilder>,

    /// TLS policy; `None` means plain TCP
    pub tls: Option<TlsPolicy>,
}

impl ServerConfig {
    /// Create a configuration with defaults for the given service name.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the banner line sent immediately after connect.
    #[must_use]
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = Some(banner.into());
        self
    }

    /// Replace the delimiter set.
    #[must_use]
    pub fn with_delimiters(mut self, delimiters: impl Into<Vec<char>>) -> Self {
        self.delimiters = delimiters.into();
        self
    }

    /// Set the maximum record length.
    #[must_use]
    pub fn with_max_record_length(mut self, max: usize) -> Self {
        self.max_record_length = max;
        self
    }

    /// Set the concurrent-connection ceiling.
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the graceful-shutdown timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the worker task-name prefix.
    #[must_use]
    pub fn with_worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_name_prefix = prefix.into();
        self
    }

    /// Install a custom connection-id builder.
    #[must_use]
    pub fn with_connection_id_builder(
        mut self,
        builder: impl Fn(SocketAddr, SocketAddr) -> String + Send + Sync + 'static,
    ) -> Self {
        self.connection_id_builder = Some(Arc::new(builder));
        self
    }

    /// Enable TLS with the given policy.
    #[must_use]
    pub fn with_tls(mut self, policy: TlsPolicy) -> Self {
        self.tls = Some(policy);
        self
    }

    /// Build the connection id for a freshly admitted socket.
    pub fn build_connection_id(&self, local: SocketAddr, peer: SocketAddr) -> String {
        match &self.connection_id_builder {
            Some(builder) => builder(local, peer),
            None => peer.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: "wireline".to_string(),
            banner: None,
            delimiters: vec![','],
            max_record_length: DEFAULT_MAX_RECORD_LENGTH,
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            write_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            worker_name_prefix: "wireline-conn".to_string(),
            connection_id_builder: None,
            tls: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("service_name", &self.service_name)
            .field("banner", &self.banner)
            .field("delimiters", &self.delimiters)
            .field("max_record_length", &self.max_record_length)
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("worker_name_prefix", &self.worker_name_prefix)
            .field(
                "connection_id_builder",
                &self.connection_id_builder.as_ref().map(|_| "custom"),
            )
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let config = ServerConfig::new("csv-echo")
            .with_banner("hello")
            .with_delimiters(vec![';'])
            .with_max_connections(7)
            .with_idle_timeout(Duration::from_secs(1));

        assert_eq!(config.service_name, "csv-echo");
        assert_eq!(config.banner.as_deref(), Some("hello"));
        assert_eq!(config.delimiters, vec![';']);
        assert_eq!(config.max_connections, 7);
        assert_eq!(config.idle_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_default_connection_id_is_peer_address() {
        let config = ServerConfig::default();
        let local = "127.0.0.1:9000".parse().unwrap();
        let peer = "10.1.2.3:5555".parse().unwrap();
        assert_eq!(config.build_connection_id(local, peer), "10.1.2.3:5555");
    }

    #[test]
    fn test_custom_connection_id_builder() {
        let config = ServerConfig::default()
            .with_connection_id_builder(|local, peer| format!("{local}<-{peer}"));
        let local = "127.0.0.1:9000".parse().unwrap();
        let peer = "10.1.2.3:5555".parse().unwrap();
        assert_eq!(
            config.build_connection_id(local, peer),
            "127.0.0.1:9000<-10.1.2.3:5555"
        );
    }
}
