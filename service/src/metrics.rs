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

//! Lock-free server metrics
//!
//! Counters are plain atomics readable from any task without locking. The
//! same figures are mirrored to the `metrics` facade so an installed
//! recorder (Prometheus, statsd, ...) sees them too.

use crate::types::CloseCause;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Aggregated counters for one server group.
#[derive(Debug)]
pub struct ServerMetrics {
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    rejected_connections: AtomicU64,
    connection_errors: AtomicU64,
    closed_by_client: AtomicU64,
    closed_by_server: AtomicU64,
    timed_out: AtomicU64,
    io_faults: AtomicU64,
    total_connection_duration_ns: AtomicU64,
    started_at: Instant,
}

impl ServerMetrics {
    /// Create a zeroed metrics block.
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            closed_by_client: AtomicU64::new(0),
            closed_by_server: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            io_faults: AtomicU64::new(0),
            total_connection_duration_ns: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record an admitted connection.
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("wireline.connections.total").increment(1);
        metrics::gauge!("wireline.connections.active").increment(1.0);
    }

    /// Record a session reaching its terminal state.
    pub fn connection_closed(&self, duration: Duration, cause: CloseCause) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.total_connection_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        let counter = match cause {
            CloseCause::ClosedByClient => &self.closed_by_client,
            CloseCause::ClosedByServer => &self.closed_by_server,
            CloseCause::TimedOut => &self.timed_out,
            CloseCause::IoFault => &self.io_faults,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!("wireline.connections.active").decrement(1.0);
        metrics::counter!("wireline.connections.closed", "cause" => cause.to_string())
            .increment(1);
        metrics::histogram!("wireline.connections.duration_seconds")
            .record(duration.as_secs_f64());
    }

    /// Record a socket turned away at admission.
    pub fn connection_rejected(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("wireline.connections.rejected").increment(1);
    }

    /// Record a failure attributable to one accept or one session.
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("wireline.connections.errors").increment(1);
    }

    /// Connections currently in flight.
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Connections admitted since start.
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            rejected_connections: self.rejected_connections.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            closed_by_client: self.closed_by_client.load(Ordering::Relaxed),
            closed_by_server: self.closed_by_server.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            io_faults: self.io_faults.load(Ordering::Relaxed),
            total_connection_duration: Duration::from_nanos(
                self.total_connection_duration_ns.load(Ordering::Relaxed),
            ),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ServerMetrics`].
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Connections admitted since start
    pub total_connections: u64,
    /// Connections currently in flight
    pub active_connections: u64,
    /// Sockets turned away at admission
    pub rejected_connections: u64,
    /// Accept and session failures
    pub connection_errors: u64,
    /// Sessions ended by the peer
    pub closed_by_client: u64,
    /// Sessions ended by the server
    pub closed_by_server: u64,
    /// Sessions ended by the idle timeout
    pub timed_out: u64,
    /// Sessions ended by a transport failure
    pub io_faults: u64,
    /// Summed lifetime of all closed sessions
    pub total_connection_duration: Duration,
    /// Time since the metrics block was created
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Mean lifetime of closed sessions, `None` before the first close.
    pub fn average_connection_duration(&self) -> Option<Duration> {
        let closed =
            self.closed_by_client + self.closed_by_server + self.timed_out + self.io_faults;
        if closed == 0 {
            return None;
        }
        Some(self.total_connection_duration / u32::try_from(closed).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close_balance() {
        let metrics = ServerMetrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        assert_eq!(metrics.active_connections(), 2);
        assert_eq!(metrics.total_connections(), 2);

        metrics.connection_closed(Duration::from_millis(10), CloseCause::ClosedByClient);
        assert_eq!(metrics.active_connections(), 1);
        assert_eq!(metrics.total_connections(), 2);
    }

    #[test]
    fn test_snapshot_partitions_close_causes() {
        let metrics = ServerMetrics::new();
        for cause in [
            CloseCause::ClosedByClient,
            CloseCause::ClosedByClient,
            CloseCause::TimedOut,
            CloseCause::IoFault,
        ] {
            metrics.connection_opened();
            metrics.connection_closed(Duration::from_millis(5), cause);
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.closed_by_client, 2);
        assert_eq!(snapshot.closed_by_server, 0);
        assert_eq!(snapshot.timed_out, 1);
        assert_eq!(snapshot.io_faults, 1);
        assert_eq!(snapshot.total_connection_duration, Duration::from_millis(20));
    }

    #[test]
    fn test_average_duration() {
        let metrics = ServerMetrics::new();
        assert!(metrics.snapshot().average_connection_duration().is_none());

        metrics.connection_opened();
        metrics.connection_closed(Duration::from_millis(100), CloseCause::ClosedByServer);
        metrics.connection_opened();
        metrics.connection_closed(Duration::from_millis(300), CloseCause::ClosedByServer);

        assert_eq!(
            metrics.snapshot().average_connection_duration(),
            Some(Duration::from_millis(200))
        );
    }

    #[test]
    fn test_rejections_and_errors() {
        let metrics = ServerMetrics::new();
        metrics.connection_rejected();
        metrics.connection_rejected();
        metrics.connection_error();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rejected_connections, 2);
        assert_eq!(snapshot.connection_errors, 1);
    }
}
