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

//! Connection registry shared by all listeners of a group
//!
//! The registry owns session metadata and the control channels into running
//! workers. Workers own their connections outright; the registry never
//! touches a transport or a framer. Entries are registered before the worker
//! task is spawned, so a connection is observable for exactly as long as its
//! session exists.

use crate::connection::{Connection, ConnectionStats};
use crate::error::{Result, ServerError};
use crate::events::{EventBus, ServerEvent};
use crate::handler::RecordHandler;
use crate::listener::ConnectionPermit;
use crate::metrics::ServerMetrics;
use crate::types::{ConnectionId, ConnectionInfo, ConnectionState};
use crate::worker::{ConnectionWorker, ControlMessage, WorkerConfig};
use chrono::Utc;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, trace};

/// Registry entry for one live session.
struct ManagedConnection {
    peer_addr: SocketAddr,
    listener: SocketAddr,
    control_tx: mpsc::Sender<ControlMessage>,
    state: Arc<AtomicU8>,
    stats: Arc<ConnectionStats>,
    created_at: Instant,
}

/// Tracks every live session of a server group.
pub(crate) struct ConnectionManager {
    connections: Arc<DashMap<ConnectionId, ManagedConnection>>,
    metrics: Arc<ServerMetrics>,
    events: Arc<EventBus>,
    worker_config: WorkerConfig,
    banner: Option<String>,
    drained: Arc<Notify>,
}

impl ConnectionManager {
    pub fn new(
        metrics: Arc<ServerMetrics>,
        events: Arc<EventBus>,
        worker_config: WorkerConfig,
        banner: Option<String>,
    ) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            metrics,
            events,
            worker_config,
            banner,
            drained: Arc::new(Notify::new()),
        }
    }

    /// Register a connection and spawn its session worker.
    ///
    /// The registry entry is inserted before the worker task starts, so the
    /// session is visible to queries and `close_all` from the moment this
    /// returns. The admission permit travels into the worker task and is
    /// released when the session ends.
    pub fn add_connection(
        &self,
        connection: Connection,
        handler: Arc<dyn RecordHandler>,
        listener: SocketAddr,
        permit: ConnectionPermit,
    ) {
        let id = connection.id().clone();
        let peer_addr = connection.peer_addr();
        let created_at = connection.created_at();
        let stats = connection.stats();
        let state = Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8()));

        let (worker, control_tx) = ConnectionWorker::new(
            connection,
            handler,
            state.clone(),
            &self.worker_config,
            self.events.clone(),
            self.banner.clone(),
        );

        self.connections.insert(
            id.clone(),
            ManagedConnection {
                peer_addr,
                listener,
                control_tx,
                state,
                stats,
                created_at,
            },
        );
        self.metrics.connection_opened();
        self.events.emit(ServerEvent::ConnectionOpened {
            timestamp: Utc::now(),
            listener,
            peer: peer_addr,
            id: id.clone(),
        });

        let connections = self.connections.clone();
        let metrics = self.metrics.clone();
        let events = self.events.clone();
        let drained = self.drained.clone();
        tokio::spawn(async move {
            let cause = worker.run().await;
            connections.remove(&id);
            metrics.connection_closed(created_at.elapsed(), cause);
            events.emit(ServerEvent::ConnectionClosed {
                timestamp: Utc::now(),
                listener,
                peer: peer_addr,
                id,
                cause,
            });
            drop(permit);
            if connections.is_empty() {
                drained.notify_waiters();
            }
        });
    }

    /// Ask one session to close.
    pub fn close(&self, id: &ConnectionId) -> Result<()> {
        let entry = self
            .connections
            .get(id)
            .ok_or_else(|| ServerError::ConnectionNotFound(id.clone()))?;
        if entry.control_tx.try_send(ControlMessage::Close).is_err() {
            trace!(id = %id, "close signal dropped, session already ending");
        }
        Ok(())
    }

    /// Ask every session to close.
    pub fn close_all(&self) {
        debug!(count = self.connections.len(), "closing all sessions");
        for entry in self.connections.iter() {
            if entry.control_tx.try_send(ControlMessage::Close).is_err() {
                trace!(id = %entry.key(), "close signal dropped, session already ending");
            }
        }
    }

    /// Wait until every registered session has ended.
    pub async fn drain(&self) {
        loop {
            let notified = self.drained.notified();
            if self.connections.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Number of live sessions.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether a session with this id is live.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Snapshot of every live session.
    pub fn infos(&self) -> Vec<ConnectionInfo> {
        self.connections
            .iter()
            .map(|entry| ConnectionInfo {
                id: entry.key().clone(),
                state: ConnectionState::from_u8(entry.state.load(Ordering::SeqCst)),
                peer_addr: entry.peer_addr,
                listener: entry.listener,
                created_at: entry.created_at,
                records_received: entry.stats.records_received.load(Ordering::Relaxed),
                replies_sent: entry.stats.replies_sent.load(Ordering::Relaxed),
                bytes_sent: entry.stats.bytes_sent.load(Ordering::Relaxed),
            })
            .collect()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .finish_non_exhaustive()
    }
}
