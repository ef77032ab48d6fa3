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

//! The server group: listeners, registry, and lifecycle
//!
//! A [`ServerGroup`] ties any number of listening sockets to one shared
//! connection registry, one handler, and one notification surface.
//! Listeners may be attached before or after start; attach binds the socket
//! immediately, start begins accepting.

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::events::{EventBus, ServerEvent};
use crate::handler::{NullHandler, RecordHandler};
use crate::listener::Listener;
use crate::manager::ConnectionManager;
use crate::metrics::{MetricsSnapshot, ServerMetrics};
use crate::types::{ConnectionId, ConnectionInfo, ServerSnapshot};
use crate::worker::WorkerConfig;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// How long shutdown waits for each accept loop to acknowledge.
const LISTENER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything an accept loop needs, cloned per listener.
#[derive(Clone)]
pub(crate) struct ListenerContext {
    pub manager: Arc<ConnectionManager>,
    pub handler: Arc<dyn RecordHandler>,
    pub events: Arc<EventBus>,
    pub metrics: Arc<ServerMetrics>,
    pub config: Arc<ServerConfig>,
    pub max_connections: Arc<AtomicUsize>,
    pub shutdown: Arc<Notify>,
    pub acceptor: Option<TlsAcceptor>,
}

/// A group of listeners sharing one registry and one handler
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use wireline_service::{CallbackHandler, DispatchReply, ServerConfig, ServerGroup};
///
/// # async fn run() -> wireline_service::Result<()> {
/// let group = ServerGroup::new(ServerConfig::new("csv-echo").with_banner("ready"));
/// group.attach("127.0.0.1:7000".parse().unwrap()).await?;
/// group.attach("127.0.0.1:7001".parse().unwrap()).await?;
/// group
///     .start(Arc::new(CallbackHandler::new(|_id, fields| {
///         DispatchReply::send(fields.join(","))
///     })))
///     .await?;
/// // ... serve ...
/// group.shutdown("maintenance window", true).await?;
/// # Ok(())
/// # }
/// ```
pub struct ServerGroup {
    config: Arc<ServerConfig>,
    max_connections: Arc<AtomicUsize>,
    manager: Arc<ConnectionManager>,
    metrics: Arc<ServerMetrics>,
    events: Arc<EventBus>,
    running: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
    handler: Mutex<Option<Arc<dyn RecordHandler>>>,
    pending: Mutex<Vec<Listener>>,
    started: Mutex<Vec<(SocketAddr, JoinHandle<()>)>>,
    started_at: Instant,
    acceptor: Option<TlsAcceptor>,
}

impl ServerGroup {
    /// Create a group from a configuration. No sockets are bound yet.
    pub fn new(config: ServerConfig) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        let events = Arc::new(EventBus::new());
        let worker_config = WorkerConfig {
            idle_timeout: config.idle_timeout,
            write_timeout: config.write_timeout,
            name_prefix: config.worker_name_prefix.clone(),
            ..Default::default()
        };
        let manager = Arc::new(ConnectionManager::new(
            metrics.clone(),
            events.clone(),
            worker_config,
            config.banner.clone(),
        ));
        let acceptor = config.tls.as_ref().map(|policy| policy.acceptor());
        let max_connections = Arc::new(AtomicUsize::new(config.max_connections));
        Self {
            config: Arc::new(config),
            max_connections,
            manager,
            metrics,
            events,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            handler: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            started_at: Instant::now(),
            acceptor,
        }
    }

    /// Register a lifecycle observer.
    pub fn subscribe(&self, observer: impl Fn(&ServerEvent) + Send + Sync + 'static) {
        self.events.subscribe(observer);
    }

    /// Bind a listening socket and register it with the group.
    ///
    /// Binds immediately; accepting begins at [`start`](Self::start), or at
    /// once if the group is already running. Returns the bound address with
    /// any OS-assigned port resolved.
    pub async fn attach(&self, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = Listener::bind(addr).await?;
        self.register(listener)
    }

    /// Register an externally bound socket with the group.
    pub fn attach_socket(&self, socket: TcpListener) -> Result<SocketAddr> {
        let listener = Listener::from_socket(socket)?;
        self.register(listener)
    }

    fn register(&self, listener: Listener) -> Result<SocketAddr> {
        let addr = listener.addr();
        self.events.emit(ServerEvent::ListenerAttached {
            timestamp: Utc::now(),
            listener: addr,
            message: format!("{} listening on {addr}", self.config.service_name),
        });
        if self.running.load(Ordering::SeqCst) {
            self.spawn_listener(listener);
        } else {
            self.pending.lock().unwrap().push(listener);
        }
        Ok(addr)
    }

    /// Begin accepting on every attached listener.
    ///
    /// Fails with [`ServerError::AlreadyRunning`] if the group is running.
    pub async fn start(&self, handler: Arc<dyn RecordHandler>) -> Result<()> {
        {
            // The handler must be in place before `running` flips: an attach
            // racing with start spawns its listener as soon as it observes
            // `running`, and that spawn reads the handler slot.
            let mut slot = self.handler.lock().unwrap();
            if self.running.swap(true, Ordering::SeqCst) {
                return Err(ServerError::AlreadyRunning);
            }
            *slot = Some(handler);
        }

        let pending: Vec<Listener> = self.pending.lock().unwrap().drain(..).collect();
        info!(
            service = %self.config.service_name,
            listeners = pending.len(),
            "server group starting"
        );
        for listener in pending {
            self.spawn_listener(listener);
        }
        Ok(())
    }

    /// Begin accepting after a delay.
    pub async fn start_after(&self, delay: Duration, handler: Arc<dyn RecordHandler>) -> Result<()> {
        debug!(service = %self.config.service_name, delay = ?delay, "start scheduled");
        tokio::time::sleep(delay).await;
        self.start(handler).await
    }

    fn spawn_listener(&self, listener: Listener) {
        let addr = listener.addr();
        let handler = self
            .handler
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Arc::new(NullHandler));
        let ctx = ListenerContext {
            manager: self.manager.clone(),
            handler,
            events: self.events.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            max_connections: self.max_connections.clone(),
            shutdown: self.shutdown_notify.clone(),
            acceptor: self.acceptor.clone(),
        };
        let handle = tokio::spawn(listener.run(ctx));
        self.started.lock().unwrap().push((addr, handle));
    }

    /// Stop accepting, close every session, optionally wait for drain.
    ///
    /// `message` is carried on the final [`ServerEvent::Completed`]
    /// notification. With `wait` set, shutdown blocks up to the configured
    /// shutdown timeout for in-flight sessions to end.
    pub async fn shutdown(&self, message: &str, wait: bool) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ServerError::ServerNotRunning);
        }
        info!(service = %self.config.service_name, message, "server group stopping");
        self.shutdown_notify.notify_waiters();

        let started: Vec<(SocketAddr, JoinHandle<()>)> =
            self.started.lock().unwrap().drain(..).collect();
        for (addr, handle) in started {
            if timeout(LISTENER_JOIN_TIMEOUT, handle).await.is_err() {
                warn!(listener = %addr, "accept loop did not stop in time");
            }
            self.events.emit(ServerEvent::ListenerDetached {
                timestamp: Utc::now(),
                listener: addr,
                message: format!("{} stopped listening on {addr}", self.config.service_name),
            });
        }

        self.manager.close_all();
        if wait && timeout(self.config.shutdown_timeout, self.manager.drain())
            .await
            .is_err()
        {
            warn!(
                remaining = self.manager.connection_count(),
                "sessions still open at shutdown timeout"
            );
        }

        self.events.emit(ServerEvent::Completed {
            timestamp: Utc::now(),
            message: message.to_string(),
        });
        Ok(())
    }

    /// Raise or lower the per-listener connection ceiling.
    ///
    /// Applies to future admission decisions only; sessions already admitted
    /// above a lowered ceiling run to completion.
    pub fn set_max_connections(&self, max: usize) {
        debug!(max, "connection ceiling updated");
        self.max_connections.store(max, Ordering::SeqCst);
    }

    /// Ask one session to close.
    pub fn close_connection(&self, id: &ConnectionId) -> Result<()> {
        self.manager.close(id)
    }

    /// Number of live sessions across all listeners.
    pub fn connection_count(&self) -> usize {
        self.manager.connection_count()
    }

    /// Whether the group is accepting.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of every live session.
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.manager.infos()
    }

    /// Point-in-time counters for the group.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Non-blocking overview of the group.
    pub fn snapshot(&self) -> ServerSnapshot {
        let mut listeners: Vec<SocketAddr> = self
            .started
            .lock()
            .unwrap()
            .iter()
            .map(|(addr, _)| *addr)
            .collect();
        listeners.extend(self.pending.lock().unwrap().iter().map(Listener::addr));
        ServerSnapshot {
            active_connections: self.manager.connection_count(),
            total_connections: self.metrics.total_connections(),
            listeners,
            uptime: self.started_at.elapsed(),
            started_at: self.started_at,
        }
    }
}

impl Drop for ServerGroup {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            warn!(
                service = %self.config.service_name,
                "server group dropped while running, sessions aborted"
            );
            self.shutdown_notify.notify_waiters();
        }
    }
}

impl std::fmt::Debug for ServerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerGroup")
            .field("service_name", &self.config.service_name)
            .field("running", &self.is_running())
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}
