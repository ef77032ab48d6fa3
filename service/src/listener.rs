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

//! Listening sockets and connection admission
//!
//! Each listener runs its own accept loop and enforces its own concurrent
//! connection ceiling. Admission is decided with a single atomic
//! check-then-increment before any TLS handshake or session setup spends
//! work on the socket; a socket turned away is closed by drop and no
//! session ever exists for it.

use crate::connection::Connection;
use crate::error::Result;
use crate::events::ServerEvent;
use crate::server::ListenerContext;
use crate::stream::ServerStream;
use crate::types::ConnectionId;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use wireline_csvcodec::CsvCodec;

/// How long the accept loop backs off after a transient accept failure.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// An admission slot held for the whole life of one session.
///
/// Acquired with an atomic check-then-increment, so concurrent accepts
/// cannot overshoot the ceiling. Dropping the permit frees the slot.
pub(crate) struct ConnectionPermit {
    active: Arc<AtomicUsize>,
}

impl ConnectionPermit {
    /// Try to claim a slot under the given ceiling.
    pub fn acquire(active: &Arc<AtomicUsize>, ceiling: usize) -> Option<Self> {
        active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < ceiling).then_some(current + 1)
            })
            .ok()
            .map(|_| Self {
                active: active.clone(),
            })
    }
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A bound listening socket, not yet accepting.
pub(crate) struct Listener {
    socket: TcpListener,
    addr: SocketAddr,
    active: Arc<AtomicUsize>,
}

impl Listener {
    /// Bind a new listening socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = TcpListener::bind(addr).await?;
        Self::from_socket(socket)
    }

    /// Adopt an already bound socket.
    pub fn from_socket(socket: TcpListener) -> Result<Self> {
        let addr = socket.local_addr()?;
        Ok(Self {
            socket,
            addr,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The bound address, with the OS-assigned port resolved.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the accept loop until the group shuts down.
    pub async fn run(self, ctx: ListenerContext) {
        info!(listener = %self.addr, "listener accepting");
        // One pinned notified future so a shutdown raised between loop
        // iterations is never missed.
        let shutdown = ctx.shutdown.notified();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!(listener = %self.addr, "listener stopping");
                    return;
                }
                accepted = self.socket.accept() => {
                    match accepted {
                        Ok((socket, peer)) => self.admit(socket, peer, &ctx),
                        Err(err) => {
                            warn!(listener = %self.addr, error = %err, "accept failed");
                            ctx.metrics.connection_error();
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }
    }

    /// Decide admission and, if admitted, hand the socket to session setup.
    fn admit(&self, socket: TcpStream, peer: SocketAddr, ctx: &ListenerContext) {
        let ceiling = ctx.max_connections.load(Ordering::SeqCst);
        let Some(permit) = ConnectionPermit::acquire(&self.active, ceiling) else {
            warn!(listener = %self.addr, peer = %peer, ceiling, "connection rejected at ceiling");
            ctx.metrics.connection_rejected();
            return;
        };

        // Session setup runs off the accept loop so a slow TLS handshake
        // cannot stall other admissions.
        let listener_addr = self.addr;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(err) = establish(socket, peer, listener_addr, &ctx, permit).await {
                warn!(listener = %listener_addr, peer = %peer, error = %err, "session setup failed");
                ctx.metrics.connection_error();
                ctx.events.emit(ServerEvent::Fault {
                    timestamp: Utc::now(),
                    context: format!("session setup for {peer} on {listener_addr}"),
                    detail: err.to_string(),
                });
            }
        });
    }
}

/// Complete session setup for one admitted socket.
///
/// The permit is consumed into the registry on success and released by drop
/// on any failure.
#[tracing::instrument(name = "establish", skip_all, fields(listener = %listener_addr, peer = %peer))]
async fn establish(
    socket: TcpStream,
    peer: SocketAddr,
    listener_addr: SocketAddr,
    ctx: &ListenerContext,
    permit: ConnectionPermit,
) -> Result<()> {
    if let Err(err) = socket.set_nodelay(true) {
        debug!(peer = %peer, error = %err, "set_nodelay failed");
    }

    let stream = match &ctx.acceptor {
        Some(acceptor) => ServerStream::tls(acceptor.accept(socket).await?),
        None => ServerStream::plain(socket),
    };

    let id = ConnectionId::new(ctx.config.build_connection_id(listener_addr, peer));
    let codec = CsvCodec::new()
        .with_delimiters(ctx.config.delimiters.clone())
        .with_max_record_length(ctx.config.max_record_length);
    let connection = Connection::wrap(stream, id, codec)?;
    ctx.manager
        .add_connection(connection, ctx.handler.clone(), listener_addr, permit);
    Ok(())
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("addr", &self.addr)
            .field("active", &self.active.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_enforces_ceiling() {
        let active = Arc::new(AtomicUsize::new(0));

        let first = ConnectionPermit::acquire(&active, 2);
        let second = ConnectionPermit::acquire(&active, 2);
        let third = ConnectionPermit::acquire(&active, 2);

        assert!(first.is_some());
        assert!(second.is_some());
        assert!(third.is_none());
        assert_eq!(active.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_permit_drop_frees_slot() {
        let active = Arc::new(AtomicUsize::new(0));

        let permit = ConnectionPermit::acquire(&active, 1).unwrap();
        assert!(ConnectionPermit::acquire(&active, 1).is_none());

        drop(permit);
        assert_eq!(active.load(Ordering::SeqCst), 0);
        assert!(ConnectionPermit::acquire(&active, 1).is_some());
    }

    #[test]
    fn test_zero_ceiling_admits_nothing() {
        let active = Arc::new(AtomicUsize::new(0));
        assert!(ConnectionPermit::acquire(&active, 0).is_none());
    }

    #[tokio::test]
    async fn test_bind_resolves_os_assigned_port() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        assert_ne!(listener.addr().port(), 0);
    }
}
