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

//! One framed connection
//!
//! A [`Connection`] owns its transport and codec outright. Framing state is
//! per connection and never shared; the owning worker is the only task that
//! reads or writes it.

use crate::error::Result;
use crate::stream::ServerStream;
use crate::types::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::Framed;
use wireline_csvcodec::{CsvCodec, FrameEvent};

/// Per-connection traffic counters, shared with the registry for snapshots.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Complete records framed on this connection
    pub records_received: AtomicU64,
    /// Reply lines written on this connection
    pub replies_sent: AtomicU64,
    /// Reply bytes written, terminator included
    pub bytes_sent: AtomicU64,
}

/// A framed connection owned by exactly one worker task.
pub struct Connection {
    framed: Framed<ServerStream, CsvCodec>,
    id: ConnectionId,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    created_at: Instant,
    tls: bool,
    stats: Arc<ConnectionStats>,
}

impl Connection {
    /// Wrap an accepted stream with the record codec.
    pub fn wrap(stream: ServerStream, id: ConnectionId, codec: CsvCodec) -> io::Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let tls = stream.is_tls();
        Ok(Self {
            framed: Framed::new(stream, codec),
            id,
            peer_addr,
            local_addr,
            created_at: Instant::now(),
            tls,
            stats: Arc::new(ConnectionStats::default()),
        })
    }

    /// Connection identifier.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Remote socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Local (listener) socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// When the connection was wrapped.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether the transport is encrypted.
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Shared handle to the traffic counters.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.stats.clone()
    }

    /// Read the next frame event.
    ///
    /// Returns `Ok(None)` on a clean EOF from the peer.
    pub async fn next_frame(&mut self) -> Result<Option<FrameEvent>> {
        match self.framed.next().await {
            Some(Ok(event)) => {
                if matches!(event, FrameEvent::Record(_)) {
                    self.stats.records_received.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("wireline.records.received").increment(1);
                }
                Ok(Some(event))
            }
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }

    /// Write one reply line, terminator appended by the codec.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.framed.send(line).await?;
        self.stats.replies_sent.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_sent
            .fetch_add(line.len() as u64 + 1, Ordering::Relaxed);
        metrics::counter!("wireline.replies.sent").increment(1);
        Ok(())
    }

    /// Best-effort transport shutdown during cleanup.
    pub async fn shutdown(&mut self) {
        if let Err(err) = self.framed.get_mut().shutdown().await {
            tracing::trace!(id = %self.id, error = %err, "shutdown after close");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.local_addr)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (socket, peer) = listener.accept().await.unwrap();
        let connection = Connection::wrap(
            ServerStream::plain(socket),
            ConnectionId::new(peer.to_string()),
            CsvCodec::new(),
        )
        .unwrap();
        (connection, client)
    }

    #[tokio::test]
    async fn test_next_frame_yields_records() {
        let (mut connection, mut client) = pair().await;
        client.write_all(b"a,b,c\n").await.unwrap();

        let event = connection.next_frame().await.unwrap().unwrap();
        let FrameEvent::Record(record) = event else {
            panic!("expected record");
        };
        assert_eq!(record.fields(), &["a", "b", "c"]);
        assert_eq!(
            connection.stats().records_received.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_next_frame_none_on_eof() {
        let (mut connection, client) = pair().await;
        drop(client);
        assert!(connection.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_line_appends_terminator_and_counts() {
        let (mut connection, mut client) = pair().await;
        connection.send_line("OK").await.unwrap();

        let mut buf = [0u8; 3];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"OK\n");

        let stats = connection.stats();
        assert_eq!(stats.replies_sent.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_sent.load(Ordering::Relaxed), 3);
    }
}
