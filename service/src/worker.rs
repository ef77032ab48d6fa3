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

//! Per-connection session worker
//!
//! One worker task per connection runs the read/frame/dispatch/write loop:
//! read until a complete record frames, resolve it (built-in or handler),
//! write exactly one reply line, then read again. Replies always go out on
//! the connection the record arrived on. The worker listens on a control
//! channel so the registry can close the session from outside.

use crate::connection::Connection;
use crate::dispatch::{self, Dispatch};
use crate::events::{EventBus, ServerEvent};
use crate::handler::RecordHandler;
use crate::types::{CloseCause, ConnectionState};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use wireline_csvcodec::FrameEvent;

/// Messages the registry can send into a running worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlMessage {
    /// Stop the session; the worker reports [`CloseCause::ClosedByServer`].
    Close,
}

/// Worker knobs taken from the group configuration at session creation.
#[derive(Debug, Clone)]
pub(crate) struct WorkerConfig {
    pub idle_timeout: Duration,
    pub write_timeout: Duration,
    pub control_buffer_size: usize,
    pub name_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            write_timeout: Duration::from_secs(30),
            control_buffer_size: 8,
            name_prefix: "wireline-conn".to_string(),
        }
    }
}

/// Outcome of writing one reply line.
enum WriteOutcome {
    Written,
    Failed,
}

/// The session loop for one connection.
pub(crate) struct ConnectionWorker {
    connection: Connection,
    handler: Arc<dyn RecordHandler>,
    state: Arc<AtomicU8>,
    control_rx: mpsc::Receiver<ControlMessage>,
    events: Arc<EventBus>,
    name: String,
    idle_timeout: Duration,
    write_timeout: Duration,
    banner: Option<String>,
}

impl ConnectionWorker {
    /// Build a worker and the control-channel sender the registry keeps.
    pub fn new(
        connection: Connection,
        handler: Arc<dyn RecordHandler>,
        state: Arc<AtomicU8>,
        config: &WorkerConfig,
        events: Arc<EventBus>,
        banner: Option<String>,
    ) -> (Self, mpsc::Sender<ControlMessage>) {
        let (control_tx, control_rx) = mpsc::channel(config.control_buffer_size);
        let name = format!("{}-{}", config.name_prefix, connection.id());
        let worker = Self {
            connection,
            handler,
            state,
            control_rx,
            events,
            name,
            idle_timeout: config.idle_timeout,
            write_timeout: config.write_timeout,
            banner: banner.filter(|b| !b.is_empty()),
        };
        (worker, control_tx)
    }

    /// Run the session to completion and report why it ended.
    #[tracing::instrument(name = "session", skip_all, fields(worker = %self.name, peer = %self.connection.peer_addr()))]
    pub async fn run(mut self) -> CloseCause {
        let id = self.connection.id().clone();
        self.state
            .store(ConnectionState::Active.as_u8(), Ordering::SeqCst);
        debug!("session active");

        self.handler.on_connect(&id).await;

        let cause = match self.banner.take() {
            Some(banner) => match self.write_reply(&banner).await {
                WriteOutcome::Written => self.session_loop().await,
                WriteOutcome::Failed => CloseCause::IoFault,
            },
            None => self.session_loop().await,
        };

        self.state
            .store(ConnectionState::Closing.as_u8(), Ordering::SeqCst);
        self.handler.on_disconnect(&id).await;
        self.connection.shutdown().await;
        while self.control_rx.try_recv().is_ok() {}
        self.state
            .store(ConnectionState::Closed.as_u8(), Ordering::SeqCst);
        debug!(cause = %cause, "session ended");
        cause
    }

    async fn session_loop(&mut self) -> CloseCause {
        loop {
            tokio::select! {
                control = self.control_rx.recv() => {
                    match control {
                        // A dropped control channel means the registry is
                        // gone; treat it like an explicit close.
                        Some(ControlMessage::Close) | None => {
                            return CloseCause::ClosedByServer;
                        }
                    }
                }
                framed = timeout(self.idle_timeout, self.connection.next_frame()) => {
                    match framed {
                        Ok(Ok(Some(FrameEvent::Record(record)))) => {
                            if let Some(cause) = self.handle_record(&record).await {
                                return cause;
                            }
                        }
                        Ok(Ok(Some(FrameEvent::Violation(violation)))) => {
                            trace!(id = %self.connection.id(), violation = %violation, "frame violation");
                            if let WriteOutcome::Failed =
                                self.write_reply(violation.diagnostic()).await
                            {
                                return CloseCause::IoFault;
                            }
                        }
                        Ok(Ok(None)) => return CloseCause::ClosedByClient,
                        Ok(Err(err)) => {
                            warn!(id = %self.connection.id(), error = %err, "read failed");
                            self.events.emit(ServerEvent::Fault {
                                timestamp: Utc::now(),
                                context: format!("read on {}", self.connection.id()),
                                detail: err.to_string(),
                            });
                            return CloseCause::IoFault;
                        }
                        Err(_) => return CloseCause::TimedOut,
                    }
                }
            }
        }
    }

    /// Resolve and answer one record; `Some` means the session ends.
    async fn handle_record(&mut self, record: &wireline_csvcodec::Record) -> Option<CloseCause> {
        let now = Utc::now();
        let id = self.connection.id().clone();
        let (reply, close) = match dispatch::dispatch(record, &id, now) {
            Dispatch::Builtin {
                reply,
                close,
                idle_override,
            } => {
                if let Some(idle) = idle_override {
                    debug!(id = %id, idle = ?idle, "idle timeout updated");
                    self.idle_timeout = idle;
                }
                (reply, close)
            }
            Dispatch::Forward => {
                let outcome = self.handler.on_record(&id, now, record.fields()).await;
                (outcome.value, outcome.close)
            }
        };

        if let WriteOutcome::Failed = self.write_reply(&reply).await {
            return Some(CloseCause::IoFault);
        }
        if close {
            return Some(CloseCause::ClosedByClient);
        }
        None
    }

    async fn write_reply(&mut self, line: &str) -> WriteOutcome {
        match timeout(self.write_timeout, self.connection.send_line(line)).await {
            Ok(Ok(())) => WriteOutcome::Written,
            Ok(Err(err)) => {
                warn!(id = %self.connection.id(), error = %err, "write failed");
                WriteOutcome::Failed
            }
            Err(_) => {
                warn!(id = %self.connection.id(), "write timed out");
                WriteOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{CallbackHandler, DispatchReply, NullHandler};
    use crate::stream::ServerStream;
    use crate::types::ConnectionId;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tracing_test::traced_test;
    use wireline_csvcodec::CsvCodec;

    async fn spawn_worker(
        handler: Arc<dyn RecordHandler>,
        config: WorkerConfig,
        banner: Option<String>,
    ) -> (
        TcpStream,
        mpsc::Sender<ControlMessage>,
        tokio::task::JoinHandle<CloseCause>,
    ) {
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
        let state = Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8()));
        let (worker, control_tx) = ConnectionWorker::new(
            connection,
            handler,
            state,
            &config,
            Arc::new(EventBus::new()),
            banner,
        );
        let handle = tokio::spawn(worker.run());
        (client, control_tx, handle)
    }

    async fn read_line(client: &mut TcpStream) -> String {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            client.read_exact(&mut byte).await.unwrap();
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }
        String::from_utf8(line).unwrap()
    }

    #[traced_test]
    #[tokio::test]
    async fn test_banner_then_builtin_replies() {
        let (mut client, _control, handle) = spawn_worker(
            Arc::new(NullHandler),
            WorkerConfig::default(),
            Some("Welcome".to_string()),
        )
        .await;

        assert_eq!(read_line(&mut client).await, "Welcome");

        client.write_all(b"noop\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, "OK");

        client.write_all(b"bye\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, "Bye!");

        assert_eq!(handle.await.unwrap(), CloseCause::ClosedByClient);
    }

    #[tokio::test]
    async fn test_multi_field_record_reaches_handler() {
        let handler = Arc::new(CallbackHandler::new(|_id, fields| {
            DispatchReply::send(fields.join("|"))
        }));
        let (mut client, _control, handle) =
            spawn_worker(handler, WorkerConfig::default(), None).await;

        client.write_all(b"a,b,c\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, "a|b|c");

        drop(client);
        assert_eq!(handle.await.unwrap(), CloseCause::ClosedByClient);
    }

    #[tokio::test]
    async fn test_frame_violation_gets_diagnostic_and_session_survives() {
        let (mut client, _control, handle) =
            spawn_worker(Arc::new(NullHandler), WorkerConfig::default(), None).await;

        client.write_all(b"\xFF\xFE\n").await.unwrap();
        assert_eq!(
            read_line(&mut client).await,
            "Protocol Error: Invalid UTF8 encoding!"
        );

        client.write_all(b"noop\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, "OK");

        drop(client);
        assert_eq!(handle.await.unwrap(), CloseCause::ClosedByClient);
    }

    #[tokio::test]
    async fn test_control_close_reports_closed_by_server() {
        let (client, control, handle) =
            spawn_worker(Arc::new(NullHandler), WorkerConfig::default(), None).await;

        control.send(ControlMessage::Close).await.unwrap();
        assert_eq!(handle.await.unwrap(), CloseCause::ClosedByServer);
        drop(client);
    }

    #[tokio::test]
    async fn test_idle_timeout_reports_timed_out() {
        let config = WorkerConfig {
            idle_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let (client, _control, handle) = spawn_worker(Arc::new(NullHandler), config, None).await;

        assert_eq!(handle.await.unwrap(), CloseCause::TimedOut);
        drop(client);
    }

    #[tokio::test]
    async fn test_settimeout_takes_effect_for_the_session() {
        let config = WorkerConfig {
            idle_timeout: Duration::from_secs(60),
            ..Default::default()
        };
        let (mut client, _control, handle) = spawn_worker(Arc::new(NullHandler), config, None).await;

        client.write_all(b"settimeout=50\n").await.unwrap();
        assert_eq!(read_line(&mut client).await, "SetTimeout=50ms");

        // The shortened timeout now governs the idle session.
        assert_eq!(handle.await.unwrap(), CloseCause::TimedOut);
        drop(client);
    }
}
