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

//! # Wireline Service
//!
//! A reusable TCP pipeline service: any number of listening sockets feed
//! one shared connection registry, and each accepted connection runs a
//! read/frame/dispatch/write loop over delimited records. Single-field
//! records are commands resolved inside the pipeline; multi-field records
//! are forwarded to an application [`RecordHandler`], and every record is
//! answered with exactly one reply line on the connection it arrived on.
//!
//! ## Architecture
//!
//! ```text
//! ServerGroup
//!   ├── Listener (one per attached socket)
//!   │     └── accept → admission permit → TLS handshake → session setup
//!   ├── ConnectionManager (shared registry)
//!   │     └── ConnectionWorker (one task per session)
//!   │           └── Connection (Framed<ServerStream, CsvCodec>)
//!   ├── EventBus (lifecycle notifications)
//!   └── ServerMetrics (lock-free counters)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wireline_service::{CallbackHandler, DispatchReply, ServerConfig, ServerGroup};
//!
//! #[tokio::main]
//! async fn main() -> wireline_service::Result<()> {
//!     let config = ServerConfig::new("csv-echo").with_banner("Welcome to csv-echo");
//!     let group = ServerGroup::new(config);
//!     group.attach("127.0.0.1:7000".parse().unwrap()).await?;
//!     group
//!         .start(Arc::new(CallbackHandler::new(|_id, fields| {
//!             DispatchReply::send(fields.join(","))
//!         })))
//!         .await?;
//!     tokio::signal::ctrl_c().await?;
//!     group.shutdown("operator stop", true).await
//! }
//! ```

#![warn(clippy::cargo)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(future_incompatible)]
#![warn(rust_2018_idioms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod config;
mod connection;
mod dispatch;
mod error;
mod events;
mod handler;
mod listener;
mod manager;
mod metrics;
mod server;
mod stream;
mod tls;
mod types;
mod worker;

pub use self::config::{ConnectionIdBuilder, ServerConfig};
pub use self::connection::{Connection, ConnectionStats};
pub use self::error::{Result, ServerError};
pub use self::events::{EventBus, EventObserver, ServerEvent};
pub use self::handler::{CallbackHandler, DispatchReply, NullHandler, RecordHandler};
pub use self::metrics::{MetricsSnapshot, ServerMetrics};
pub use self::server::ServerGroup;
pub use self::stream::ServerStream;
pub use self::tls::{TlsPolicy, TlsPolicyBuilder};
pub use self::types::{
    CloseCause, ConnectionId, ConnectionInfo, ConnectionState, ServerSnapshot,
};
pub use wireline_csvcodec::{CsvCodec, FrameEvent, FrameViolation, Record};
