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

//! A small CSV echo server.
//!
//! Try it with `telnet 127.0.0.1 7000` or `nc 127.0.0.1 7000`:
//!
//! ```text
//! $ nc 127.0.0.1 7000
//! Welcome to csv-echo
//! noop
//! OK
//! alpha, beta, gamma
//! echo: alpha|beta|gamma
//! bye
//! Bye!
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wireline_service::{CallbackHandler, DispatchReply, ServerConfig, ServerEvent, ServerGroup};

#[tokio::main]
async fn main() -> wireline_service::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wireline_service=debug".into()),
        )
        .init();

    let config = ServerConfig::new("csv-echo")
        .with_banner("Welcome to csv-echo")
        .with_max_connections(100)
        .with_idle_timeout(Duration::from_secs(600));

    let group = ServerGroup::new(config);
    group.subscribe(|event| {
        if let ServerEvent::ConnectionClosed { id, cause, .. } = event {
            info!(%id, %cause, "session ended");
        }
    });

    let addr = group.attach("127.0.0.1:7000".parse().unwrap()).await?;
    info!(%addr, "attached");

    group
        .start(Arc::new(CallbackHandler::new(|_id, fields| {
            DispatchReply::send(format!("echo: {}", fields.join("|")))
        })))
        .await?;
    info!("serving, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    group.shutdown("operator stop", true).await
}
