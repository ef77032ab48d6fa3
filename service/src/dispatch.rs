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

//! Built-in command dispatch
//!
//! Single-field records are commands and are resolved here, inside the
//! pipeline, without touching the application handler. Multi-field records
//! are always forwarded. Command names are matched case-insensitively on the
//! already-trimmed field.

use crate::types::ConnectionId;
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;
use wireline_csvcodec::Record;

/// Reply text for unrecognized commands and malformed parameters.
pub(crate) const COMMAND_ERROR: &str = "Command Error!";

/// Reply text for session-terminating commands.
pub(crate) const BYE: &str = "Bye!";

const HELP_TEXT: &str = "Available commands:\n\
    bye | exit | quit | logout - close the connection\n\
    noop                       - no operation, replies OK\n\
    gettime                    - current server time, RFC 3339\n\
    getconnectionid            - identifier of this connection\n\
    settimeout=<millis>        - set the idle timeout for this connection\n\
    help                       - this text";

/// Resolved outcome for one framed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// The pipeline answers itself.
    Builtin {
        /// Reply line to write
        reply: String,
        /// Close the session after the reply is flushed
        close: bool,
        /// New idle timeout to apply to this session
        idle_override: Option<Duration>,
    },
    /// Hand the record's fields to the application handler.
    Forward,
}

impl Dispatch {
    fn reply(reply: impl Into<String>) -> Self {
        Self::Builtin {
            reply: reply.into(),
            close: false,
            idle_override: None,
        }
    }

    fn reply_and_close(reply: impl Into<String>) -> Self {
        Self::Builtin {
            reply: reply.into(),
            close: true,
            idle_override: None,
        }
    }
}

/// Resolve a record against the built-in command table.
pub(crate) fn dispatch(record: &Record, id: &ConnectionId, now: DateTime<Utc>) -> Dispatch {
    let fields = record.fields();
    if fields.len() != 1 {
        return Dispatch::Forward;
    }
    let field = fields[0].as_str();

    // Parameterized commands use key=value form in the single field.
    if let Some((key, value)) = field.split_once('=') {
        if key.trim().eq_ignore_ascii_case("settimeout") {
            return match value.trim().parse::<u32>() {
                Ok(millis) => Dispatch::Builtin {
                    reply: format!("SetTimeout={millis}ms"),
                    close: false,
                    idle_override: Some(Duration::from_millis(u64::from(millis))),
                },
                Err(_) => Dispatch::reply(COMMAND_ERROR),
            };
        }
        return Dispatch::reply(COMMAND_ERROR);
    }

    match field.to_ascii_lowercase().as_str() {
        "bye" | "exit" | "quit" | "logout" => Dispatch::reply_and_close(BYE),
        "noop" => Dispatch::reply("OK"),
        "gettime" => Dispatch::reply(now.to_rfc3339_opts(SecondsFormat::Micros, true)),
        "getconnectionid" => Dispatch::reply(id.to_string()),
        "help" => Dispatch::reply(HELP_TEXT),
        _ => Dispatch::reply(COMMAND_ERROR),
    }
}
