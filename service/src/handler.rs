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

//! Application-side record handling
//!
//! A [`RecordHandler`] is the seam between the pipeline and the application.
//! Multi-field records that no built-in command claims are forwarded to
//! [`RecordHandler::on_record`], and the returned [`DispatchReply`] is
//! written back on the same connection before the next record is read.

use crate::types::ConnectionId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of handling one record.
///
/// Exactly one reply line is written per dispatched record; an empty `value`
/// still produces a bare terminator on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReply {
    /// Reply text, written followed by the line terminator
    pub value: String,
    /// Close the connection after the reply is flushed
    pub close: bool,
}

impl DispatchReply {
    /// Reply with text and keep the connection open.
    pub fn send(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            close: false,
        }
    }

    /// Reply with text and close the connection afterwards.
    pub fn send_and_close(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            close: true,
        }
    }
}

/// Trait for handling records and session lifecycle
///
/// Implement this trait to build a protocol on top of the pipeline. All
/// methods have default no-op implementations, so implementors only override
/// what they need.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use chrono::{DateTime, Utc};
/// use wireline_service::{ConnectionId, DispatchReply, RecordHandler};
///
/// struct EchoHandler;
///
/// #[async_trait]
/// impl RecordHandler for EchoHandler {
///     async fn on_record(
///         &self,
///         _id: &ConnectionId,
///         _timestamp: DateTime<Utc>,
///         fields: &[String],
///     ) -> DispatchReply {
///         DispatchReply::send(fields.join(","))
///     }
/// }
/// ```
#[async_trait]
pub trait RecordHandler: Send + Sync + 'static {
    /// Called when a session becomes active, after the banner is written.
    async fn on_connect(&self, id: &ConnectionId) {
        let _ = id;
    }

    /// Called with the fields of a multi-field record.
    ///
    /// `timestamp` is when the record finished framing. The default
    /// implementation replies with an empty line and keeps the connection
    /// open.
    async fn on_record(
        &self,
        id: &ConnectionId,
        timestamp: DateTime<Utc>,
        fields: &[String],
    ) -> DispatchReply {
        let _ = (id, timestamp, fields);
        DispatchReply::default()
    }

    /// Called exactly once when a session reaches its terminal state.
    async fn on_disconnect(&self, id: &ConnectionId) {
        let _ = id;
    }
}

/// A [`RecordHandler`] built from a single closure.
///
/// Useful for tests and small servers that only care about records.
pub struct CallbackHandler<F>
where
    F: Fn(&ConnectionId, &[String]) -> DispatchReply + Send + Sync + 'static,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(&ConnectionId, &[String]) -> DispatchReply + Send + Sync + 'static,
{
    /// Wrap a closure as a handler.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> RecordHandler for CallbackHandler<F>
where
    F: Fn(&ConnectionId, &[String]) -> DispatchReply + Send + Sync + 'static,
{
    async fn on_record(
        &self,
        id: &ConnectionId,
        _timestamp: DateTime<Utc>,
        fields: &[String],
    ) -> DispatchReply {
        (self.callback)(id, fields)
    }
}

/// Handler with every default left in place.
///
/// Used when a server group is started without application logic; every
/// forwarded record gets an empty reply and the connection stays open.
#[derive(Debug, Default)]
pub struct NullHandler;

#[async_trait]
impl RecordHandler for NullHandler {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_on_record_replies_empty_and_keeps_open() {
        let handler = NullHandler;
        let id = ConnectionId::new("127.0.0.1:1");
        let reply = handler
            .on_record(&id, Utc::now(), &["a".to_string(), "b".to_string()])
            .await;
        assert_eq!(reply.value, "");
        assert!(!reply.close);
    }

    #[tokio::test]
    async fn test_callback_handler_invokes_closure() {
        let handler =
            CallbackHandler::new(|_id, fields| DispatchReply::send(format!("{}", fields.len())));
        let id = ConnectionId::new("127.0.0.1:1");
        let fields = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let reply = handler.on_record(&id, Utc::now(), &fields).await;
        assert_eq!(reply.value, "3");
        assert!(!reply.close);
    }

    #[test]
    fn test_dispatch_reply_constructors() {
        let keep = DispatchReply::send("OK");
        assert_eq!(keep.value, "OK");
        assert!(!keep.close);

        let close = DispatchReply::send_and_close("Bye!");
        assert_eq!(close.value, "Bye!");
        assert!(close.close);
    }
}
