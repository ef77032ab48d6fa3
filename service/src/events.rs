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

//! Lifecycle notifications aggregated across all listeners of a group
//!
//! Every listener and every connection worker publishes into one
//! [`EventBus`] per server group. Observers are plain callbacks, invoked
//! synchronously in registration order; publishers run on arbitrary worker
//! tasks, so the observer list lives behind an `RwLock`.

use crate::types::{CloseCause, ConnectionId};
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

/// A lifecycle notification raised by a listener or a connection worker.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A listening socket was bound and registered with the group.
    ListenerAttached {
        /// When the listener was attached
        timestamp: DateTime<Utc>,
        /// The bound address
        listener: SocketAddr,
        /// Human-readable context
        message: String,
    },
    /// A listening socket was unregistered (shutdown or detach).
    ListenerDetached {
        /// When the listener was detached
        timestamp: DateTime<Utc>,
        /// The previously bound address
        listener: SocketAddr,
        /// Human-readable context
        message: String,
    },
    /// A connection was admitted and its session created.
    ConnectionOpened {
        /// When the session was created
        timestamp: DateTime<Utc>,
        /// The accepting listener
        listener: SocketAddr,
        /// The remote socket
        peer: SocketAddr,
        /// The session's connection id
        id: ConnectionId,
    },
    /// A session reached its terminal state.
    ConnectionClosed {
        /// When the session ended
        timestamp: DateTime<Utc>,
        /// The accepting listener
        listener: SocketAddr,
        /// The remote socket
        peer: SocketAddr,
        /// The session's connection id
        id: ConnectionId,
        /// Why the session ended
        cause: CloseCause,
    },
    /// An unexpected failure attributable to one accept or one session.
    Fault {
        /// When the failure occurred
        timestamp: DateTime<Utc>,
        /// What was being attempted
        context: String,
        /// The underlying error text
        detail: String,
    },
    /// The group completed an orderly shutdown.
    Completed {
        /// When shutdown finished
        timestamp: DateTime<Utc>,
        /// The shutdown message passed by the caller
        message: String,
    },
}

impl ServerEvent {
    /// When the event was raised.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ListenerAttached { timestamp, .. }
            | Self::ListenerDetached { timestamp, .. }
            | Self::ConnectionOpened { timestamp, .. }
            | Self::ConnectionClosed { timestamp, .. }
            | Self::Fault { timestamp, .. }
            | Self::Completed { timestamp, .. } => *timestamp,
        }
    }
}

/// A registered event observer.
pub type EventObserver = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Aggregated notification surface for one server group.
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<Vec<EventObserver>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    ///
    /// Observers are invoked synchronously, in registration order, on
    /// whichever task raises the event. Keep them fast; anything slow should
    /// hand off to a channel.
    pub fn subscribe(&self, observer: impl Fn(&ServerEvent) + Send + Sync + 'static) {
        self.observers.write().unwrap().push(Arc::new(observer));
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().unwrap().len()
    }

    /// Publish an event to all observers.
    pub fn emit(&self, event: ServerEvent) {
        tracing::debug!(event = ?event, "server event");
        let observers = self.observers.read().unwrap();
        for observer in observers.iter() {
            observer(&event);
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_observers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            bus.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(ServerEvent::Completed {
            timestamp: Utc::now(),
            message: "done".to_string(),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(bus.observer_count(), 3);
    }

    #[test]
    fn test_observers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe(move |_| {
                order.lock().unwrap().push(tag);
            });
        }

        bus.emit(ServerEvent::Completed {
            timestamp: Utc::now(),
            message: String::new(),
        });

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_event_timestamp_accessor() {
        let timestamp = Utc::now();
        let event = ServerEvent::Fault {
            timestamp,
            context: "accept".to_string(),
            detail: "boom".to_string(),
        };
        assert_eq!(event.timestamp(), timestamp);
    }
}
