/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */
use std::fmt::Debug;
use std::time::Duration;

use tracing::{debug, trace};

/// A lifecycle point reached during an RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// About to open the session.
    Connecting,
    /// About to subscribe to the reply destination.
    Subscribing {
        /// Reply destination.
        destination: String,
    },
    /// About to publish the request.
    Sending {
        /// Request destination.
        target: String,
        /// Advertised reply destination.
        reply_to: String,
    },
    /// Waiting for a single reply.
    Receiving {
        /// Receive deadline.
        timeout: Duration,
    },
    /// Waiting on the response collector.
    Collecting {
        /// Collection window.
        timeout: Duration,
    },
    /// The response collector finished.
    Collected {
        /// Number of replies gathered.
        responses: usize,
    },
    /// About to close the session.
    Disconnecting,
}

/// Instrumentation hook invoked at each [`CallEvent`].
///
/// Observers are notified synchronously on the calling task and should return
/// quickly.
pub trait CallObserver: Send + Sync + Debug {
    /// Records `event`.
    fn on_event(&self, event: &CallEvent);
}

/// The default observer, writing every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn on_event(&self, event: &CallEvent) {
        match event {
            CallEvent::Connecting => debug!("connecting, wait=true"),
            CallEvent::Subscribing { destination } => debug!(%destination, "subscribing"),
            CallEvent::Sending { target, reply_to } => debug!(%target, %reply_to, "sending"),
            CallEvent::Receiving { timeout } => debug!(?timeout, "receiving reply"),
            CallEvent::Collecting { timeout } => debug!(?timeout, "collecting replies"),
            CallEvent::Collected { responses } => trace!(responses, "collection finished"),
            CallEvent::Disconnecting => debug!("disconnecting"),
        }
    }
}
