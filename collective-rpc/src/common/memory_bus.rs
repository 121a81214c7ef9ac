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
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{instrument, trace, warn};

use crate::common::{get_target, AddressScheme, MemoryConnector};
use crate::message::{Frame, Headers, Message};
use crate::traits::Security;

/// A simulated remote agent: answers a decoded request with an optional reply.
pub type Responder = Arc<dyn Fn(&Message) -> Option<Message> + Send + Sync>;

pub(crate) type SubscriberId = u64;

/// An in-process publish/subscribe bus.
///
/// Destinations map to the transport inboxes of subscribed
/// [`MemoryConnector`]s. Remote agents are simulated with [`Responder`]s
/// registered on a request target; their replies are published to the
/// request's `reply-to` destination, exactly as a node in a real collective
/// would do.
///
/// Clones share the same destinations and agents.
#[derive(Clone)]
pub struct MemoryBus {
    security: Arc<dyn Security>,
    scheme: AddressScheme,
    use_b64: bool,
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    subscribers: DashMap<String, Vec<(SubscriberId, mpsc::UnboundedSender<Frame>)>>,
    agents: DashMap<String, Vec<Responder>>,
    next_subscriber: AtomicU64,
    frames_published: AtomicUsize,
}

impl fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBus")
            .field("scheme", &self.scheme)
            .field("use_b64", &self.use_b64)
            .field("destinations", &self.inner.subscribers.len())
            .field("agent_targets", &self.inner.agents.len())
            .finish()
    }
}

impl MemoryBus {
    /// Creates an empty bus whose agents decode and encode with `security`.
    #[must_use]
    pub fn new(security: Arc<dyn Security>) -> Self {
        Self {
            security,
            scheme: AddressScheme::default(),
            use_b64: false,
            inner: Arc::new(BusInner::default()),
        }
    }

    /// Sets the destination naming convention.
    #[must_use]
    pub fn with_scheme(mut self, scheme: AddressScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets whether frame bodies are base64-wrapped.
    #[must_use]
    pub fn with_b64(mut self, use_b64: bool) -> Self {
        self.use_b64 = use_b64;
        self
    }

    /// Destination naming convention.
    #[must_use]
    pub const fn scheme(&self) -> AddressScheme {
        self.scheme
    }

    /// Whether frame bodies are base64-wrapped.
    #[must_use]
    pub const fn use_b64(&self) -> bool {
        self.use_b64
    }

    /// The security provider used for frames.
    #[must_use]
    pub fn security(&self) -> Arc<dyn Security> {
        Arc::clone(&self.security)
    }

    /// Creates a disconnected connector attached to this bus.
    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector::new(self.clone())
    }

    /// Registers a simulated node answering requests for `agent` in `collective`.
    ///
    /// Registering several responders on the same agent models several nodes;
    /// each one answers the same request independently.
    pub fn register_agent<F>(&self, collective: &str, agent: &str, responder: F)
    where
        F: Fn(&Message) -> Option<Message> + Send + Sync + 'static,
    {
        let target = get_target(self.scheme, collective, agent);
        trace!(%target, "Registering agent responder");
        self.inner
            .agents
            .entry(target)
            .or_default()
            .push(Arc::new(responder));
    }

    /// Number of frames published since the bus was created.
    #[must_use]
    pub fn frames_published(&self) -> usize {
        self.inner.frames_published.load(Ordering::Relaxed)
    }

    /// Number of connectors subscribed to `destination`.
    #[must_use]
    pub fn subscriber_count(&self, destination: &str) -> usize {
        self.inner
            .subscribers
            .get(destination)
            .map_or(0, |entry| entry.len())
    }

    /// Publishes `frame` to its destination.
    ///
    /// Subscribed connectors receive the frame on their transport inbox; agents
    /// registered on the destination answer it. Returns the number of inbox
    /// deliveries plus the number of replies agents published.
    #[instrument(skip(self, frame), fields(destination = %frame.destination))]
    pub fn publish(&self, frame: Frame) -> usize {
        self.inner.frames_published.fetch_add(1, Ordering::Relaxed);

        let inboxes: Vec<_> = self
            .inner
            .subscribers
            .get(&frame.destination)
            .map(|entry| entry.value().iter().map(|(_, tx)| tx.clone()).collect())
            .unwrap_or_default();
        let responders: Vec<_> = self
            .inner
            .agents
            .get(&frame.destination)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        let mut deliveries = 0;
        for inbox in inboxes {
            if inbox.send(frame.clone()).is_ok() {
                deliveries += 1;
            } else {
                trace!("Subscriber inbox closed");
            }
        }

        if !responders.is_empty() {
            deliveries += self.dispatch_to_agents(&frame, &responders);
        }
        trace!(deliveries, "Published frame");
        deliveries
    }

    fn dispatch_to_agents(&self, frame: &Frame, responders: &[Responder]) -> usize {
        let request = match frame
            .payload(self.use_b64)
            .and_then(|payload| self.security.decode(&payload))
        {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Agent could not decode request");
                return 0;
            }
        };

        let reply_to = frame
            .headers
            .get(crate::message::REPLY_TO)
            .cloned()
            .or_else(|| request.reply_to().map(str::to_string));

        let Some(reply_to) = reply_to else {
            trace!("Request carries no reply-to, agents stay silent");
            return 0;
        };

        let mut answered = 0;
        for responder in responders {
            let Some(mut reply) = responder(&request) else {
                continue;
            };
            // Replies never carry routing headers, so an echoed request cannot loop.
            reply.headers.clear();
            match self.security.encode(&reply) {
                Ok(payload) => {
                    self.publish(Frame::encode(reply_to.as_str(), Headers::new(), &payload, self.use_b64));
                    answered += 1;
                }
                Err(e) => warn!(error = %e, "Agent could not encode reply"),
            }
        }
        answered
    }

    pub(crate) fn next_subscriber_id(&self) -> SubscriberId {
        self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn subscribe(
        &self,
        destination: &str,
        id: SubscriberId,
        inbox: mpsc::UnboundedSender<Frame>,
    ) {
        let mut entry = self
            .inner
            .subscribers
            .entry(destination.to_string())
            .or_default();
        if !entry.iter().any(|(existing, _)| *existing == id) {
            entry.push((id, inbox));
        }
    }

    pub(crate) fn unsubscribe_all(&self, id: SubscriberId) {
        self.inner.subscribers.retain(|_, entries| {
            entries.retain(|(existing, _)| *existing != id);
            !entries.is_empty()
        });
    }
}
