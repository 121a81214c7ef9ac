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
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::CollectorStats;
use crate::common::SecurityError;
use crate::message::{Frame, Message};
use crate::traits::{MessageListener, Security};

/// Lifecycle of a [`ResponseCollector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// Frames are being accepted.
    Collecting,
    /// Collection finished; later frames are dropped.
    Done,
}

/// Accumulates the replies of a fan-in call.
///
/// The transport pushes frames through [`MessageListener::on_message`] from its
/// own task while the caller suspends in [`wait_on_message`]. Collection ends
/// when the deadline passes or, if configured, once the expected number of
/// replies has been accepted. Replies are kept in arrival order.
///
/// A frame that fails to decode or verify is counted and skipped; it never
/// ends collection.
///
/// [`wait_on_message`]: ResponseCollector::wait_on_message
pub struct ResponseCollector {
    security: Arc<dyn Security>,
    use_b64: bool,
    timeout: Duration,
    deadline: Instant,
    expected_replies: Option<usize>,
    responses: Mutex<Vec<Message>>,
    done: CancellationToken,
    stats: CollectorStats,
}

impl fmt::Debug for ResponseCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCollector")
            .field("timeout", &self.timeout)
            .field("expected_replies", &self.expected_replies)
            .field("state", &self.state())
            .field("responses", &self.responses.lock().len())
            .finish_non_exhaustive()
    }
}

impl ResponseCollector {
    /// Creates a collector whose deadline is `timeout` from now.
    #[must_use]
    pub fn new(timeout: Duration, security: Arc<dyn Security>, use_b64: bool) -> Self {
        Self {
            security,
            use_b64,
            timeout,
            deadline: Instant::now() + timeout,
            expected_replies: None,
            responses: Mutex::new(Vec::new()),
            done: CancellationToken::new(),
            stats: CollectorStats::default(),
        }
    }

    /// Finishes collection as soon as `count` replies have been accepted.
    ///
    /// A count of zero leaves collection bounded by the deadline only.
    #[must_use]
    pub fn with_expected_replies(mut self, count: usize) -> Self {
        self.expected_replies = (count > 0).then_some(count);
        self
    }

    /// Collection window this collector was created with.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CollectorState {
        if self.done.is_cancelled() {
            CollectorState::Done
        } else {
            CollectorState::Collecting
        }
    }

    /// Counters for this collector.
    #[must_use]
    pub const fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    /// Suspends until collection is complete or the deadline passes.
    ///
    /// Never fails. On return the collector is [`CollectorState::Done`] and
    /// [`responses`](Self::responses) is final.
    pub async fn wait_on_message(&self) {
        tokio::select! {
            _ = self.done.cancelled() => {
                trace!("Collection completed before deadline");
            }
            _ = tokio::time::sleep_until(self.deadline) => {
                debug!(timeout = ?self.timeout, "Collection deadline reached");
            }
        }
        let responses = self.responses.lock();
        self.done.cancel();
        debug!(responses = responses.len(), "Collector done");
    }

    /// Snapshot of the replies accepted so far, in arrival order.
    #[must_use]
    pub fn responses(&self) -> Vec<Message> {
        self.responses.lock().clone()
    }

    fn decode(&self, frame: &Frame) -> Result<Message, SecurityError> {
        let payload = frame.payload(self.use_b64)?;
        self.security.decode(&payload)
    }
}

impl MessageListener for ResponseCollector {
    fn on_message(&self, frame: Frame) {
        self.stats.frames_received.fetch_add(1, Ordering::Relaxed);
        if self.done.is_cancelled() {
            self.stats.frames_after_done.fetch_add(1, Ordering::Relaxed);
            trace!(destination = %frame.destination, "Frame arrived after collection finished");
            return;
        }

        let message = match self.decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                self.stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
                warn!(destination = %frame.destination, error = %e, "Discarding undecodable reply");
                return;
            }
        };

        let mut responses = self.responses.lock();
        if self.done.is_cancelled() {
            self.stats.frames_after_done.fetch_add(1, Ordering::Relaxed);
            return;
        }
        trace!(request_id = %message.request_id, sender = ?message.sender_id, "Reply accepted");
        responses.push(message);
        self.stats.responses_accepted.fetch_add(1, Ordering::Relaxed);

        if self
            .expected_replies
            .is_some_and(|expected| responses.len() >= expected)
        {
            debug!(responses = responses.len(), "Expected replies received");
            self.done.cancel();
        }
    }
}
