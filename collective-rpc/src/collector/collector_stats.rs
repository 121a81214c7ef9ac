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
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters kept by a [`ResponseCollector`](super::ResponseCollector).
#[derive(Debug, Default)]
pub struct CollectorStats {
    pub(crate) frames_received: AtomicUsize,
    pub(crate) responses_accepted: AtomicUsize,
    pub(crate) frames_rejected: AtomicUsize,
    pub(crate) frames_after_done: AtomicUsize,
}

impl CollectorStats {
    /// Frames handed to the collector, whatever became of them.
    #[must_use]
    pub fn frames_received(&self) -> usize {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Frames decoded and appended to the responses.
    #[must_use]
    pub fn responses_accepted(&self) -> usize {
        self.responses_accepted.load(Ordering::Relaxed)
    }

    /// Frames that failed base64 decoding, verification or deserialization.
    #[must_use]
    pub fn frames_rejected(&self) -> usize {
        self.frames_rejected.load(Ordering::Relaxed)
    }

    /// Frames that arrived after collection had finished.
    #[must_use]
    pub fn frames_after_done(&self) -> usize {
        self.frames_after_done.load(Ordering::Relaxed)
    }
}
