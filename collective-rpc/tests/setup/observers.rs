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
use parking_lot::Mutex;

use collective_rpc::prelude::*;

/// Keeps every lifecycle event in the order it was emitted.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<CallEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().clone()
    }
}

impl CallObserver for RecordingObserver {
    fn on_event(&self, event: &CallEvent) {
        self.events.lock().push(event.clone());
    }
}
