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

use crate::common::SecurityError;
use crate::message::Message;

/// Turns messages into signed payloads and back.
///
/// A provider owns both serialization and verification: `decode` must reject
/// payloads it cannot authenticate.
pub trait Security: Send + Sync + Debug {
    /// Serializes and signs `message`.
    fn encode(&self, message: &Message) -> Result<Vec<u8>, SecurityError>;

    /// Verifies and deserializes `payload`.
    fn decode(&self, payload: &[u8]) -> Result<Message, SecurityError>;
}
