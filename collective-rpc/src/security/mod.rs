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
//! Security providers shipped with the client.
//!
//! Both implement [`Security`](crate::traits::Security); custom providers can
//! be plugged into a [`Config`](crate::common::Config) the same way.

pub use plain::PlainSecurity;
pub use psk::PskSecurity;

mod plain;
mod psk;

use crate::common::SecurityError;
use crate::message::Message;

/// Rejects decoded messages that cannot be correlated with a request.
fn ensure_correlatable(message: Message) -> Result<Message, SecurityError> {
    if message.request_id.is_empty() {
        return Err(SecurityError::MissingField("request_id"));
    }
    Ok(message)
}
