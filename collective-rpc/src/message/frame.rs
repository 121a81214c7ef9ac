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
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use derive_new::new;

use crate::common::SecurityError;
use crate::message::Headers;

/// A raw frame as delivered by the transport.
///
/// The body holds the security-encoded payload, optionally wrapped in base64
/// when the connector runs with `use_b64`.
#[derive(new, Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Destination the frame was published to.
    pub destination: String,
    /// Transport headers.
    pub headers: Headers,
    /// Encoded payload.
    pub body: Vec<u8>,
}

impl Frame {
    /// Wraps an encoded payload for `destination`, applying base64 when requested.
    #[must_use]
    pub fn encode(destination: impl Into<String>, headers: Headers, payload: &[u8], use_b64: bool) -> Self {
        let body = if use_b64 {
            STANDARD.encode(payload).into_bytes()
        } else {
            payload.to_vec()
        };
        Self::new(destination.into(), headers, body)
    }

    /// Returns the security-encoded payload, undoing base64 when requested.
    pub fn payload(&self, use_b64: bool) -> Result<Vec<u8>, SecurityError> {
        if use_b64 {
            let trimmed = self.body.trim_ascii();
            Ok(STANDARD.decode(trimmed)?)
        } else {
            Ok(self.body.clone())
        }
    }
}
