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

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::common::SecurityError;
use crate::message::Message;
use crate::traits::Security;

/// Pre-shared-key signing.
///
/// The serialized message travels next to `hex(sha256(body || psk))`. Every
/// node in the collective must share the same key.
#[derive(Clone)]
pub struct PskSecurity {
    psk: String,
}

#[derive(Serialize, Deserialize)]
struct SignedPayload {
    body: String,
    hash: String,
}

impl PskSecurity {
    /// Creates a provider signing with `psk`.
    #[must_use]
    pub fn new(psk: impl Into<String>) -> Self {
        Self { psk: psk.into() }
    }

    fn digest(&self, body: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hasher.update(self.psk.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for PskSecurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PskSecurity").field("psk", &"<redacted>").finish()
    }
}

impl Security for PskSecurity {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, SecurityError> {
        let body = serde_json::to_string(message)?;
        let hash = self.digest(&body);
        Ok(serde_json::to_vec(&SignedPayload { body, hash })?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Message, SecurityError> {
        let signed: SignedPayload = serde_json::from_slice(payload)?;
        if self.digest(&signed.body) != signed.hash {
            return Err(SecurityError::InvalidSignature);
        }
        super::ensure_correlatable(serde_json::from_str(&signed.body)?)
    }
}
