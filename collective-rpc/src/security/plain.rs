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
use crate::common::SecurityError;
use crate::message::Message;
use crate::traits::Security;

/// JSON serialization without signing.
///
/// Suitable for trusted networks and tests; any well-formed payload decodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainSecurity;

impl Security for PlainSecurity {
    fn encode(&self, message: &Message) -> Result<Vec<u8>, SecurityError> {
        Ok(serde_json::to_vec(message)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Message, SecurityError> {
        super::ensure_correlatable(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        let result = PlainSecurity.decode(b"not json");
        assert!(matches!(result, Err(SecurityError::Serialization(_))));
    }

    #[test]
    fn test_decode_requires_request_id() {
        let result = PlainSecurity.decode(br#"{"request_id":""}"#);
        assert_eq!(result, Err(SecurityError::MissingField("request_id")));
    }

    #[test]
    fn test_decode_encoded_message() {
        let mut message = Message::new();
        message.insert("action", "status");
        let decoded = PlainSecurity.decode(&PlainSecurity.encode(&message).unwrap()).unwrap();
        assert_eq!(decoded, message);
    }
}
