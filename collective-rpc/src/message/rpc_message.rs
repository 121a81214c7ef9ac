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
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Header naming the destination replies should be published to.
pub const REPLY_TO: &str = "reply-to";

/// Header carrying the identity of the client that published a request.
pub const SENDER_ID: &str = "sender-id";

/// Transport headers attached to a message or frame.
pub type Headers = BTreeMap<String, String>;

/// A request or reply exchanged with a collective.
///
/// The body is a free-form key/value map. Headers travel alongside the body
/// and are augmented by the caller side (for example with [`REPLY_TO`]) before
/// sending.
///
/// # Wire Format
///
/// ```json
/// {
///   "request_id": "req_01h9xz7n2e5p6q8r3t1u2v3w4x",
///   "agent": "rpcutil",
///   "collective": "mcollective",
///   "body": { "action": "ping" },
///   "headers": { "reply-to": "/topic/mcollective.rpcutil.reply" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier shared by a request and all of its replies.
    pub request_id: String,

    /// Identity of the node that produced the message, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,

    /// Agent the request is addressed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Collective the request is addressed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collective: Option<String>,

    /// Key/value payload.
    #[serde(default)]
    pub body: Map<String, Value>,

    /// Transport headers.
    #[serde(default)]
    pub headers: Headers,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// Creates an empty message with a fresh, time-ordered request ID
    /// (`req_<uuid_v7>`).
    #[must_use]
    pub fn new() -> Self {
        use mti::prelude::*;
        Self {
            request_id: "req".create_type_id::<V7>().to_string(),
            sender_id: None,
            agent: None,
            collective: None,
            body: Map::new(),
            headers: Headers::new(),
        }
    }

    /// Creates a message carrying `body`.
    #[must_use]
    pub fn with_body(body: Map<String, Value>) -> Self {
        Self {
            body,
            ..Self::new()
        }
    }

    /// Sets the sender identity.
    #[must_use]
    pub fn from_sender(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = Some(sender_id.into());
        self
    }

    /// Inserts a body entry, returning the previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.body.insert(key.into(), value.into())
    }

    /// Looks up a body entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Looks up a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// The reply destination advertised by a request.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.header(REPLY_TO)
    }

    /// Builds a reply to this request carrying `body`.
    ///
    /// The reply keeps the request ID and addressing so the requester can
    /// correlate it.
    #[must_use]
    pub fn reply(&self, body: Map<String, Value>) -> Self {
        Self {
            request_id: self.request_id.clone(),
            sender_id: None,
            agent: self.agent.clone(),
            collective: self.collective.clone(),
            body,
            headers: Headers::new(),
        }
    }
}
