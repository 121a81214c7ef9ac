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
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to the caller of an RPC action.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No reply arrived within the call deadline.
    ///
    /// Only single-reply calls raise this; fan-in calls return whatever was
    /// collected instead.
    #[error("no reply received within {0:?}")]
    Timeout(Duration),

    /// The requested call timeout was zero.
    #[error("call timeout must be greater than zero")]
    InvalidTimeout,

    /// The connector failed while connecting, subscribing, sending or receiving.
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    /// The client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failures reported by a [`Connector`](crate::traits::Connector).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectorError {
    /// An operation that needs a live session ran before `connect`.
    #[error("connector is not connected")]
    NotConnected,

    /// The session could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The subscription request was refused.
    #[error("subscribe to {destination} failed: {reason}")]
    SubscribeFailed {
        /// Destination the subscription targeted.
        destination: String,
        /// Transport-provided reason.
        reason: String,
    },

    /// The outbound frame could not be delivered.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A blocking receive reached its deadline without a frame.
    #[error("receive timed out after {0:?}")]
    ReceiveTimeout(Duration),

    /// The transport closed underneath the session.
    #[error("connection closed")]
    Closed,

    /// A payload could not be encoded, verified or decoded.
    #[error("payload rejected: {0}")]
    Security(#[from] SecurityError),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Failures while encoding, verifying or decoding a payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecurityError {
    /// The frame body was not valid base64.
    #[error("invalid frame encoding: {0}")]
    Encoding(String),

    /// The payload was not a well-formed message.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The payload signature did not match its body.
    #[error("payload signature does not match")]
    InvalidSignature,

    /// A decoded message lacks a field every request and reply must carry.
    #[error("message is missing {0}")]
    MissingField(&'static str),
}

impl From<serde_json::Error> for SecurityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for SecurityError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Encoding(err.to_string())
    }
}
