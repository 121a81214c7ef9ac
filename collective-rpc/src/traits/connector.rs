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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::common::{get_reply_target, get_target, AddressScheme, ConnectorError};
use crate::message::{Frame, Headers, Message};

/// Receives frames pushed by a connector's transport task.
///
/// Implementations are called from the transport side, concurrently with the
/// thread that registered them, and must not block.
pub trait MessageListener: Send + Sync {
    /// Handles one inbound frame.
    fn on_message(&self, frame: Frame);
}

/// Token identifying one listener registration on a connector.
///
/// Returned by [`Connector::set_listener`] and handed back to
/// [`Connector::remove_listener`] when the registration should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerHandle {
    /// Allocates a process-unique handle.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of this handle.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// A session with the publish/subscribe middleware.
///
/// Connectors are shared behind `Arc<dyn Connector>` and use interior
/// mutability, so every operation takes `&self`.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Establishes the session. With `wait`, returns only once it is usable.
    async fn connect(&self, wait: bool) -> Result<(), ConnectorError>;

    /// Subscribes the session to `destination`.
    async fn subscribe(&self, destination: &str) -> Result<(), ConnectorError>;

    /// Publishes `message` to `destination` with extra transport `headers`.
    async fn send(
        &self,
        message: &Message,
        destination: &str,
        headers: Headers,
    ) -> Result<(), ConnectorError>;

    /// Waits up to `timeout` for one message on the subscribed destinations.
    ///
    /// Fails with [`ConnectorError::ReceiveTimeout`] when the deadline passes.
    async fn receive(&self, timeout: Duration) -> Result<Message, ConnectorError>;

    /// Tears the session down.
    async fn disconnect(&self) -> Result<(), ConnectorError>;

    /// Installs `listener` as the asynchronous receiver of inbound frames,
    /// replacing any listener installed earlier.
    fn set_listener(&self, listener: Arc<dyn MessageListener>) -> ListenerHandle;

    /// Removes the listener registered under `handle`.
    ///
    /// Returns `false` when `handle` is no longer the active registration.
    fn remove_listener(&self, handle: ListenerHandle) -> bool;

    /// Whether frame bodies are wrapped in base64 on the wire.
    fn use_b64(&self) -> bool;

    /// Destination naming convention of the middleware.
    fn address_scheme(&self) -> AddressScheme {
        AddressScheme::default()
    }

    /// Destination requests for `agent` in `collective` are sent to.
    fn get_target(&self, collective: &str, agent: &str) -> String {
        get_target(self.address_scheme(), collective, agent)
    }

    /// Destination replies for `agent` in `collective` arrive on.
    fn get_reply_target(&self, collective: &str, agent: &str) -> String {
        get_reply_target(self.address_scheme(), collective, agent)
    }
}
