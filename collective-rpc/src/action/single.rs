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

use tracing::instrument;

use super::rpc_action::{RpcAction, Single};
use crate::common::{ConnectorError, RpcError};
use crate::message::Message;
use crate::traits::CallEvent;

impl RpcAction<Single> {
    /// Makes the call with the configured default timeout (5 seconds unless
    /// overridden in the settings).
    pub async fn call(&self) -> Result<Message, RpcError> {
        self.call_with_timeout(self.default_timeout()).await
    }

    /// Makes the call, waiting up to `timeout` for the reply.
    ///
    /// The sequence is connect, subscribe to the reply target, send with
    /// `reply-to`, one receive bounded by `timeout`, disconnect. Disconnect
    /// runs on every path once connecting has been attempted.
    ///
    /// # Errors
    ///
    /// [`RpcError::Timeout`] if no reply arrives in time,
    /// [`RpcError::InvalidTimeout`] for a zero timeout, [`RpcError::Config`]
    /// for a collective outside the configured list, and any connector
    /// failure unchanged. Nothing is retried.
    #[instrument(skip(self), fields(agent = %self.agent, collective = %self.collective))]
    pub async fn call_with_timeout(&self, timeout: Duration) -> Result<Message, RpcError> {
        let timeout = self.preflight(timeout)?;
        let outcome = self.exchange(timeout).await;
        self.close_session(outcome).await
    }

    async fn exchange(&self, timeout: Duration) -> Result<Message, RpcError> {
        self.open_session().await?;
        self.emit(CallEvent::Receiving { timeout });
        match self.connector.receive(timeout).await {
            Ok(reply) => Ok(reply),
            Err(ConnectorError::ReceiveTimeout(_)) => Err(RpcError::Timeout(timeout)),
            Err(e) => Err(e.into()),
        }
    }
}
