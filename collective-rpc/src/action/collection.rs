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
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use super::rpc_action::{Collection, RpcAction};
use crate::collector::ResponseCollector;
use crate::common::RpcError;
use crate::message::Message;
use crate::traits::{CallEvent, MessageListener};

impl RpcAction<Collection> {
    /// Makes the call with the configured default timeout (5 seconds unless
    /// overridden in the settings).
    pub async fn call(&self) -> Result<Vec<Message>, RpcError> {
        self.call_with_timeout(self.default_timeout()).await
    }

    /// Makes the call and gathers replies for up to `timeout`.
    ///
    /// After connecting, subscribing and sending, a [`ResponseCollector`] is
    /// installed as the connector's listener and the call suspends on it. The
    /// listener is removed and the session closed before returning.
    ///
    /// Running out of time is not an error: the replies gathered so far are
    /// returned, possibly none.
    ///
    /// # Errors
    ///
    /// [`RpcError::InvalidTimeout`] for a zero timeout, [`RpcError::Config`]
    /// for a collective outside the configured list, and any connector
    /// failure unchanged.
    #[instrument(skip(self), fields(agent = %self.agent, collective = %self.collective))]
    pub async fn call_with_timeout(&self, timeout: Duration) -> Result<Vec<Message>, RpcError> {
        let timeout = self.preflight(timeout)?;
        let outcome = self.collect(timeout).await;
        self.close_session(outcome).await
    }

    async fn collect(&self, timeout: Duration) -> Result<Vec<Message>, RpcError> {
        self.open_session().await?;

        let mut collector =
            ResponseCollector::new(timeout, self.config.get_security(), self.connector.use_b64());
        if let Some(count) = self.expected_replies {
            collector = collector.with_expected_replies(count);
        }
        let collector = Arc::new(collector);
        let listener: Arc<dyn MessageListener> = collector.clone();
        let handle = self.connector.set_listener(listener);

        self.emit(CallEvent::Collecting { timeout });
        collector.wait_on_message().await;
        self.connector.remove_listener(handle);

        let responses = collector.responses();
        self.emit(CallEvent::Collected {
            responses: responses.len(),
        });
        Ok(responses)
    }
}
