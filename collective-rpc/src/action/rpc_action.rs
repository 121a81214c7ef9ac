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
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::common::{Config, ConnectorError, RpcError};
use crate::message::{Headers, Message, REPLY_TO, SENDER_ID};
use crate::traits::{CallEvent, CallObserver, Connector, TracingObserver};

/// Type-state marker for calls expecting exactly one reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct Single;

/// Type-state marker for fan-in calls gathering replies until a deadline.
#[derive(Debug, Default, Clone, Copy)]
pub struct Collection;

/// One RPC call against an agent in a collective.
///
/// The `Mode` parameter selects the reply contract:
///
/// - [`RpcAction<Single>`] (alias [`SimpleAction`](crate::action::SimpleAction))
///   returns one [`Message`] or fails with [`RpcError::Timeout`].
/// - [`RpcAction<Collection>`] (alias
///   [`CollectionAction`](crate::action::CollectionAction)) returns every reply
///   that arrived within the window, possibly none.
///
/// The collective and the connector are resolved once, when the action is
/// built, and stay fixed for its lifetime.
pub struct RpcAction<Mode> {
    pub(crate) config: Config,
    pub(crate) message: Message,
    pub(crate) agent: String,
    pub(crate) collective: String,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) observer: Arc<dyn CallObserver>,
    pub(crate) expected_replies: Option<usize>,
    _mode: PhantomData<Mode>,
}

impl<Mode> fmt::Debug for RpcAction<Mode> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcAction")
            .field("mode", &std::any::type_name::<Mode>())
            .field("agent", &self.agent)
            .field("collective", &self.collective)
            .field("request_id", &self.message.request_id)
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

/// Builds an [`RpcAction`].
///
/// ```rust,ignore
/// let action = CollectionAction::builder(&config, message, "rpcutil")
///     .collective("eu_collective")
///     .expected_replies(12)
///     .build();
/// let replies = action.call().await?;
/// ```
pub struct RpcActionBuilder<'a, Mode> {
    config: &'a Config,
    message: Message,
    agent: String,
    collective: Option<String>,
    observer: Option<Arc<dyn CallObserver>>,
    expected_replies: Option<usize>,
    _mode: PhantomData<Mode>,
}

impl<'a, Mode> RpcActionBuilder<'a, Mode> {
    /// Targets `collective` instead of the configured main collective.
    ///
    /// An empty name is treated as absent.
    #[must_use]
    pub fn collective(mut self, collective: impl Into<String>) -> Self {
        self.collective = Some(collective.into());
        self
    }

    /// Routes lifecycle events to `observer` instead of [`TracingObserver`].
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Resolves the collective and the connector and produces the action.
    #[must_use]
    pub fn build(self) -> RpcAction<Mode> {
        let collective = resolve_collective(self.collective, self.config.main_collective());
        RpcAction {
            config: self.config.clone(),
            message: self.message,
            agent: self.agent,
            collective,
            connector: self.config.get_connector(),
            observer: self
                .observer
                .unwrap_or_else(|| Arc::new(TracingObserver)),
            expected_replies: self.expected_replies,
            _mode: PhantomData,
        }
    }
}

impl<'a> RpcActionBuilder<'a, Collection> {
    /// Ends collection early once `count` replies have arrived.
    ///
    /// Use it when the number of responders is known up front, for example
    /// from a prior discovery. Zero keeps the deadline as the only bound.
    #[must_use]
    pub fn expected_replies(mut self, count: usize) -> Self {
        self.expected_replies = Some(count);
        self
    }
}

/// Explicit non-empty collective wins; otherwise the configured default.
fn resolve_collective(explicit: Option<String>, main_collective: &str) -> String {
    explicit
        .filter(|collective| !collective.is_empty())
        .unwrap_or_else(|| main_collective.to_string())
}

impl<Mode> RpcAction<Mode> {
    /// Starts building an action sending `message` to `agent`.
    #[must_use]
    pub fn builder(config: &Config, message: Message, agent: impl Into<String>) -> RpcActionBuilder<'_, Mode> {
        RpcActionBuilder {
            config,
            message,
            agent: agent.into(),
            collective: None,
            observer: None,
            expected_replies: None,
            _mode: PhantomData,
        }
    }

    /// Builds an action on the main collective with default instrumentation.
    #[must_use]
    pub fn new(config: &Config, message: Message, agent: impl Into<String>) -> Self {
        Self::builder(config, message, agent).build()
    }

    /// Agent the request is addressed to.
    #[must_use]
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Collective the request is addressed to.
    #[must_use]
    pub fn collective(&self) -> &str {
        &self.collective
    }

    /// The request.
    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    /// The connector this action drives.
    #[must_use]
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Timeout used by `call()`.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.config.default_timeout()
    }

    /// Destination the request is sent to.
    #[must_use]
    pub fn get_target(&self) -> String {
        self.connector.get_target(&self.collective, &self.agent)
    }

    /// Destination replies arrive on.
    #[must_use]
    pub fn get_reply_target(&self) -> String {
        self.connector.get_reply_target(&self.collective, &self.agent)
    }

    /// Checks the call is allowed and its timeout usable before any I/O.
    pub(crate) fn preflight(&self, timeout: Duration) -> Result<Duration, RpcError> {
        if !self.config.settings().allows_collective(&self.collective) {
            return Err(RpcError::Config(format!(
                "collective {} is not in the configured collectives",
                self.collective
            )));
        }
        validate_timeout(timeout)
    }

    pub(crate) fn emit(&self, event: CallEvent) {
        self.observer.on_event(&event);
    }

    /// Connects, subscribes to the reply target and publishes the request.
    ///
    /// Returns the reply target advertised in the `reply-to` header.
    pub(crate) async fn open_session(&self) -> Result<String, RpcError> {
        self.emit(CallEvent::Connecting);
        let connect_timeout = self.config.connect_timeout();
        tokio::time::timeout(connect_timeout, self.connector.connect(true))
            .await
            .map_err(|_| {
                ConnectorError::ConnectionFailed(format!(
                    "session not established within {connect_timeout:?}"
                ))
            })??;

        let reply_target = self.get_reply_target();
        self.emit(CallEvent::Subscribing {
            destination: reply_target.clone(),
        });
        self.connector.subscribe(&reply_target).await?;

        let target = self.get_target();
        self.emit(CallEvent::Sending {
            target: target.clone(),
            reply_to: reply_target.clone(),
        });
        let mut headers = Headers::new();
        headers.insert(REPLY_TO.to_string(), reply_target.clone());
        headers.insert(SENDER_ID.to_string(), self.config.identity().to_string());
        self.connector.send(&self.message, &target, headers).await?;

        Ok(reply_target)
    }

    /// Disconnects after the call body finished, whatever its outcome.
    ///
    /// The body's error takes precedence over a disconnect failure.
    pub(crate) async fn close_session<T>(&self, outcome: Result<T, RpcError>) -> Result<T, RpcError> {
        self.emit(CallEvent::Disconnecting);
        let disconnected = self.connector.disconnect().await;
        match (outcome, disconnected) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(disconnect_error)) => {
                warn!(error = %disconnect_error, "Disconnect failed after call error");
                Err(e)
            }
        }
    }
}

pub(crate) fn validate_timeout(timeout: Duration) -> Result<Duration, RpcError> {
    if timeout.is_zero() {
        Err(RpcError::InvalidTimeout)
    } else {
        Ok(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_collective_wins() {
        assert_eq!(resolve_collective(Some("eu".to_string()), "main"), "eu");
    }

    #[test]
    fn test_missing_collective_falls_back() {
        assert_eq!(resolve_collective(None, "main"), "main");
    }

    #[test]
    fn test_empty_collective_counts_as_absent() {
        assert_eq!(resolve_collective(Some(String::new()), "main"), "main");
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        assert!(matches!(validate_timeout(Duration::ZERO), Err(RpcError::InvalidTimeout)));
        assert!(validate_timeout(Duration::from_millis(1)).is_ok());
    }
}
