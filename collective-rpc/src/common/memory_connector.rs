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
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use crate::common::memory_bus::SubscriberId;
use crate::common::{AddressScheme, ConnectorError, MemoryBus};
use crate::message::{Frame, Headers, Message};
use crate::traits::{Connector, ListenerHandle, MessageListener};

/// A [`Connector`] whose session lives on a [`MemoryBus`].
///
/// Connecting spawns a transport task that drains the connector's inbox. While
/// a listener is installed, frames go to it in arrival order; otherwise they
/// queue up for [`Connector::receive`]. Frames queued before a listener is
/// installed are handed to it on installation.
pub struct MemoryConnector {
    bus: MemoryBus,
    id: SubscriberId,
    transport_tx: UnboundedSender<Frame>,
    transport_rx: Mutex<Option<UnboundedReceiver<Frame>>>,
    inbound: Arc<Inbound>,
    session: Mutex<Option<Session>>,
}

/// Routing state shared with the transport task.
///
/// Lock order is `listener` then `pending`.
#[derive(Default)]
struct Inbound {
    listener: Mutex<Option<(ListenerHandle, Arc<dyn MessageListener>)>>,
    pending: Mutex<VecDeque<Frame>>,
    arrivals: Notify,
}

struct Session {
    cancel_token: CancellationToken,
    dispatcher: JoinHandle<UnboundedReceiver<Frame>>,
}

impl fmt::Debug for MemoryConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnector")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .field("has_listener", &self.has_listener())
            .field("queued", &self.inbound.pending.lock().len())
            .finish()
    }
}

impl MemoryConnector {
    pub(crate) fn new(bus: MemoryBus) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        Self {
            id: bus.next_subscriber_id(),
            bus,
            transport_tx,
            transport_rx: Mutex::new(Some(transport_rx)),
            inbound: Arc::new(Inbound::default()),
            session: Mutex::new(None),
        }
    }

    /// Whether a session is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Whether a listener is installed.
    #[must_use]
    pub fn has_listener(&self) -> bool {
        self.inbound.listener.lock().is_some()
    }

    fn ensure_connected(&self) -> Result<(), ConnectorError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ConnectorError::NotConnected)
        }
    }

    fn decode(&self, frame: &Frame) -> Result<Message, ConnectorError> {
        let payload = frame.payload(self.bus.use_b64())?;
        Ok(self.bus.security().decode(&payload)?)
    }
}

/// Transport task: routes inbound frames until cancelled, then hands the inbox back.
async fn dispatch(
    mut inbox: UnboundedReceiver<Frame>,
    inbound: Arc<Inbound>,
    cancel_token: CancellationToken,
) -> UnboundedReceiver<Frame> {
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            frame = inbox.recv() => match frame {
                Some(frame) => route(&inbound, frame),
                None => break,
            },
        }
    }
    inbox
}

fn route(inbound: &Inbound, frame: Frame) {
    let slot = inbound.listener.lock();
    if let Some((handle, active)) = slot.as_ref() {
        trace!(listener = handle.id(), destination = %frame.destination, "Dispatching frame to listener");
        active.on_message(frame);
        return;
    }

    let mut pending = inbound.pending.lock();
    trace!(destination = %frame.destination, queued = pending.len() + 1, "No listener installed, queueing frame");
    pending.push_back(frame);
    drop(pending);
    drop(slot);
    inbound.arrivals.notify_one();
}

#[async_trait]
impl Connector for MemoryConnector {
    #[instrument(skip(self), fields(connector = self.id))]
    async fn connect(&self, wait: bool) -> Result<(), ConnectorError> {
        if self.is_connected() {
            trace!("Already connected");
            return Ok(());
        }
        let inbox = self
            .transport_rx
            .lock()
            .take()
            .ok_or_else(|| ConnectorError::ConnectionFailed("transport is still shutting down".to_string()))?;

        let cancel_token = CancellationToken::new();
        let dispatcher = tokio::spawn(dispatch(inbox, Arc::clone(&self.inbound), cancel_token.clone()));
        *self.session.lock() = Some(Session {
            cancel_token,
            dispatcher,
        });
        debug!("Connected to memory bus");
        Ok(())
    }

    async fn subscribe(&self, destination: &str) -> Result<(), ConnectorError> {
        self.ensure_connected()?;
        if destination.is_empty() {
            return Err(ConnectorError::SubscribeFailed {
                destination: destination.to_string(),
                reason: "empty destination".to_string(),
            });
        }
        self.bus.subscribe(destination, self.id, self.transport_tx.clone());
        trace!(connector = self.id, %destination, "Subscribed");
        Ok(())
    }

    async fn send(
        &self,
        message: &Message,
        destination: &str,
        headers: Headers,
    ) -> Result<(), ConnectorError> {
        self.ensure_connected()?;
        let payload = self.bus.security().encode(message)?;

        let mut frame_headers = message.headers.clone();
        frame_headers.extend(headers);
        let frame = Frame::encode(destination, frame_headers, &payload, self.bus.use_b64());
        let deliveries = self.bus.publish(frame);
        trace!(connector = self.id, %destination, deliveries, "Sent");
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<Message, ConnectorError> {
        self.ensure_connected()?;
        let deadline = Instant::now() + timeout;
        loop {
            let next = self.inbound.pending.lock().pop_front();
            if let Some(frame) = next {
                return self.decode(&frame);
            }
            if tokio::time::timeout_at(deadline, self.inbound.arrivals.notified())
                .await
                .is_err()
            {
                return Err(ConnectorError::ReceiveTimeout(timeout));
            }
        }
    }

    #[instrument(skip(self), fields(connector = self.id))]
    async fn disconnect(&self) -> Result<(), ConnectorError> {
        let session = self.session.lock().take();
        let Some(session) = session else {
            trace!("Already disconnected");
            return Ok(());
        };
        self.bus.unsubscribe_all(self.id);
        session.cancel_token.cancel();

        let mut inbox = session
            .dispatcher
            .await
            .map_err(|e| ConnectorError::Other(format!("transport task failed: {e}")))?;
        while inbox.try_recv().is_ok() {}
        *self.transport_rx.lock() = Some(inbox);
        let discarded = std::mem::take(&mut *self.inbound.pending.lock()).len();
        if discarded > 0 {
            debug!(discarded, "Discarded frames nobody received");
        }

        debug!("Disconnected from memory bus");
        Ok(())
    }

    fn set_listener(&self, listener: Arc<dyn MessageListener>) -> ListenerHandle {
        let handle = ListenerHandle::next();
        let mut slot = self.inbound.listener.lock();
        if let Some((previous, _)) = slot.replace((handle, Arc::clone(&listener))) {
            debug!(connector = self.id, previous = previous.id(), "Replacing listener");
        }

        let queued = std::mem::take(&mut *self.inbound.pending.lock());
        if !queued.is_empty() {
            trace!(
                connector = self.id,
                listener = handle.id(),
                frames = queued.len(),
                "Handing queued frames to new listener"
            );
        }
        for frame in queued {
            listener.on_message(frame);
        }
        handle
    }

    fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let mut slot = self.inbound.listener.lock();
        if slot.as_ref().is_some_and(|(active, _)| *active == handle) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn use_b64(&self) -> bool {
        self.bus.use_b64()
    }

    fn address_scheme(&self) -> AddressScheme {
        self.bus.scheme()
    }
}

impl Drop for MemoryConnector {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel_token.cancel();
            self.bus.unsubscribe_all(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SecurityError;
    use crate::message::REPLY_TO;
    use crate::security::PlainSecurity;
    use serde_json::Map;

    struct Recorder(Mutex<Vec<Frame>>);

    impl MessageListener for Recorder {
        fn on_message(&self, frame: Frame) {
            self.0.lock().push(frame);
        }
    }

    fn echo_bus() -> MemoryBus {
        let bus = MemoryBus::new(Arc::new(PlainSecurity)).with_b64(true);
        bus.register_agent("mc", "echo", |request| Some(request.reply(Map::new())));
        bus
    }

    fn reply_headers(reply_to: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert(REPLY_TO.to_string(), reply_to.to_string());
        headers
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let connector = echo_bus().connector();
        assert_eq!(
            connector.subscribe("/topic/x").await,
            Err(ConnectorError::NotConnected)
        );
        assert_eq!(
            connector.send(&Message::new(), "/topic/x", Headers::new()).await,
            Err(ConnectorError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_receive_reply_from_agent() {
        let connector = echo_bus().connector();
        connector.connect(true).await.unwrap();
        connector.subscribe("/topic/mc.echo.reply").await.unwrap();

        let request = Message::new();
        connector
            .send(&request, "/topic/mc.echo.agent", reply_headers("/topic/mc.echo.reply"))
            .await
            .unwrap();

        let reply = connector.receive(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.request_id, request.request_id);
        connector.disconnect().await.unwrap();
        assert!(!connector.is_connected());
    }

    #[tokio::test]
    async fn test_subscribe_rejects_empty_destination() {
        let connector = echo_bus().connector();
        connector.connect(true).await.unwrap();
        assert!(matches!(
            connector.subscribe("").await,
            Err(ConnectorError::SubscribeFailed { .. })
        ));
        connector.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_times_out() {
        let connector = echo_bus().connector();
        connector.connect(true).await.unwrap();
        let timeout = Duration::from_millis(20);
        assert_eq!(
            connector.receive(timeout).await,
            Err(ConnectorError::ReceiveTimeout(timeout))
        );
        connector.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_gets_frames_queued_before_installation() {
        let connector = echo_bus().connector();
        connector.connect(true).await.unwrap();
        connector.subscribe("/topic/mc.echo.reply").await.unwrap();
        connector
            .send(&Message::new(), "/topic/mc.echo.agent", reply_headers("/topic/mc.echo.reply"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let handle = connector.set_listener(recorder.clone());
        assert_eq!(recorder.0.lock().len(), 1);

        assert!(connector.remove_listener(handle));
        assert!(!connector.remove_listener(handle));
        connector.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_listener_installed_during_receive_gets_replies() {
        let connector = Arc::new(echo_bus().connector());
        connector.connect(true).await.unwrap();
        connector.subscribe("/topic/mc.echo.reply").await.unwrap();

        let waiting = {
            let connector = Arc::clone(&connector);
            tokio::spawn(async move { connector.receive(Duration::from_millis(200)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let handle = connector.set_listener(recorder.clone());
        connector
            .send(&Message::new(), "/topic/mc.echo.agent", reply_headers("/topic/mc.echo.reply"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(recorder.0.lock().len(), 1);
        assert_eq!(
            waiting.await.unwrap(),
            Err(ConnectorError::ReceiveTimeout(Duration::from_millis(200)))
        );
        assert!(connector.remove_listener(handle));
        connector.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_a_security_error() {
        let bus = echo_bus();
        let connector = bus.connector();
        connector.connect(true).await.unwrap();
        connector.subscribe("/topic/mc.echo.reply").await.unwrap();

        bus.publish(Frame::new(
            "/topic/mc.echo.reply".to_string(),
            Headers::new(),
            b"%%% not base64".to_vec(),
        ));

        assert!(matches!(
            connector.receive(Duration::from_secs(1)).await,
            Err(ConnectorError::Security(SecurityError::Encoding(_)))
        ));
        connector.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_new_listener_replaces_previous() {
        let connector = echo_bus().connector();
        let first = connector.set_listener(Arc::new(Recorder(Mutex::new(Vec::new()))));
        let second = connector.set_listener(Arc::new(Recorder(Mutex::new(Vec::new()))));
        assert!(!connector.remove_listener(first));
        assert!(connector.remove_listener(second));
        assert!(!connector.has_listener());
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let bus = echo_bus();
        let connector = bus.connector();
        connector.connect(true).await.unwrap();
        connector.subscribe("/topic/mc.echo.reply").await.unwrap();
        connector.disconnect().await.unwrap();
        assert_eq!(bus.subscriber_count("/topic/mc.echo.reply"), 0);

        connector.connect(true).await.unwrap();
        assert!(connector.is_connected());
        connector.disconnect().await.unwrap();
    }
}
