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

use parking_lot::Mutex;
use tracing::trace;

use collective_rpc::prelude::*;

/// One operation performed on a [`ScriptedConnector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorCall {
    Connect { wait: bool },
    Subscribe(String),
    Send { target: String, headers: Headers },
    Receive(Duration),
    SetListener,
    RemoveListener { removed: bool },
    Disconnect,
}

/// The operation a [`ScriptedConnector`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Connect,
    Subscribe,
    Send,
    Receive,
    Disconnect,
}

type Slot = Arc<Mutex<Option<(ListenerHandle, Arc<dyn MessageListener>)>>>;

/// A connector that records what an action does with it and plays back a
/// scripted transport.
///
/// `receive` returns the scripted reply or, without one, waits out the
/// timeout. Scheduled frames are pushed to the listener from a spawned task,
/// each after its delay, once a listener is installed.
#[derive(Default)]
pub struct ScriptedConnector {
    use_b64: bool,
    scheme: AddressScheme,
    calls: Mutex<Vec<ConnectorCall>>,
    reply: Mutex<Option<Message>>,
    scheduled: Mutex<Vec<(Duration, Frame)>>,
    fail_at: Mutex<Option<FailAt>>,
    connect_delay: Mutex<Option<Duration>>,
    listener: Slot,
}

impl std::fmt::Debug for ScriptedConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedConnector")
            .field("use_b64", &self.use_b64)
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

impl ScriptedConnector {
    pub fn new(use_b64: bool) -> Arc<Self> {
        Arc::new(Self {
            use_b64,
            ..Self::default()
        })
    }

    pub fn with_scheme(scheme: AddressScheme) -> Arc<Self> {
        Arc::new(Self {
            scheme,
            ..Self::default()
        })
    }

    pub fn reply_with(&self, reply: Message) {
        *self.reply.lock() = Some(reply);
    }

    /// Queues `reply`, encoded with `security`, for delivery `after` the
    /// listener is installed.
    pub fn schedule(&self, after: Duration, reply: &Message, security: &dyn Security) {
        let payload = security.encode(reply).expect("scripted reply must encode");
        let frame = Frame::encode("/scripted/reply", Headers::new(), &payload, self.use_b64);
        self.schedule_frame(after, frame);
    }

    pub fn schedule_frame(&self, after: Duration, frame: Frame) {
        self.scheduled.lock().push((after, frame));
    }

    pub fn fail_at(&self, step: FailAt) {
        *self.fail_at.lock() = Some(step);
    }

    pub fn delay_connect(&self, delay: Duration) {
        *self.connect_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<ConnectorCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&ConnectorCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().is_some()
    }

    fn record(&self, call: ConnectorCall) {
        trace!(?call, "scripted connector call");
        self.calls.lock().push(call);
    }

    fn check(&self, step: FailAt) -> Result<(), ConnectorError> {
        if *self.fail_at.lock() == Some(step) {
            Err(ConnectorError::Other(format!("scripted failure at {step:?}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, wait: bool) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::Connect { wait });
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check(FailAt::Connect)
    }

    async fn subscribe(&self, destination: &str) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::Subscribe(destination.to_string()));
        self.check(FailAt::Subscribe)
    }

    async fn send(
        &self,
        _message: &Message,
        destination: &str,
        headers: Headers,
    ) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::Send {
            target: destination.to_string(),
            headers,
        });
        self.check(FailAt::Send)
    }

    async fn receive(&self, timeout: Duration) -> Result<Message, ConnectorError> {
        self.record(ConnectorCall::Receive(timeout));
        self.check(FailAt::Receive)?;
        let reply = self.reply.lock().clone();
        match reply {
            Some(reply) => Ok(reply),
            None => {
                tokio::time::sleep(timeout).await;
                Err(ConnectorError::ReceiveTimeout(timeout))
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ConnectorError> {
        self.record(ConnectorCall::Disconnect);
        self.check(FailAt::Disconnect)
    }

    fn set_listener(&self, listener: Arc<dyn MessageListener>) -> ListenerHandle {
        self.record(ConnectorCall::SetListener);
        let handle = ListenerHandle::next();
        *self.listener.lock() = Some((handle, listener));

        let scheduled = std::mem::take(&mut *self.scheduled.lock());
        if !scheduled.is_empty() {
            let slot = Arc::clone(&self.listener);
            tokio::spawn(async move {
                for (after, frame) in scheduled {
                    tokio::time::sleep(after).await;
                    let active = slot.lock().as_ref().map(|(_, listener)| Arc::clone(listener));
                    if let Some(listener) = active {
                        listener.on_message(frame);
                    }
                }
            });
        }
        handle
    }

    fn remove_listener(&self, handle: ListenerHandle) -> bool {
        let mut slot = self.listener.lock();
        let removed = slot.as_ref().is_some_and(|(active, _)| *active == handle);
        if removed {
            *slot = None;
        }
        drop(slot);
        self.record(ConnectorCall::RemoveListener { removed });
        removed
    }

    fn use_b64(&self) -> bool {
        self.use_b64
    }

    fn address_scheme(&self) -> AddressScheme {
        self.scheme
    }
}

/// A config whose every connector is `connector`.
pub fn config_with(settings: RpcSettings, connector: &Arc<ScriptedConnector>) -> Config {
    let connector = Arc::clone(connector);
    Config::new(settings, move |_| Arc::clone(&connector) as Arc<dyn Connector>)
        .expect("scripted config must build")
}

/// A config producing connectors on `bus`.
pub fn config_on_bus(settings: RpcSettings, bus: &MemoryBus) -> Config {
    let bus = bus.clone();
    Config::new(settings, move |_| Arc::new(bus.connector()) as Arc<dyn Connector>)
        .expect("bus config must build")
}
