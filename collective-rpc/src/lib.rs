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
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Collective RPC
//!
//! A client for fleet-orchestration collectives reachable over a
//! publish/subscribe bus. A request is published to an agent's target
//! destination in a collective; replies come back on a reply destination the
//! request advertises in its `reply-to` header.
//!
//! ## Key Concepts
//!
//! - **Addressing**: pure functions deriving request and reply destinations
//!   from a collective and an agent name, per middleware [`AddressScheme`](prelude::AddressScheme).
//! - **Actions**: [`SimpleAction`](prelude::SimpleAction) expects exactly one
//!   reply; [`CollectionAction`](prelude::CollectionAction) gathers every reply
//!   arriving within a deadline.
//! - **Collector**: [`ResponseCollector`](prelude::ResponseCollector) is
//!   installed as the connector's listener during a fan-in call and keeps
//!   replies in arrival order.
//! - **Collaborators**: a [`Connector`](prelude::Connector) session, a
//!   [`Security`](prelude::Security) provider and a [`Config`](prelude::Config)
//!   tying them together.
//! - **Memory bus**: [`MemoryBus`](prelude::MemoryBus) runs a whole collective
//!   in-process, with simulated agents answering requests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use collective_rpc::prelude::*;
//!
//! let bus = MemoryBus::new(Arc::new(PlainSecurity)).with_b64(true);
//! bus.register_agent("mcollective", "rpcutil", |request| {
//!     Some(request.reply(Default::default()))
//! });
//!
//! let config = Config::new(RpcSettings::default(), move |_| {
//!     Arc::new(bus.connector()) as Arc<dyn Connector>
//! })?;
//!
//! let mut request = Message::new();
//! request.insert("action", "ping");
//! let replies = CollectionAction::new(&config, request, "rpcutil")
//!     .call_with_timeout(Duration::from_secs(2))
//!     .await?;
//! ```

/// Single-reply and fan-in call lifecycles.
pub(crate) mod action;

/// Fan-in reply accumulation.
pub(crate) mod collector;

/// Addressing, configuration, errors and the in-process bus.
pub(crate) mod common;

/// Request/reply payloads and wire frames.
pub(crate) mod message;

/// Collaborator contracts: connectors, security providers and call observers.
pub(crate) mod traits;

pub mod security;

/// Target derivation for requests and replies.
pub use common::addressing;

/// Re-exports of the types needed to configure and make calls.
pub mod prelude {
    pub use async_trait::async_trait;

    pub use crate::action::{
        Collection, CollectionAction, RpcAction, RpcActionBuilder, SimpleAction, Single,
    };
    pub use crate::collector::{CollectorState, CollectorStats, ResponseCollector};
    pub use crate::common::{
        get_reply_target, get_target, AddressScheme, Config, ConnectorError, ConnectorSettings,
        MemoryBus, MemoryConnector, Responder, RpcError, RpcSettings, SecurityError,
        SecurityProvider, SecuritySettings, TimeoutSettings, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT,
    };
    pub use crate::message::{Frame, Headers, Message, REPLY_TO, SENDER_ID};
    pub use crate::security::{PlainSecurity, PskSecurity};
    pub use crate::traits::{
        CallEvent, CallObserver, Connector, ListenerHandle, MessageListener, Security,
        TracingObserver,
    };
}
