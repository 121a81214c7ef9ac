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
pub use addressing::{get_reply_target, get_target, AddressScheme};
pub use config::{
    Config, ConnectorSettings, RpcSettings, SecurityProvider, SecuritySettings, TimeoutSettings,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT,
};
pub use errors::{ConnectorError, RpcError, SecurityError};
pub use memory_bus::{MemoryBus, Responder};
pub use memory_connector::MemoryConnector;

/// Pure target derivation for requests and replies.
pub mod addressing;

/// Client settings and the runtime [`Config`] handed to actions.
mod config;

/// Error taxonomy for calls, connectors and security providers.
mod errors;

/// In-process publish/subscribe bus with simulated remote agents.
mod memory_bus;

/// [`Connector`](crate::traits::Connector) implementation over a [`MemoryBus`].
mod memory_connector;
