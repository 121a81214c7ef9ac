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
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::common::{AddressScheme, RpcError};
use crate::security::{PlainSecurity, PskSecurity};
use crate::traits::{Connector, Security};

/// Timeout applied by `call()` when the settings do not override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on establishing a session when the settings do not override it.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client settings, loaded from TOML.
///
/// # Example Configuration File
///
/// ```toml
/// main_collective = "mcollective"
/// collectives = ["mcollective", "eu_collective"]
/// identity = "ops-console"
///
/// [connector]
/// scheme = "activemq"
/// use_b64 = true
/// connect_timeout_ms = 10000
///
/// [security]
/// provider = "psk"
/// psk = "changeme"
///
/// [timeouts]
/// default_call_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    /// Collective used when an action does not name one.
    pub main_collective: String,
    /// Collectives this client may address besides `main_collective`.
    ///
    /// An empty list places no restriction.
    pub collectives: Vec<String>,
    /// Identity sent in the `sender-id` header of every request.
    pub identity: String,
    /// Middleware settings.
    pub connector: ConnectorSettings,
    /// Security provider settings.
    pub security: SecuritySettings,
    /// Call timeouts.
    pub timeouts: TimeoutSettings,
}

/// Middleware settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorSettings {
    /// Destination naming convention.
    pub scheme: AddressScheme,
    /// Wrap frame bodies in base64.
    pub use_b64: bool,
    /// Bound on `connect`, in milliseconds.
    pub connect_timeout_ms: u64,
}

/// Which [`Security`] provider signs payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityProvider {
    /// [`PlainSecurity`]: no signing.
    #[default]
    None,
    /// [`PskSecurity`]: pre-shared-key signing.
    Psk,
}

/// Security provider settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Selected provider.
    pub provider: SecurityProvider,
    /// Pre-shared key, required by [`SecurityProvider::Psk`].
    pub psk: Option<String>,
}

/// Call timeouts, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Timeout used by `call()`.
    pub default_call_timeout_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            main_collective: "mcollective".to_string(),
            collectives: vec!["mcollective".to_string()],
            identity: "collective-rpc".to_string(),
            connector: ConnectorSettings::default(),
            security: SecuritySettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            scheme: AddressScheme::ActiveMq,
            use_b64: true,
            connect_timeout_ms: 10_000,
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            default_call_timeout_ms: 5_000,
        }
    }
}

impl RpcSettings {
    /// Timeout used by `call()`.
    ///
    /// Falls back to [`DEFAULT_TIMEOUT`] when the configured value is zero.
    #[must_use]
    pub const fn default_call_timeout(&self) -> Duration {
        if self.timeouts.default_call_timeout_ms == 0 {
            DEFAULT_TIMEOUT
        } else {
            Duration::from_millis(self.timeouts.default_call_timeout_ms)
        }
    }

    /// Bound on establishing a session.
    ///
    /// Falls back to [`DEFAULT_CONNECT_TIMEOUT`] when the configured value is zero.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        if self.connector.connect_timeout_ms == 0 {
            DEFAULT_CONNECT_TIMEOUT
        } else {
            Duration::from_millis(self.connector.connect_timeout_ms)
        }
    }

    /// Whether actions may address `collective`.
    #[must_use]
    pub fn allows_collective(&self, collective: &str) -> bool {
        collective == self.main_collective
            || self.collectives.is_empty()
            || self.collectives.iter().any(|known| known == collective)
    }

    /// Load settings from XDG-compliant locations.
    ///
    /// Looks for `$XDG_CONFIG_HOME/collective/client.toml` (then the XDG
    /// system directories). A missing file yields the defaults; a malformed
    /// one is logged and also yields the defaults.
    pub fn load() -> Self {
        use tracing::{error, info};

        let xdg_dirs = match xdg::BaseDirectories::with_prefix("collective") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        let Some(path) = xdg_dirs.find_config_file("client.toml") else {
            info!("No client configuration found, using defaults");
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(settings) => {
                info!("Loaded client configuration from: {}", path.display());
                settings
            }
            Err(e) => {
                error!("{:#}", e);
                Self::default()
            }
        }
    }

    /// Load settings from an explicit TOML file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))
    }

    /// Builds the security provider these settings select.
    pub fn build_security(&self) -> Result<Arc<dyn Security>, RpcError> {
        match self.security.provider {
            SecurityProvider::None => Ok(Arc::new(PlainSecurity)),
            SecurityProvider::Psk => {
                let psk = self
                    .security
                    .psk
                    .as_deref()
                    .filter(|psk| !psk.is_empty())
                    .ok_or_else(|| RpcError::Config("psk provider requires security.psk".to_string()))?;
                Ok(Arc::new(PskSecurity::new(psk)))
            }
        }
    }
}

type ConnectorFactory = Arc<dyn Fn(&RpcSettings) -> Arc<dyn Connector> + Send + Sync>;

/// Everything an action needs from its environment.
///
/// Pairs [`RpcSettings`] with a connector factory and a security provider.
/// Cloning is cheap and a `Config` is never mutated by a call.
#[derive(Clone)]
pub struct Config {
    settings: RpcSettings,
    connector_factory: ConnectorFactory,
    security: Arc<dyn Security>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("settings", &self.settings)
            .field("security", &self.security)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Creates a config whose connectors come from `connector_factory`.
    ///
    /// The security provider is derived from `settings`; see
    /// [`RpcSettings::build_security`].
    pub fn new<F>(settings: RpcSettings, connector_factory: F) -> Result<Self, RpcError>
    where
        F: Fn(&RpcSettings) -> Arc<dyn Connector> + Send + Sync + 'static,
    {
        let security = settings.build_security()?;
        Ok(Self {
            settings,
            connector_factory: Arc::new(connector_factory),
            security,
        })
    }

    /// Replaces the security provider.
    #[must_use]
    pub fn with_security(mut self, security: Arc<dyn Security>) -> Self {
        self.security = security;
        self
    }

    /// The underlying settings.
    #[must_use]
    pub const fn settings(&self) -> &RpcSettings {
        &self.settings
    }

    /// Collective used when an action does not name one.
    #[must_use]
    pub fn main_collective(&self) -> &str {
        &self.settings.main_collective
    }

    /// Timeout used by `call()`.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.settings.default_call_timeout()
    }

    /// Bound on establishing a session.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.settings.connect_timeout()
    }

    /// Identity sent with every request.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.settings.identity
    }

    /// Produces a connector from the factory.
    #[must_use]
    pub fn get_connector(&self) -> Arc<dyn Connector> {
        (self.connector_factory)(&self.settings)
    }

    /// The security provider.
    #[must_use]
    pub fn get_security(&self) -> Arc<dyn Security> {
        Arc::clone(&self.security)
    }
}
