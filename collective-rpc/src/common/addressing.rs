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
//! Bus addressing for collective requests and their replies.
//!
//! Targets are pure functions of `(collective, agent)` so that a requester and
//! every remote agent agree on the same destination without coordination.

use serde::{Deserialize, Serialize};

/// Destination naming convention used by the middleware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressScheme {
    /// Topic-based naming: `/topic/<collective>.<agent>.agent`.
    #[default]
    ActiveMq,
    /// Exchange-based naming: `/exchange/<collective>_broadcast/<agent>`.
    RabbitMq,
}

/// Returns the destination a request for `agent` in `collective` is sent to.
#[must_use]
pub fn get_target(scheme: AddressScheme, collective: &str, agent: &str) -> String {
    match scheme {
        AddressScheme::ActiveMq => format!("/topic/{collective}.{agent}.agent"),
        AddressScheme::RabbitMq => format!("/exchange/{collective}_broadcast/{agent}"),
    }
}

/// Returns the destination replies for `agent` in `collective` are published to.
///
/// Never equal to [`get_target`] for the same inputs, so a requester does not
/// receive its own request.
#[must_use]
pub fn get_reply_target(scheme: AddressScheme, collective: &str, agent: &str) -> String {
    match scheme {
        AddressScheme::ActiveMq => format!("/topic/{collective}.{agent}.reply"),
        AddressScheme::RabbitMq => format!("/temp-queue/{collective}_reply_{agent}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMES: [AddressScheme; 2] = [AddressScheme::ActiveMq, AddressScheme::RabbitMq];

    #[test]
    fn test_activemq_targets() {
        assert_eq!(
            get_target(AddressScheme::ActiveMq, "mcollective", "rpcutil"),
            "/topic/mcollective.rpcutil.agent"
        );
        assert_eq!(
            get_reply_target(AddressScheme::ActiveMq, "mcollective", "rpcutil"),
            "/topic/mcollective.rpcutil.reply"
        );
    }

    #[test]
    fn test_rabbitmq_targets() {
        assert_eq!(
            get_target(AddressScheme::RabbitMq, "mcollective", "package"),
            "/exchange/mcollective_broadcast/package"
        );
        assert_eq!(
            get_reply_target(AddressScheme::RabbitMq, "mcollective", "package"),
            "/temp-queue/mcollective_reply_package"
        );
    }

    #[test]
    fn test_target_never_equals_reply_target() {
        let names = ["", "a", "mcollective", "reply", "agent", "x.reply", "_broadcast"];
        for scheme in SCHEMES {
            for collective in names {
                for agent in names {
                    assert_ne!(
                        get_target(scheme, collective, agent),
                        get_reply_target(scheme, collective, agent),
                        "{scheme:?} {collective:?} {agent:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_targets_are_deterministic() {
        for scheme in SCHEMES {
            assert_eq!(
                get_target(scheme, "eu", "service"),
                get_target(scheme, "eu", "service")
            );
            assert_eq!(
                get_reply_target(scheme, "eu", "service"),
                get_reply_target(scheme, "eu", "service")
            );
            assert_ne!(get_target(scheme, "eu", "service"), get_target(scheme, "us", "service"));
        }
    }

    #[test]
    fn test_scheme_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Holder {
            scheme: AddressScheme,
        }
        let holder: Holder = toml::from_str("scheme = \"rabbitmq\"").unwrap();
        assert_eq!(holder.scheme, AddressScheme::RabbitMq);
    }
}
