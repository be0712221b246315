// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Controller configuration.
//!
//! Two layers feed a controller:
//!
//! - [`IntegrationConfig`]: the operator's custom parameters (`host`/`ip`,
//!   `port`, `token`, `requestNewToken`), read once at startup from the
//!   host's string map.
//! - [`ControllerSettings`]: runtime knobs (poll cadence, timeouts, file
//!   locations). They have sensible defaults, `with_*` builders and can be
//!   deserialized from JSON.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashMap;
//! use lightnode::config::IntegrationConfig;
//!
//! let params = HashMap::from([
//!     ("ip".to_string(), "10.0.0.5,10.0.0.6".to_string()),
//!     ("token".to_string(), "abc,def".to_string()),
//! ]);
//! let config = IntegrationConfig::from_params(&params).unwrap();
//! assert_eq!(config.addresses().len(), 2);
//! assert_eq!(config.tokens().map(<[_]>::len), Some(2));
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Credential, DeviceAddress};

/// Parameter holding the device address list.
pub const PARAM_HOST: &str = "host";
/// Alternative name for [`PARAM_HOST`].
pub const PARAM_IP: &str = "ip";
/// Parameter holding the port shared by every address.
pub const PARAM_PORT: &str = "port";
/// Parameter holding the token list.
pub const PARAM_TOKEN: &str = "token";
/// Parameter forcing re-pairing.
pub const PARAM_REQUEST_NEW_TOKEN: &str = "requestNewToken";

/// Operator-supplied integration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrationConfig {
    addresses: Vec<DeviceAddress>,
    tokens: Option<Vec<Credential>>,
    request_new_token: bool,
}

impl IntegrationConfig {
    /// Creates a configuration for the given addresses.
    #[must_use]
    pub fn new(addresses: Vec<DeviceAddress>) -> Self {
        Self {
            addresses,
            tokens: None,
            request_new_token: false,
        }
    }

    /// Sets the positional token list.
    #[must_use]
    pub fn with_tokens(mut self, tokens: Vec<Credential>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Forces re-pairing even when tokens are known.
    #[must_use]
    pub fn with_request_new_token(mut self, force: bool) -> Self {
        self.request_new_token = force;
        self
    }

    /// Parses the host's custom parameter map.
    ///
    /// `host` takes precedence over `ip` when both are present. A `port`
    /// applies to every address that does not carry its own. Token and
    /// address counts are not compared here; see
    /// [`check_tokens`](Self::check_tokens).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no address is given, a list contains an empty
    /// entry, the port is not a number or `requestNewToken` is not
    /// boolean-like.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let hosts = non_empty(PARAM_HOST)
            .or_else(|| non_empty(PARAM_IP))
            .ok_or(ConfigError::MissingHost)?;

        let port = non_empty(PARAM_PORT)
            .map(|p| {
                p.parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort(p.to_string()))
            })
            .transpose()?;

        let addresses = DeviceAddress::parse_list(hosts)?
            .into_iter()
            .map(|addr| addr.or_port(port))
            .collect();

        let tokens = non_empty(PARAM_TOKEN)
            .map(Credential::parse_list)
            .transpose()?;

        let request_new_token = non_empty(PARAM_REQUEST_NEW_TOKEN)
            .map(|v| parse_flag(PARAM_REQUEST_NEW_TOKEN, v))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            addresses,
            tokens,
            request_new_token,
        })
    }

    /// Gives every address without a port the family's `port`.
    #[must_use]
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.addresses = self
            .addresses
            .iter()
            .map(|addr| addr.or_port(Some(port)))
            .collect();
        self
    }

    /// Configured addresses, in order.
    #[must_use]
    pub fn addresses(&self) -> &[DeviceAddress] {
        &self.addresses
    }

    /// Configured tokens, in order, if any.
    #[must_use]
    pub fn tokens(&self) -> Option<&[Credential]> {
        self.tokens.as_deref()
    }

    /// Whether re-pairing is forced.
    #[must_use]
    pub fn request_new_token(&self) -> bool {
        self.request_new_token
    }

    /// Checks that a configured token list pairs up one-to-one with the
    /// addresses.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AddressTokenMismatch` if the counts differ.
    pub fn check_tokens(&self) -> Result<(), ConfigError> {
        match &self.tokens {
            Some(tokens) if tokens.len() != self.addresses.len() => {
                Err(ConfigError::AddressTokenMismatch {
                    addresses: self.addresses.len(),
                    tokens: tokens.len(),
                })
            }
            _ => Ok(()),
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Runtime settings of a controller.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use lightnode::config::ControllerSettings;
///
/// let settings = ControllerSettings::default()
///     .with_short_poll(Duration::from_secs(5))
///     .with_discovery_delay(Duration::ZERO);
/// assert_eq!(settings.short_poll(), Duration::from_secs(5));
///
/// let parsed: ControllerSettings =
///     serde_json::from_str(r#"{ "long_poll": 120 }"#).unwrap();
/// assert_eq!(parsed.long_poll(), Duration::from_secs(120));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    #[serde(with = "duration_secs")]
    short_poll: Duration,
    #[serde(with = "duration_secs")]
    long_poll: Duration,
    #[serde(with = "duration_secs")]
    discovery_delay: Duration,
    #[serde(with = "duration_secs")]
    pairing_timeout: Duration,
    effect_cache: PathBuf,
    profile_root: PathBuf,
}

impl ControllerSettings {
    /// Default short-interval tick.
    pub const DEFAULT_SHORT_POLL: Duration = Duration::from_secs(10);
    /// Default long-interval tick.
    pub const DEFAULT_LONG_POLL: Duration = Duration::from_secs(60);
    /// Default pause before a discovery pass registers devices.
    pub const DEFAULT_DISCOVERY_DELAY: Duration = Duration::from_secs(1);
    /// Default bound on a single pairing request.
    pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default effect catalog cache file.
    pub const DEFAULT_EFFECT_CACHE: &'static str = ".effectLists.json";
    /// Default capability profile directory.
    pub const DEFAULT_PROFILE_ROOT: &'static str = "profile";

    /// Sets the short-interval tick.
    #[must_use]
    pub fn with_short_poll(mut self, interval: Duration) -> Self {
        self.short_poll = interval;
        self
    }

    /// Sets the long-interval tick.
    #[must_use]
    pub fn with_long_poll(mut self, interval: Duration) -> Self {
        self.long_poll = interval;
        self
    }

    /// Sets the pause before discovery registers devices.
    #[must_use]
    pub fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = delay;
        self
    }

    /// Sets the pairing timeout.
    #[must_use]
    pub fn with_pairing_timeout(mut self, timeout: Duration) -> Self {
        self.pairing_timeout = timeout;
        self
    }

    /// Sets the effect catalog cache file.
    #[must_use]
    pub fn with_effect_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.effect_cache = path.into();
        self
    }

    /// Sets the capability profile directory.
    #[must_use]
    pub fn with_profile_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_root = path.into();
        self
    }

    /// Short-interval tick.
    #[must_use]
    pub fn short_poll(&self) -> Duration {
        self.short_poll
    }

    /// Long-interval tick.
    #[must_use]
    pub fn long_poll(&self) -> Duration {
        self.long_poll
    }

    /// Pause before discovery registers devices.
    #[must_use]
    pub fn discovery_delay(&self) -> Duration {
        self.discovery_delay
    }

    /// Bound on a single pairing request.
    #[must_use]
    pub fn pairing_timeout(&self) -> Duration {
        self.pairing_timeout
    }

    /// Effect catalog cache file.
    #[must_use]
    pub fn effect_cache(&self) -> &Path {
        &self.effect_cache
    }

    /// Capability profile directory.
    #[must_use]
    pub fn profile_root(&self) -> &Path {
        &self.profile_root
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            short_poll: Self::DEFAULT_SHORT_POLL,
            long_poll: Self::DEFAULT_LONG_POLL,
            discovery_delay: Self::DEFAULT_DISCOVERY_DELAY,
            pairing_timeout: Self::DEFAULT_PAIRING_TIMEOUT,
            effect_cache: PathBuf::from(Self::DEFAULT_EFFECT_CACHE),
            profile_root: PathBuf::from(Self::DEFAULT_PROFILE_ROOT),
        }
    }
}

/// Durations as whole seconds in JSON.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn missing_host_is_an_error() {
        let err = IntegrationConfig::from_params(&params(&[("port", "16021")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingHost);
    }

    #[test]
    fn blank_host_is_missing() {
        let err = IntegrationConfig::from_params(&params(&[("ip", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingHost);
    }

    #[test]
    fn host_takes_precedence_over_ip() {
        let config =
            IntegrationConfig::from_params(&params(&[("host", "a"), ("ip", "b")])).unwrap();
        assert_eq!(config.addresses(), &[DeviceAddress::new("a")]);
    }

    #[test]
    fn default_port_yields_to_configured_ones() {
        let config =
            IntegrationConfig::from_params(&params(&[("host", "a,b:1"), ("port", "2")]))
                .unwrap()
                .with_default_port(3);
        assert_eq!(config.addresses()[0].port(), Some(2));
        assert_eq!(config.addresses()[1].port(), Some(1));

        let config = IntegrationConfig::new(vec![DeviceAddress::new("c")]).with_default_port(3);
        assert_eq!(config.addresses()[0].port(), Some(3));
    }

    #[test]
    fn port_applies_to_addresses_without_one() {
        let config =
            IntegrationConfig::from_params(&params(&[("host", "a,b:1"), ("port", "5987")]))
                .unwrap();
        assert_eq!(config.addresses()[0].port(), Some(5987));
        assert_eq!(config.addresses()[1].port(), Some(1));
    }

    #[test]
    fn token_count_must_match_addresses() {
        let config =
            IntegrationConfig::from_params(&params(&[("host", "a,b"), ("token", "t")])).unwrap();
        assert_eq!(
            config.check_tokens().unwrap_err(),
            ConfigError::AddressTokenMismatch {
                addresses: 2,
                tokens: 1
            }
        );

        let config = IntegrationConfig::from_params(&params(&[("host", "a,b")])).unwrap();
        assert!(config.check_tokens().is_ok());
    }

    #[test]
    fn invalid_port() {
        let err = IntegrationConfig::from_params(&params(&[("host", "a"), ("port", "x")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("x".to_string()));
    }

    #[test]
    fn tokens_are_positional_and_unchecked() {
        let config =
            IntegrationConfig::from_params(&params(&[("ip", "a,b"), ("token", "t1")])).unwrap();
        assert_eq!(config.tokens(), Some(&[Credential::new("t1")][..]));
    }

    #[test]
    fn request_new_token_flag() {
        for (raw, expected) in [("1", true), ("true", true), ("0", false), ("off", false)] {
            let config =
                IntegrationConfig::from_params(&params(&[("ip", "a"), ("requestNewToken", raw)]))
                    .unwrap();
            assert_eq!(config.request_new_token(), expected, "value {raw}");
        }

        let err = IntegrationConfig::from_params(&params(&[("ip", "a"), ("requestNewToken", "2")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlag { .. }));
    }

    #[test]
    fn settings_defaults() {
        let settings = ControllerSettings::default();
        assert_eq!(settings.short_poll(), Duration::from_secs(10));
        assert_eq!(settings.pairing_timeout(), Duration::from_secs(5));
        assert_eq!(settings.effect_cache(), Path::new(".effectLists.json"));
    }

    #[test]
    fn settings_from_json_fills_defaults() {
        let settings: ControllerSettings =
            serde_json::from_str(r#"{ "short_poll": 3, "profile_root": "/tmp/p" }"#).unwrap();
        assert_eq!(settings.short_poll(), Duration::from_secs(3));
        assert_eq!(settings.long_poll(), ControllerSettings::DEFAULT_LONG_POLL);
        assert_eq!(settings.profile_root(), Path::new("/tmp/p"));
    }
}
