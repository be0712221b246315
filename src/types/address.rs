// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Network locator of a physical device.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Address of a bridge or panel: a host plus an optional port.
///
/// The address is immutable once a device has been built from it. When no
/// port is given the device family's default applies.
///
/// # Examples
///
/// ```
/// use lightnode::types::DeviceAddress;
///
/// let addr: DeviceAddress = "10.0.0.5:16021".parse().unwrap();
/// assert_eq!(addr.host(), "10.0.0.5");
/// assert_eq!(addr.port(), Some(16021));
///
/// let bare = DeviceAddress::new("10.0.0.6");
/// assert_eq!(bare.port_or(5987), 5987);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddress {
    host: String,
    port: Option<u16>,
}

impl DeviceAddress {
    /// Creates an address without an explicit port.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
        }
    }

    /// Creates an address with an explicit port.
    #[must_use]
    pub fn with_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
        }
    }

    /// Returns the host part.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the explicit port, if any.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the explicit port or `default`.
    #[must_use]
    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }

    /// Returns a copy that uses `port` unless a port is already set.
    #[must_use]
    pub fn or_port(&self, port: Option<u16>) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port.or(port),
        }
    }

    /// Parses a comma-separated list of addresses.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an entry is blank or carries an invalid port.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ConfigError> {
        super::split_list(list)?
            .into_iter()
            .map(str::parse::<Self>)
            .collect()
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{port}", self.host),
            None => write!(f, "{}", self.host),
        }
    }
}

impl FromStr for DeviceAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::MissingHost);
        }

        // A single colon separates a port; bare IPv6 literals have several.
        match s.split_once(':') {
            Some((host, port)) if !port.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidPort(port.to_string()))?;
                Ok(Self::with_port(host, port))
            }
            _ => Ok(Self::new(s)),
        }
    }
}
