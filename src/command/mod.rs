// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host command definitions.
//!
//! The host delivers commands as a name plus an optional raw value. This
//! module turns that pair into a typed [`Command`].
//!
//! | Command | Value | Capability |
//! |---------|-------|------------|
//! | `DON` / `DOF` | - | [`Capability::Power`] |
//! | `SET_COLOR` | hue | [`Capability::Color`] |
//! | `SET_SAT` | saturation | [`Capability::Saturation`] |
//! | `SET_BRI` | brightness | [`Capability::Brightness`] |
//! | `CLITEMP` | temperature | [`Capability::ColorTemperature`] |
//! | `SET_EFFECT` | 1-based index | [`Capability::Effect`] or [`Capability::DiscoMode`] |
//! | `WHITE_MODE` | - | [`Capability::WhiteMode`] |
//! | `NIGHT_MODE` | - | [`Capability::NightMode`] |
//! | `SET_PROFILE` | - | [`Capability::Profile`] |
//! | `QUERY` | - | - |
//! | `DISCOVERY` | - | controller only |
//!
//! # Examples
//!
//! ```
//! use lightnode::command::{Command, CommandName};
//!
//! let cmd = Command::parse("SET_BRI", Some("75")).unwrap();
//! assert_eq!(cmd.name(), CommandName::SetBrightness);
//! assert_eq!(cmd.value(), Some(75));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::capabilities::Capability;
use crate::error::ValidationError;

/// Name of a host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandName {
    /// `DON`: switch on.
    On,
    /// `DOF`: switch off.
    Off,
    /// `SET_COLOR`: set the color.
    SetColor,
    /// `SET_BRI`: set the brightness.
    SetBrightness,
    /// `SET_SAT`: set the saturation.
    SetSaturation,
    /// `CLITEMP`: set the color temperature.
    ColorTemperature,
    /// `SET_EFFECT`: select an effect by 1-based index.
    SetEffect,
    /// `WHITE_MODE`: switch to white mode.
    WhiteMode,
    /// `NIGHT_MODE`: switch to night mode.
    NightMode,
    /// `SET_PROFILE`: rebuild the effect catalog and capability profile.
    SetProfile,
    /// `QUERY`: re-read and report the live state.
    Query,
    /// `DISCOVERY`: run discovery again.
    Discovery,
}

impl CommandName {
    /// Returns the wire name used by the host.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "DON",
            Self::Off => "DOF",
            Self::SetColor => "SET_COLOR",
            Self::SetBrightness => "SET_BRI",
            Self::SetSaturation => "SET_SAT",
            Self::ColorTemperature => "CLITEMP",
            Self::SetEffect => "SET_EFFECT",
            Self::WhiteMode => "WHITE_MODE",
            Self::NightMode => "NIGHT_MODE",
            Self::SetProfile => "SET_PROFILE",
            Self::Query => "QUERY",
            Self::Discovery => "DISCOVERY",
        }
    }

    /// Returns whether the command carries a numeric value.
    #[must_use]
    pub const fn takes_value(&self) -> bool {
        matches!(
            self,
            Self::SetColor
                | Self::SetBrightness
                | Self::SetSaturation
                | Self::ColorTemperature
                | Self::SetEffect
        )
    }

    /// Returns the capability a device must declare to accept the command.
    ///
    /// `SET_EFFECT` is satisfied by either effect flavor, every device
    /// answers `QUERY` (from its cache when it cannot be queried) and
    /// `DISCOVERY` targets the controller, so these return `None`.
    #[must_use]
    pub const fn required_capability(&self) -> Option<Capability> {
        match self {
            Self::On | Self::Off => Some(Capability::Power),
            Self::SetColor => Some(Capability::Color),
            Self::SetBrightness => Some(Capability::Brightness),
            Self::SetSaturation => Some(Capability::Saturation),
            Self::ColorTemperature => Some(Capability::ColorTemperature),
            Self::WhiteMode => Some(Capability::WhiteMode),
            Self::NightMode => Some(Capability::NightMode),
            Self::SetProfile => Some(Capability::Profile),
            Self::SetEffect | Self::Query | Self::Discovery => None,
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DON" => Ok(Self::On),
            "DOF" => Ok(Self::Off),
            "SET_COLOR" => Ok(Self::SetColor),
            "SET_BRI" => Ok(Self::SetBrightness),
            "SET_SAT" => Ok(Self::SetSaturation),
            "CLITEMP" => Ok(Self::ColorTemperature),
            "SET_EFFECT" => Ok(Self::SetEffect),
            "WHITE_MODE" => Ok(Self::WhiteMode),
            "NIGHT_MODE" => Ok(Self::NightMode),
            "SET_PROFILE" => Ok(Self::SetProfile),
            "QUERY" => Ok(Self::Query),
            "DISCOVERY" => Ok(Self::Discovery),
            _ => Err(ValidationError::UnknownCommand(s.to_string())),
        }
    }
}

/// A parsed host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    name: CommandName,
    value: Option<i32>,
}

impl Command {
    /// Creates a command without a value.
    #[must_use]
    pub const fn new(name: CommandName) -> Self {
        Self { name, value: None }
    }

    /// Creates a command with a value.
    #[must_use]
    pub const fn with_value(name: CommandName, value: i32) -> Self {
        Self {
            name,
            value: Some(value),
        }
    }

    /// Parses a raw host command.
    ///
    /// The value is parsed as an integer and is not range checked. A value
    /// given to a command that takes none is ignored.
    ///
    /// # Errors
    ///
    /// - `ValidationError::UnknownCommand` for an unrecognized name
    /// - `ValidationError::MissingValue` if a value is required but absent
    /// - `ValidationError::InvalidValue` if the value is not an integer
    pub fn parse(name: &str, value: Option<&str>) -> Result<Self, ValidationError> {
        let name: CommandName = name.parse()?;

        if !name.takes_value() {
            return Ok(Self::new(name));
        }

        let raw = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::MissingValue(name))?;
        let value = raw
            .parse::<i32>()
            .map_err(|_| ValidationError::InvalidValue {
                command: name,
                value: raw.to_string(),
            })?;

        Ok(Self::with_value(name, value))
    }

    /// Returns the command name.
    #[must_use]
    pub const fn name(&self) -> CommandName {
        self.name
    }

    /// Returns the numeric value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<i32> {
        self.value
    }

    /// Returns the value or `MissingValue`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingValue` if the command has no value.
    pub fn require_value(&self) -> Result<i32, ValidationError> {
        self.value.ok_or(ValidationError::MissingValue(self.name))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{} {v}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}
