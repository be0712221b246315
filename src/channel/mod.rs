// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Native device control channels.
//!
//! A [`DeviceChannel`] is the request/response link to one controllable
//! unit. Every operation is optional: the default implementation answers
//! `ChannelError::Unsupported`, and each family overrides what its hardware
//! understands. Commands never reach a channel unless the device declares
//! the matching capability.
//!
//! # Implementations
//!
//! - [`NanoleafClient`]: Nanoleaf OpenAPI over HTTP (feature `nanoleaf`)
//! - [`MiLightChannel`]: MiLight v6 bridge over UDP (feature `milight`)

#[cfg(feature = "milight")]
mod milight;
#[cfg(feature = "nanoleaf")]
mod nanoleaf;

#[cfg(feature = "milight")]
pub use milight::{MiLightBridge, MiLightChannel, MiLightTarget};
#[cfg(feature = "nanoleaf")]
pub use nanoleaf::NanoleafClient;

use std::fmt;
use std::future::Future;

use crate::catalog::EffectCatalog;
use crate::error::ChannelError;
use crate::state::LightState;
use crate::types::PowerState;

/// Live state as reported by a device.
///
/// The effect is reported by name; it is turned into a catalog index when
/// reconciled against the device's [`EffectCatalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeState {
    /// Whether the light is on.
    pub on: Option<bool>,
    /// Brightness.
    pub brightness: Option<i32>,
    /// Hue.
    pub hue: Option<i32>,
    /// Saturation.
    pub saturation: Option<i32>,
    /// Color temperature.
    pub color_temperature: Option<i32>,
    /// Name of the active effect.
    pub effect: Option<String>,
}

impl NativeState {
    /// Translates the report into the host's state model.
    ///
    /// An effect that is not in `catalog` (or any effect when there is no
    /// catalog) leaves the effect index unobserved.
    #[must_use]
    pub fn to_light_state(&self, catalog: Option<&EffectCatalog>) -> LightState {
        let mut state = LightState::new();
        if let Some(on) = self.on {
            state = state.with_power(PowerState::from(on));
        }
        if let Some(v) = self.brightness {
            state = state.with_brightness(v);
        }
        if let Some(v) = self.hue {
            state = state.with_color(v);
        }
        if let Some(v) = self.saturation {
            state = state.with_saturation(v);
        }
        if let Some(v) = self.color_temperature {
            state = state.with_color_temperature(v);
        }
        if let Some(index) = self
            .effect
            .as_deref()
            .and_then(|name| catalog?.index_of(name))
        {
            state = state.with_effect(index);
        }
        state
    }
}

/// Request/response link to one physical unit.
pub trait DeviceChannel: Send + Sync + fmt::Debug + 'static {
    /// Switches the light on or off.
    fn set_power(&self, state: PowerState)
    -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Sets the brightness. The value is forwarded unvalidated.
    fn set_brightness(&self, _value: i32) -> impl Future<Output = Result<(), ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("brightness")) }
    }

    /// Sets the color (hue).
    fn set_color(&self, _value: i32) -> impl Future<Output = Result<(), ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("color")) }
    }

    /// Sets the saturation.
    fn set_saturation(&self, _value: i32) -> impl Future<Output = Result<(), ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("saturation")) }
    }

    /// Sets the color temperature.
    fn set_color_temperature(
        &self,
        _value: i32,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("color temperature")) }
    }

    /// Selects a named effect.
    fn select_effect(&self, _name: &str) -> impl Future<Output = Result<(), ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("effect selection")) }
    }

    /// Selects a built-in disco mode by number.
    fn set_disco_mode(&self, _mode: i32) -> impl Future<Output = Result<(), ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("disco mode")) }
    }

    /// Switches to white mode.
    fn set_white_mode(&self) -> impl Future<Output = Result<(), ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("white mode")) }
    }

    /// Switches to night mode.
    fn set_night_mode(&self) -> impl Future<Output = Result<(), ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("night mode")) }
    }

    /// Reads the live state.
    fn query_state(&self) -> impl Future<Output = Result<NativeState, ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("state query")) }
    }

    /// Lists the effects the device currently offers, in device order.
    fn list_effects(&self) -> impl Future<Output = Result<Vec<String>, ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("effect list")) }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_state_maps_effect_through_catalog() {
        let catalog = EffectCatalog::new(vec!["Flames".to_string(), "Forest".to_string()]);
        let native = NativeState {
            on: Some(true),
            brightness: Some(80),
            effect: Some("Forest".to_string()),
            ..NativeState::default()
        };

        let state = native.to_light_state(Some(&catalog));
        assert_eq!(state.power(), Some(PowerState::On));
        assert_eq!(state.brightness(), Some(80));
        assert_eq!(state.effect(), Some(2));
    }

    #[test]
    fn unknown_effect_is_left_unobserved() {
        let catalog = EffectCatalog::new(vec!["Flames".to_string()]);
        let native = NativeState {
            effect: Some("*Solid*".to_string()),
            ..NativeState::default()
        };

        assert_eq!(native.to_light_state(Some(&catalog)).effect(), None);
        assert_eq!(native.to_light_state(None).effect(), None);
    }
}
