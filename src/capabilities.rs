// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device capability tags.
//!
//! Bridges, zones and panels accept overlapping but different command sets.
//! Each [`Device`](crate::registry::Device) carries an explicit set of
//! [`Capability`] tags, and the command dispatcher checks membership before
//! touching the device's control channel.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One feature a device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// On/off control.
    Power,
    /// Brightness control.
    Brightness,
    /// Color (hue) control.
    Color,
    /// Saturation control.
    Saturation,
    /// Color temperature control.
    ColorTemperature,
    /// Effect selection by name through an effect catalog.
    Effect,
    /// Effect selection by raw disco-mode number (no catalog).
    DiscoMode,
    /// Switch to white mode.
    WhiteMode,
    /// Switch to night mode.
    NightMode,
    /// Live state can be queried.
    Query,
    /// The capability profile can be regenerated from the device.
    Profile,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The set of capabilities a device declares.
///
/// # Examples
///
/// ```
/// use lightnode::{Capabilities, Capability};
///
/// let panel = Capabilities::nanoleaf_panel();
/// assert!(panel.supports(Capability::Effect));
/// assert!(!panel.supports(Capability::NightMode));
///
/// let custom = Capabilities::builder()
///     .with(Capability::Power)
///     .with(Capability::Brightness)
///     .build();
/// assert_eq!(custom.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities(BTreeSet<Capability>);

impl Capabilities {
    /// Creates an empty capability set.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Starts building a custom capability set.
    #[must_use]
    pub fn builder() -> CapabilitiesBuilder {
        CapabilitiesBuilder::default()
    }

    /// The lamp built into a MiLight v6 bridge.
    ///
    /// - On/off, color, brightness
    /// - Disco modes
    /// - White mode
    #[must_use]
    pub fn milight_bridge() -> Self {
        Self::from_iter([
            Capability::Power,
            Capability::Color,
            Capability::Brightness,
            Capability::DiscoMode,
            Capability::WhiteMode,
        ])
    }

    /// A MiLight zone (1-4) behind a bridge.
    #[must_use]
    pub fn milight_zone() -> Self {
        Self::from_iter([
            Capability::Power,
            Capability::Color,
            Capability::Saturation,
            Capability::Brightness,
            Capability::ColorTemperature,
            Capability::DiscoMode,
            Capability::WhiteMode,
            Capability::NightMode,
        ])
    }

    /// A Nanoleaf panel array.
    #[must_use]
    pub fn nanoleaf_panel() -> Self {
        Self::from_iter([
            Capability::Power,
            Capability::Brightness,
            Capability::Color,
            Capability::Saturation,
            Capability::ColorTemperature,
            Capability::Effect,
            Capability::Query,
            Capability::Profile,
        ])
    }

    /// Returns whether the set contains `capability`.
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// Returns whether effects are addressed through a catalog.
    #[must_use]
    pub fn uses_effect_catalog(&self) -> bool {
        self.supports(Capability::Effect)
    }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the device declares nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the capabilities in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builder for custom capability sets.
#[derive(Debug, Default)]
pub struct CapabilitiesBuilder {
    inner: BTreeSet<Capability>,
}

impl CapabilitiesBuilder {
    /// Adds a capability.
    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.inner.insert(capability);
        self
    }

    /// Removes a capability.
    #[must_use]
    pub fn without(mut self, capability: Capability) -> Self {
        self.inner.remove(&capability);
        self
    }

    /// Builds the capability set.
    #[must_use]
    pub fn build(self) -> Capabilities {
        Capabilities(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        assert!(Capabilities::default().is_empty());
        assert!(!Capabilities::none().supports(Capability::Power));
    }

    #[test]
    fn bridge_lacks_zone_only_features() {
        let bridge = Capabilities::milight_bridge();
        assert!(bridge.supports(Capability::DiscoMode));
        assert!(!bridge.supports(Capability::Saturation));
        assert!(!bridge.supports(Capability::NightMode));
        assert!(!bridge.uses_effect_catalog());
    }

    #[test]
    fn zone_capabilities() {
        let zone = Capabilities::milight_zone();
        assert!(zone.supports(Capability::NightMode));
        assert!(zone.supports(Capability::ColorTemperature));
        assert!(!zone.supports(Capability::Query));
    }

    #[test]
    fn panel_uses_catalog() {
        let panel = Capabilities::nanoleaf_panel();
        assert!(panel.uses_effect_catalog());
        assert!(panel.supports(Capability::Profile));
        assert!(!panel.supports(Capability::DiscoMode));
    }

    #[test]
    fn builder_pattern() {
        let caps = Capabilities::builder()
            .with(Capability::Power)
            .with(Capability::Effect)
            .with(Capability::Power)
            .without(Capability::Effect)
            .build();

        assert_eq!(caps.len(), 1);
        assert_eq!(caps.iter().collect::<Vec<_>>(), vec![Capability::Power]);
    }
}
