// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One registered controllable unit.

use crate::capabilities::{Capabilities, Capability};
use crate::catalog::EffectCatalog;
use crate::event::DeviceId;
use crate::state::{LightState, StateChange};
use crate::types::{Credential, DeviceAddress};

/// A light zone, bridge lamp or panel array together with its control
/// channel.
///
/// # Examples
///
/// ```
/// use lightnode::{Capabilities, Device};
/// use lightnode::event::DeviceId;
/// use lightnode::types::{Credential, DeviceAddress};
///
/// let device = Device::new(
///     DeviceId::new("aurora1"),
///     "Aurora1",
///     DeviceAddress::new("10.0.0.5"),
///     Capabilities::nanoleaf_panel(),
///     (),
/// )
/// .requiring_credential()
/// .with_credential(Credential::new("abc"));
///
/// assert!(device.is_authorized());
/// assert!(device.is_pollable());
/// ```
#[derive(Debug)]
pub struct Device<C> {
    id: DeviceId,
    name: String,
    address: DeviceAddress,
    credential: Option<Credential>,
    requires_credential: bool,
    capabilities: Capabilities,
    state: LightState,
    catalog: Option<EffectCatalog>,
    poll: bool,
    channel: C,
}

impl<C> Device<C> {
    /// Creates a device. It is poll-eligible when its capabilities include
    /// [`Capability::Query`].
    #[must_use]
    pub fn new(
        id: DeviceId,
        name: impl Into<String>,
        address: DeviceAddress,
        capabilities: Capabilities,
        channel: C,
    ) -> Self {
        let poll = capabilities.supports(Capability::Query);
        Self {
            id,
            name: name.into(),
            address,
            credential: None,
            requires_credential: false,
            capabilities,
            state: LightState::new(),
            catalog: None,
            poll,
            channel,
        }
    }

    /// Marks the device as unusable without a credential.
    #[must_use]
    pub fn requiring_credential(mut self) -> Self {
        self.requires_credential = true;
        self
    }

    /// Binds a credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Returns the device id.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the address.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Returns the bound credential.
    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Returns `false` for a device that needs a credential and has none.
    /// Such a device is never polled or commanded.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        !self.requires_credential || self.credential.is_some()
    }

    /// Returns the declared capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns whether `capability` is declared.
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.supports(capability)
    }

    /// Returns whether the synchronizer queries this device.
    #[must_use]
    pub fn is_pollable(&self) -> bool {
        self.poll && self.is_authorized()
    }

    /// Returns the last-known state.
    #[must_use]
    pub fn state(&self) -> &LightState {
        &self.state
    }

    /// Records a change in the last-known state.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        self.state.apply(change)
    }

    /// Merges an observed state, returning the changes to report.
    pub fn reconcile(&mut self, observed: &LightState, force: bool) -> Vec<StateChange> {
        self.state.reconcile(observed, force)
    }

    /// Returns the effect catalog, if one was loaded.
    #[must_use]
    pub fn catalog(&self) -> Option<&EffectCatalog> {
        self.catalog.as_ref()
    }

    /// Replaces the effect catalog.
    pub fn set_catalog(&mut self, catalog: EffectCatalog) {
        self.catalog = Some(catalog);
    }

    /// Returns the control channel.
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Device<()> {
        Device::new(
            DeviceId::new("aurora1"),
            "Aurora1",
            DeviceAddress::new("10.0.0.5"),
            Capabilities::nanoleaf_panel(),
            (),
        )
        .requiring_credential()
    }

    #[test]
    fn unpaired_device_is_inert() {
        let device = panel();
        assert!(!device.is_authorized());
        assert!(!device.is_pollable());

        let paired = panel().with_credential(Credential::new("abc"));
        assert!(paired.is_authorized());
        assert!(paired.is_pollable());
    }

    #[test]
    fn tokenless_family_is_always_authorized() {
        let zone = Device::new(
            DeviceId::new("milight1_zone1"),
            "Zone1",
            DeviceAddress::new("10.0.0.9"),
            Capabilities::milight_zone(),
            (),
        );
        assert!(zone.is_authorized());
        assert!(!zone.is_pollable());
    }

    #[test]
    fn apply_updates_state() {
        let mut device = panel();
        assert!(device.apply(&StateChange::Brightness(150)));
        assert_eq!(device.state().brightness(), Some(150));
    }
}
