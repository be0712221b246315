// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use crate::state::{LightState, StateChange};
use crate::types::DeviceAddress;

use super::DeviceId;

/// Events emitted by the controller.
///
/// # Examples
///
/// ```
/// use lightnode::event::{DeviceEvent, DeviceId};
/// use lightnode::state::{LightState, StateChange};
/// use lightnode::types::PowerState;
///
/// let event = DeviceEvent::state_changed(
///     DeviceId::new("aurora1"),
///     StateChange::Power(PowerState::On),
///     LightState::new(),
/// );
/// assert!(event.is_state_change());
/// ```
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A device was registered by discovery.
    DeviceAdded {
        /// The ID of the added device.
        device_id: DeviceId,
        /// The address the device was built from.
        address: DeviceAddress,
    },

    /// A host-visible value of a device changed.
    ///
    /// Emitted by polling when the device reports a different value, by a
    /// forced refresh for every observed value, and by the dispatcher right
    /// after a command succeeded.
    StateChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// The specific change that occurred.
        change: StateChange,
        /// The complete new last-known state.
        new_state: LightState,
    },

    /// The overall integration status changed.
    StatusChanged {
        /// Whether the integration is operational.
        online: bool,
    },

    /// The long-interval heartbeat flipped.
    Heartbeat {
        /// The new heartbeat value.
        state: bool,
    },

    /// A discovery pass completed.
    DiscoveryFinished {
        /// Number of devices registered by the pass.
        registered: usize,
        /// Number of addresses that failed to pair.
        failed: usize,
    },
}

impl DeviceEvent {
    /// Returns the device ID associated with this event, if any.
    #[must_use]
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Self::DeviceAdded { device_id, .. } | Self::StateChanged { device_id, .. } => {
                Some(device_id)
            }
            Self::StatusChanged { .. } | Self::Heartbeat { .. } | Self::DiscoveryFinished { .. } => {
                None
            }
        }
    }

    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Creates a device added event.
    #[must_use]
    pub fn device_added(device_id: DeviceId, address: DeviceAddress) -> Self {
        Self::DeviceAdded { device_id, address }
    }

    /// Creates a state changed event.
    #[must_use]
    pub fn state_changed(device_id: DeviceId, change: StateChange, new_state: LightState) -> Self {
        Self::StateChanged {
            device_id,
            change,
            new_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PowerState;

    #[test]
    fn device_id_extraction() {
        let id = DeviceId::new("aurora1");

        let added = DeviceEvent::device_added(id.clone(), DeviceAddress::new("10.0.0.5"));
        assert_eq!(added.device_id(), Some(&id));

        let heartbeat = DeviceEvent::Heartbeat { state: true };
        assert_eq!(heartbeat.device_id(), None);
    }

    #[test]
    fn state_change_events() {
        let event = DeviceEvent::state_changed(
            DeviceId::new("zone1"),
            StateChange::Power(PowerState::On),
            LightState::new(),
        );
        assert!(event.is_state_change());
        assert!(!DeviceEvent::StatusChanged { online: true }.is_state_change());
    }
}
