// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.
//!
//! Each change maps onto one host driver:
//!
//! | Change | Driver |
//! |--------|--------|
//! | [`StateChange::Power`] | `ST` |
//! | [`StateChange::Color`] | `GV1` |
//! | [`StateChange::Saturation`] | `GV2` |
//! | [`StateChange::Brightness`] | `GV3` |
//! | [`StateChange::ColorTemperature`] | `CLITEMP` |
//! | [`StateChange::Effect`] | `GV4` |

use serde::{Deserialize, Serialize};

use crate::types::PowerState;

/// A single change to a device's last-known state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateChange {
    /// Light switched on or off.
    Power(PowerState),

    /// Brightness changed.
    Brightness(i32),

    /// Color (hue) changed.
    Color(i32),

    /// Saturation changed.
    Saturation(i32),

    /// Color temperature changed.
    ColorTemperature(i32),

    /// Active effect changed (1-based catalog index or disco mode).
    Effect(i32),
}

impl StateChange {
    /// Returns the host driver this change is reported on.
    #[must_use]
    pub fn driver(&self) -> &'static str {
        match self {
            Self::Power(_) => "ST",
            Self::Color(_) => "GV1",
            Self::Saturation(_) => "GV2",
            Self::Brightness(_) => "GV3",
            Self::ColorTemperature(_) => "CLITEMP",
            Self::Effect(_) => "GV4",
        }
    }

    /// Returns the value reported on the driver.
    #[must_use]
    pub fn driver_value(&self) -> i32 {
        match self {
            Self::Power(state) => state.driver_value(),
            Self::Brightness(v)
            | Self::Color(v)
            | Self::Saturation(v)
            | Self::ColorTemperature(v)
            | Self::Effect(v) => *v,
        }
    }
}
