// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Last-known device state and the changes applied to it.
//!
//! [`LightState`] mirrors what the host currently displays for a device.
//! [`StateChange`] is one field update, produced either by a command the
//! dispatcher just applied or by reconciling a fresh device query.
//!
//! # Examples
//!
//! ```
//! use lightnode::state::{LightState, StateChange};
//! use lightnode::types::PowerState;
//!
//! let mut state = LightState::new();
//! assert!(state.apply(&StateChange::Power(PowerState::On)));
//! assert!(!state.apply(&StateChange::Power(PowerState::On)));
//! assert_eq!(state.power(), Some(PowerState::On));
//! ```

mod light_state;
mod state_change;

pub use light_state::LightState;
pub use state_change::StateChange;
