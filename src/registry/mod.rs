// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The set of registered devices.
//!
//! Devices are owned by the [`DeviceRegistry`]; discovery inserts them, and
//! the synchronizer and dispatcher reach them by id. Each device sits behind
//! its own async mutex, which is the critical section for read-modify-write
//! of its last-known state.

mod device;
mod device_registry;

pub use device::Device;
pub use device_registry::{DeviceRegistry, SharedDevice};
