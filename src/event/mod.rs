// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system forming the host's observable-state surface.
//!
//! Every state update the controller wants the host to see (device
//! registration, changed driver values, the integration status and the
//! heartbeat) is published on an [`EventBus`]. The host adapter subscribes
//! and maps events onto its own driver-reporting calls.
//!
//! # Examples
//!
//! ```
//! use lightnode::event::{DeviceEvent, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(DeviceEvent::StatusChanged { online: true });
//! ```

mod device_event;
mod device_id;
mod event_bus;

pub use device_event::DeviceEvent;
pub use device_id::DeviceId;
pub use event_bus::EventBus;
