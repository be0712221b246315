// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `lightnode` - smart-lighting integrations for a home-automation controller.
//!
//! This library brings MiLight bridges and Nanoleaf panels into a host
//! automation framework. A supervisory [`Controller`] discovers the configured
//! units, obtains and persists their tokens, mirrors their state into the host
//! and forwards host commands to each device's native protocol.
//!
//! # Supported Features
//!
//! - **Discovery**: configured address lists, positional token pairing,
//!   single-flight passes
//! - **Pairing**: token requests with timeout, persisted per address
//! - **State sync**: short-interval polling with change detection, a
//!   long-interval heartbeat
//! - **Commands**: power, brightness, color, saturation, color temperature,
//!   effects, white and night modes, gated by device capabilities
//! - **Profiles**: effect catalogs cached on disk and rendered into the
//!   host's capability profile
//!
//! # Supported Hardware
//!
//! - Nanoleaf Aurora, Canvas and Shapes over the OpenAPI (feature `nanoleaf`)
//! - MiLight iBox v6 bridges, the bridge lamp and zones 1-4 (feature `milight`)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use lightnode::controller::{Controller, Supervisor};
//! use lightnode::event::DeviceId;
//! use lightnode::family::Nanoleaf;
//! use lightnode::store::JsonFileStore;
//!
//! #[tokio::main]
//! async fn main() -> lightnode::Result<()> {
//!     let params = HashMap::from([("host".to_string(), "192.168.1.40".to_string())]);
//!
//!     let controller = Controller::builder(Nanoleaf::new())
//!         .with_params(params)
//!         .with_store(Arc::new(JsonFileStore::new("custom_data.json")))
//!         .build();
//!
//!     controller.on_start().await?;
//!     controller.discovery().wait().await;
//!
//!     controller
//!         .on_command(Some(&DeviceId::new("aurora1")), "SET_BRI", Some("75"))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Events
//!
//! Everything the host should display arrives on the event bus:
//!
//! ```no_run
//! use lightnode::controller::Controller;
//! use lightnode::event::DeviceEvent;
//! use lightnode::family::MiLight;
//!
//! # async fn example() {
//! let controller = Controller::builder(MiLight::new()).build();
//! let mut events = controller.subscribe();
//!
//! while let Ok(event) = events.recv().await {
//!     if let DeviceEvent::StateChanged { device_id, change, .. } = event {
//!         println!("{device_id}: {change:?}");
//!     }
//! }
//! # }
//! ```

mod capabilities;
pub mod catalog;
pub mod channel;
pub mod command;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod family;
pub mod pairing;
pub mod profile;
pub mod registry;
pub mod state;
pub mod store;
pub mod sync;
pub mod types;

pub use capabilities::{Capabilities, CapabilitiesBuilder, Capability};
pub use catalog::{EffectCatalog, EffectCatalogCache};
pub use channel::{DeviceChannel, NativeState};
pub use command::{Command, CommandName};
pub use config::{ControllerSettings, IntegrationConfig};
pub use controller::{Controller, ControllerBuilder, Supervisor};
pub use discovery::{DiscoveryOrchestrator, DiscoveryReport, DiscoveryRequest, DiscoveryStart};
pub use dispatch::CommandDispatcher;
pub use error::{
    CacheError, ChannelError, ConfigError, Error, PairingError, ProfileError, Result, StoreError,
    ValidationError,
};
pub use event::{DeviceEvent, DeviceId, EventBus};
pub use family::DeviceFamily;
pub use pairing::PairingNegotiator;
pub use profile::{ProfileGenerator, ProfileInstaller, ProfileManager};
pub use registry::{Device, DeviceRegistry};
pub use state::{LightState, StateChange};
pub use store::{CredentialStore, KeyValueStore};
pub use sync::{Heartbeat, StateSynchronizer, SyncReport};
pub use types::{Credential, DeviceAddress, PowerState};
