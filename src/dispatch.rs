// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command dispatch.
//!
//! A host command is parsed, checked against the target device's declared
//! capabilities and forwarded to its control channel. Numeric values are
//! passed through as given; the device (or its vendor firmware) is the
//! only range check. Once the channel accepts the command the requested
//! value is written into the last-known state and reported right away,
//! without waiting for the next poll.

use std::sync::Arc;

use crate::capabilities::Capability;
use crate::catalog::EffectCatalog;
use crate::channel::DeviceChannel;
use crate::command::{Command, CommandName};
use crate::error::{Error, ValidationError};
use crate::event::{DeviceId, EventBus};
use crate::profile::ProfileManager;
use crate::registry::{Device, DeviceRegistry};
use crate::state::StateChange;
use crate::sync::StateSynchronizer;
use crate::types::PowerState;

/// Applies host commands to registered devices.
#[derive(Debug)]
pub struct CommandDispatcher<C> {
    registry: DeviceRegistry<C>,
    events: EventBus,
    sync: StateSynchronizer<C>,
    profiles: Arc<ProfileManager>,
}

impl<C: DeviceChannel> CommandDispatcher<C> {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        registry: DeviceRegistry<C>,
        events: EventBus,
        sync: StateSynchronizer<C>,
        profiles: Arc<ProfileManager>,
    ) -> Self {
        Self {
            registry,
            events,
            sync,
            profiles,
        }
    }

    /// Parses and applies a raw host command.
    ///
    /// Returns the state changes that were recorded and reported.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if the command is unknown, its value is missing
    ///   or malformed, the device is unpaired, lacks the capability or the
    ///   effect index is outside its catalog
    /// - `Error::DeviceNotFound` if no such device is registered
    /// - `Error::Unreachable` if the device rejected the command; the cached
    ///   state is then left unchanged
    /// - `Error::Profile` if `SET_PROFILE` could not regenerate the profile
    pub async fn apply(
        &self,
        device_id: &DeviceId,
        name: &str,
        value: Option<&str>,
    ) -> Result<Vec<StateChange>, Error> {
        let command = Command::parse(name, value)?;
        self.execute(device_id, command).await
    }

    /// Applies a parsed command.
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    pub async fn execute(
        &self,
        device_id: &DeviceId,
        command: Command,
    ) -> Result<Vec<StateChange>, Error> {
        let name = command.name();
        if name == CommandName::Discovery {
            return Err(ValidationError::ControllerCommand(name).into());
        }

        let shared = self
            .registry
            .get(device_id)
            .await
            .ok_or_else(|| Error::DeviceNotFound(device_id.clone()))?;
        let mut device = shared.lock().await;

        if !device.is_authorized() {
            return Err(ValidationError::Unauthenticated(device_id.clone()).into());
        }
        if let Some(capability) = name.required_capability()
            && !device.supports(capability)
        {
            return Err(ValidationError::Unsupported {
                device: device_id.clone(),
                command: name,
            }
            .into());
        }

        tracing::debug!(%device_id, %command, "Applying command");
        let channel = device.channel();
        let change = match name {
            CommandName::On => {
                channel.set_power(PowerState::On).await?;
                Some(StateChange::Power(PowerState::On))
            }
            CommandName::Off => {
                channel.set_power(PowerState::Off).await?;
                Some(StateChange::Power(PowerState::Off))
            }
            CommandName::SetColor => {
                let value = command.require_value()?;
                channel.set_color(value).await?;
                Some(StateChange::Color(value))
            }
            CommandName::SetBrightness => {
                let value = command.require_value()?;
                channel.set_brightness(value).await?;
                Some(StateChange::Brightness(value))
            }
            CommandName::SetSaturation => {
                let value = command.require_value()?;
                channel.set_saturation(value).await?;
                Some(StateChange::Saturation(value))
            }
            CommandName::ColorTemperature => {
                let value = command.require_value()?;
                channel.set_color_temperature(value).await?;
                Some(StateChange::ColorTemperature(value))
            }
            CommandName::SetEffect => {
                let index = command.require_value()?;
                select_effect(&device, index).await?;
                Some(StateChange::Effect(index))
            }
            CommandName::WhiteMode => {
                channel.set_white_mode().await?;
                None
            }
            CommandName::NightMode => {
                channel.set_night_mode().await?;
                None
            }
            CommandName::SetProfile => {
                self.profiles.rebuild(&mut device).await?;
                None
            }
            CommandName::Query => return self.sync.refresh_locked(&mut device, true).await,
            CommandName::Discovery => return Err(ValidationError::ControllerCommand(name).into()),
        };

        let Some(change) = change else {
            return Ok(Vec::new());
        };
        device.apply(&change);
        let changes = vec![change];
        self.events
            .publish_changes(device_id, &changes, device.state());
        Ok(changes)
    }
}

/// Selects effect `index` on `device`.
///
/// Catalog-driven devices get the name at that 1-based position; an index
/// outside the catalog is rejected before the device is contacted. Devices
/// with numbered disco modes get the index as-is.
async fn select_effect<C: DeviceChannel>(device: &Device<C>, index: i32) -> Result<(), Error> {
    if device.capabilities().uses_effect_catalog() {
        let catalog = device.catalog();
        let name = catalog
            .and_then(|c| c.name(index))
            .ok_or(ValidationError::EffectOutOfRange {
                index,
                len: catalog.map_or(0, EffectCatalog::len),
            })?;
        device.channel().select_effect(name).await?;
        Ok(())
    } else if device.supports(Capability::DiscoMode) {
        device.channel().set_disco_mode(index).await?;
        Ok(())
    } else {
        Err(ValidationError::Unsupported {
            device: device.id().clone(),
            command: CommandName::SetEffect,
        }
        .into())
    }
}
