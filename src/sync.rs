// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic state synchronization.
//!
//! Devices offer no push notifications, so drift caused by a wall switch or
//! the vendor app is only noticed by polling. On each short tick every
//! poll-eligible device is queried in registry order and the fields that
//! changed are reported. A failed query leaves the cached state alone and
//! is not retried until the next tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::capabilities::Capability;
use crate::channel::DeviceChannel;
use crate::discovery::DiscoveryActivity;
use crate::error::{Error, ValidationError};
use crate::event::{DeviceEvent, EventBus};
use crate::registry::{Device, DeviceRegistry, SharedDevice};
use crate::state::StateChange;

/// What one short tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// The tick was skipped because discovery was running.
    pub skipped: bool,
    /// Devices queried.
    pub queried: usize,
    /// Queries that failed.
    pub failed: usize,
    /// Changes reported.
    pub changes: usize,
}

/// Value of the long-tick heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat(bool);

impl Heartbeat {
    /// Returns the heartbeat bit.
    #[must_use]
    pub const fn state(self) -> bool {
        self.0
    }
}

/// Polls devices and mirrors their state onto the event bus.
#[derive(Debug)]
pub struct StateSynchronizer<C> {
    registry: DeviceRegistry<C>,
    events: EventBus,
    discovery: DiscoveryActivity,
    heartbeat: Arc<AtomicBool>,
}

impl<C> Clone for StateSynchronizer<C> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            events: self.events.clone(),
            discovery: self.discovery.clone(),
            heartbeat: Arc::clone(&self.heartbeat),
        }
    }
}

impl<C: DeviceChannel> StateSynchronizer<C> {
    /// Creates a synchronizer over `registry` that stands down while
    /// `discovery` is active.
    #[must_use]
    pub fn new(registry: DeviceRegistry<C>, events: EventBus, discovery: DiscoveryActivity) -> Self {
        Self {
            registry,
            events,
            discovery,
            heartbeat: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queries every poll-eligible device once.
    ///
    /// Performs no query at all while discovery is running.
    pub async fn short_tick(&self) -> SyncReport {
        if self.discovery.is_active() {
            tracing::debug!("Discovery in progress, skipping poll");
            return SyncReport {
                skipped: true,
                ..SyncReport::default()
            };
        }

        let mut report = SyncReport::default();
        for shared in self.registry.snapshot().await {
            let mut device = shared.lock().await;
            if !device.is_pollable() {
                continue;
            }

            report.queried += 1;
            match self.query(&mut device, false).await {
                Ok(changes) => report.changes += changes.len(),
                Err(e) => {
                    tracing::warn!(device_id = %device.id(), error = %e, "Error updating device state");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Re-reads one device and reports its state.
    ///
    /// With `force`, every observed field is reported even when unchanged.
    /// A device that cannot be queried re-reports its cached state when
    /// forced and does nothing otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Unauthenticated` for an unpaired device and
    /// `Error::Unreachable` if the query fails.
    pub async fn refresh(
        &self,
        device: &SharedDevice<C>,
        force: bool,
    ) -> Result<Vec<StateChange>, Error> {
        let mut device = device.lock().await;
        self.refresh_locked(&mut device, force).await
    }

    /// [`refresh`](Self::refresh) for a device whose lock is already held.
    pub(crate) async fn refresh_locked(
        &self,
        device: &mut Device<C>,
        force: bool,
    ) -> Result<Vec<StateChange>, Error> {
        if !device.is_authorized() {
            return Err(ValidationError::Unauthenticated(device.id().clone()).into());
        }

        if !device.supports(Capability::Query) {
            if !force {
                return Ok(Vec::new());
            }
            let changes = device.state().to_changes();
            self.events
                .publish_changes(device.id(), &changes, device.state());
            return Ok(changes);
        }

        self.query(device, force).await
    }

    /// Flips the heartbeat and publishes the new value.
    ///
    /// The heartbeat only shows that the controller is alive; it says
    /// nothing about device health.
    pub fn long_tick(&self) -> Heartbeat {
        let state = !self.heartbeat.fetch_xor(true, Ordering::AcqRel);
        self.events.publish(DeviceEvent::Heartbeat { state });
        Heartbeat(state)
    }

    async fn query(&self, device: &mut Device<C>, force: bool) -> Result<Vec<StateChange>, Error> {
        let native = device.channel().query_state().await?;
        let observed = native.to_light_state(device.catalog());

        let changes = device.reconcile(&observed, force);
        self.events
            .publish_changes(device.id(), &changes, device.state());
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;
    use crate::catalog::EffectCatalog;
    use crate::channel::NativeState;
    use crate::channel::fake::FakeChannel;
    use crate::event::DeviceId;
    use crate::types::{Credential, DeviceAddress, PowerState};

    fn panel(id: &str, channel: FakeChannel) -> Device<FakeChannel> {
        let mut device = Device::new(
            DeviceId::new(id),
            id,
            DeviceAddress::new("10.0.0.5"),
            Capabilities::nanoleaf_panel(),
            channel,
        )
        .requiring_credential()
        .with_credential(Credential::new("abc"));
        device.set_catalog(EffectCatalog::from(["Flames", "Forest"]));
        device
    }

    fn synchronizer() -> (StateSynchronizer<FakeChannel>, DiscoveryActivity) {
        let activity = DiscoveryActivity::default();
        let sync = StateSynchronizer::new(DeviceRegistry::new(), EventBus::new(), activity.clone());
        (sync, activity)
    }

    fn observed(on: bool, brightness: i32, effect: &str) -> NativeState {
        NativeState {
            on: Some(on),
            brightness: Some(brightness),
            effect: Some(effect.to_string()),
            ..NativeState::default()
        }
    }

    #[tokio::test]
    async fn tick_reports_only_changes() {
        let (sync, _) = synchronizer();
        let channel = FakeChannel::new();
        channel.push_state(observed(true, 40, "Forest"));
        channel.push_state(observed(true, 60, "Forest"));
        sync.registry.insert(panel("aurora1", channel.clone())).await.unwrap();
        let mut events = sync.events.subscribe();

        let first = sync.short_tick().await;
        assert_eq!(first.queried, 1);
        assert_eq!(first.changes, 3);

        let second = sync.short_tick().await;
        assert_eq!(second.changes, 1);

        let mut reported = Vec::new();
        while let Ok(DeviceEvent::StateChanged { change, .. }) = events.try_recv() {
            reported.push(change);
        }
        assert_eq!(
            reported,
            vec![
                StateChange::Power(PowerState::On),
                StateChange::Brightness(40),
                StateChange::Effect(2),
                StateChange::Brightness(60),
            ]
        );
    }

    #[tokio::test]
    async fn tick_is_skipped_during_discovery() {
        let (sync, activity) = synchronizer();
        let channel = FakeChannel::new();
        sync.registry.insert(panel("aurora1", channel.clone())).await.unwrap();

        let _guard = activity.begin().unwrap();
        let report = sync.short_tick().await;

        assert!(report.skipped);
        assert_eq!(report.queried, 0);
        assert_eq!(channel.query_count(), 0);
    }

    #[tokio::test]
    async fn failed_query_keeps_state_and_moves_on() {
        let (sync, _) = synchronizer();
        let broken = FakeChannel::new();
        broken.push_query_failure();
        let healthy = FakeChannel::new();
        healthy.push_state(observed(false, 5, "Flames"));

        let first = sync.registry.insert(panel("aurora1", broken)).await.unwrap();
        first.lock().await.apply(&StateChange::Brightness(77));
        sync.registry.insert(panel("aurora2", healthy)).await.unwrap();

        let report = sync.short_tick().await;
        assert_eq!(report.queried, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(first.lock().await.state().brightness(), Some(77));
        assert_eq!(sync.registry.len().await, 2);
    }

    #[tokio::test]
    async fn unpaired_and_unqueryable_devices_are_not_polled() {
        let (sync, _) = synchronizer();
        let unpaired = FakeChannel::new();
        sync.registry
            .insert(
                Device::new(
                    DeviceId::new("aurora1"),
                    "Aurora1",
                    DeviceAddress::new("10.0.0.5"),
                    Capabilities::nanoleaf_panel(),
                    unpaired.clone(),
                )
                .requiring_credential(),
            )
            .await
            .unwrap();
        let zone = FakeChannel::new();
        sync.registry
            .insert(Device::new(
                DeviceId::new("milight1_zone1"),
                "Zone1",
                DeviceAddress::new("10.0.0.9"),
                Capabilities::milight_zone(),
                zone.clone(),
            ))
            .await
            .unwrap();

        let report = sync.short_tick().await;
        assert_eq!(report.queried, 0);
        assert_eq!(unpaired.query_count() + zone.query_count(), 0);
    }

    #[tokio::test]
    async fn forced_refresh_reports_unchanged_fields() {
        let (sync, _) = synchronizer();
        let channel = FakeChannel::new();
        channel.push_state(observed(true, 40, "Flames"));
        channel.push_state(observed(true, 40, "Flames"));
        let shared = sync.registry.insert(panel("aurora1", channel)).await.unwrap();

        assert_eq!(sync.refresh(&shared, false).await.unwrap().len(), 3);
        assert_eq!(sync.refresh(&shared, true).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn forced_refresh_of_unqueryable_device_reports_cache() {
        let (sync, _) = synchronizer();
        let channel = FakeChannel::new();
        let shared = sync
            .registry
            .insert(Device::new(
                DeviceId::new("milight1_zone2"),
                "Zone2",
                DeviceAddress::new("10.0.0.9"),
                Capabilities::milight_zone(),
                channel.clone(),
            ))
            .await
            .unwrap();
        shared.lock().await.apply(&StateChange::Brightness(30));

        assert!(sync.refresh(&shared, false).await.unwrap().is_empty());
        assert_eq!(
            sync.refresh(&shared, true).await.unwrap(),
            vec![StateChange::Brightness(30)]
        );
        assert_eq!(channel.query_count(), 0);
    }

    #[tokio::test]
    async fn unpaired_refresh_is_rejected() {
        let (sync, _) = synchronizer();
        let shared = sync
            .registry
            .insert(
                Device::new(
                    DeviceId::new("aurora1"),
                    "Aurora1",
                    DeviceAddress::new("10.0.0.5"),
                    Capabilities::nanoleaf_panel(),
                    FakeChannel::new(),
                )
                .requiring_credential(),
            )
            .await
            .unwrap();

        let err = sync.refresh(&shared, true).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::Unauthenticated(_))
        ));
    }

    #[test]
    fn heartbeat_alternates() {
        let (sync, _) = synchronizer();
        let mut rx = sync.events.subscribe();

        assert!(sync.long_tick().state());
        assert!(!sync.long_tick().state());
        assert!(sync.long_tick().state());

        assert!(matches!(
            rx.try_recv().unwrap(),
            DeviceEvent::Heartbeat { state: true }
        ));
    }
}
