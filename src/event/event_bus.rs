// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast bus carrying controller events to the host adapter.

use tokio::sync::broadcast;

use crate::state::{LightState, StateChange};

use super::{DeviceEvent, DeviceId};

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Event bus for broadcasting controller events to any number of subscribers.
///
/// A slow subscriber that lets the buffer fill up loses the oldest events
/// and receives `RecvError::Lagged`. Publishing never blocks the poll loop.
///
/// # Examples
///
/// ```
/// use lightnode::event::{DeviceEvent, EventBus};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
/// bus.publish(DeviceEvent::Heartbeat { state: true });
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus buffering up to `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to all subscribers.
    ///
    /// Without subscribers the event is dropped.
    pub fn publish(&self, event: DeviceEvent) {
        // No subscribers is not an error for the publisher
        let _ = self.sender.send(event);
    }

    /// Publishes one `StateChanged` event per change, each carrying `state`.
    pub fn publish_changes(&self, device_id: &DeviceId, changes: &[StateChange], state: &LightState) {
        for change in changes {
            tracing::debug!(%device_id, driver = change.driver(), value = change.driver_value(), "Reporting state");
            self.publish(DeviceEvent::state_changed(
                device_id.clone(),
                change.clone(),
                state.clone(),
            ));
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_delivers_to_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DeviceEvent::StatusChanged { online: true });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            DeviceEvent::StatusChanged { online: true }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            DeviceEvent::StatusChanged { online: true }
        ));
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::with_capacity(4);
        bus.publish(DeviceEvent::Heartbeat { state: false });
    }

    #[tokio::test]
    async fn publish_changes_emits_one_event_per_change() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let state = LightState::new().with_brightness(10).with_effect(2);

        bus.publish_changes(
            &DeviceId::new("aurora1"),
            &[StateChange::Brightness(10), StateChange::Effect(2)],
            &state,
        );

        for expected in [StateChange::Brightness(10), StateChange::Effect(2)] {
            match rx.recv().await.unwrap() {
                DeviceEvent::StateChanged { change, new_state, .. } => {
                    assert_eq!(change, expected);
                    assert_eq!(new_state, state);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
