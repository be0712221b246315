// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Last-known state of a light.

use serde::{Deserialize, Serialize};

use crate::types::PowerState;

use super::StateChange;

/// Last-known observable state of one device.
///
/// Values are stored exactly as commanded or reported. Range checking is
/// left to the device layer, so a commanded brightness of 150 is kept as 150.
/// Fields stay `None` until first observed or commanded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    power: Option<PowerState>,
    brightness: Option<i32>,
    color: Option<i32>,
    saturation: Option<i32>,
    color_temperature: Option<i32>,
    /// 1-based effect index.
    effect: Option<i32>,
}

impl LightState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Power state.
    #[must_use]
    pub fn power(&self) -> Option<PowerState> {
        self.power
    }

    /// Brightness (nominally 0-100).
    #[must_use]
    pub fn brightness(&self) -> Option<i32> {
        self.brightness
    }

    /// Color (hue).
    #[must_use]
    pub fn color(&self) -> Option<i32> {
        self.color
    }

    /// Saturation.
    #[must_use]
    pub fn saturation(&self) -> Option<i32> {
        self.saturation
    }

    /// Color temperature.
    #[must_use]
    pub fn color_temperature(&self) -> Option<i32> {
        self.color_temperature
    }

    /// Active effect as a 1-based catalog index.
    #[must_use]
    pub fn effect(&self) -> Option<i32> {
        self.effect
    }

    /// Builder-style setter used when translating device reports.
    #[must_use]
    pub fn with_power(mut self, power: PowerState) -> Self {
        self.power = Some(power);
        self
    }

    /// Builder-style setter used when translating device reports.
    #[must_use]
    pub fn with_brightness(mut self, value: i32) -> Self {
        self.brightness = Some(value);
        self
    }

    /// Builder-style setter used when translating device reports.
    #[must_use]
    pub fn with_color(mut self, value: i32) -> Self {
        self.color = Some(value);
        self
    }

    /// Builder-style setter used when translating device reports.
    #[must_use]
    pub fn with_saturation(mut self, value: i32) -> Self {
        self.saturation = Some(value);
        self
    }

    /// Builder-style setter used when translating device reports.
    #[must_use]
    pub fn with_color_temperature(mut self, value: i32) -> Self {
        self.color_temperature = Some(value);
        self
    }

    /// Builder-style setter used when translating device reports.
    #[must_use]
    pub fn with_effect(mut self, index: i32) -> Self {
        self.effect = Some(index);
        self
    }

    /// Applies a change, returning `true` if the state actually changed.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        fn set<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
            if slot.as_ref() == Some(&value) {
                false
            } else {
                *slot = Some(value);
                true
            }
        }

        match change {
            StateChange::Power(state) => set(&mut self.power, *state),
            StateChange::Brightness(v) => set(&mut self.brightness, *v),
            StateChange::Color(v) => set(&mut self.color, *v),
            StateChange::Saturation(v) => set(&mut self.saturation, *v),
            StateChange::ColorTemperature(v) => set(&mut self.color_temperature, *v),
            StateChange::Effect(v) => set(&mut self.effect, *v),
        }
    }

    /// Lists every field that is set, as individual changes.
    #[must_use]
    pub fn to_changes(&self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        if let Some(power) = self.power {
            changes.push(StateChange::Power(power));
        }
        if let Some(v) = self.brightness {
            changes.push(StateChange::Brightness(v));
        }
        if let Some(v) = self.color {
            changes.push(StateChange::Color(v));
        }
        if let Some(v) = self.saturation {
            changes.push(StateChange::Saturation(v));
        }
        if let Some(v) = self.color_temperature {
            changes.push(StateChange::ColorTemperature(v));
        }
        if let Some(v) = self.effect {
            changes.push(StateChange::Effect(v));
        }
        changes
    }

    /// Merges an observed state into this one.
    ///
    /// Only fields present in `observed` are considered. Returns the changes
    /// to report: those that differ from the current value, or all observed
    /// fields when `force` is set.
    pub fn reconcile(&mut self, observed: &LightState, force: bool) -> Vec<StateChange> {
        observed
            .to_changes()
            .into_iter()
            .filter(|change| self.apply(change) || force)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_empty() {
        let state = LightState::new();
        assert!(state.power().is_none());
        assert!(state.brightness().is_none());
        assert!(state.to_changes().is_empty());
    }

    #[test]
    fn apply_reports_change_once() {
        let mut state = LightState::new();
        assert!(state.apply(&StateChange::Brightness(40)));
        assert!(!state.apply(&StateChange::Brightness(40)));
        assert!(state.apply(&StateChange::Brightness(41)));
        assert_eq!(state.brightness(), Some(41));
    }

    #[test]
    fn apply_keeps_out_of_range_values() {
        let mut state = LightState::new();
        state.apply(&StateChange::Brightness(150));
        assert_eq!(state.brightness(), Some(150));
    }

    #[test]
    fn reconcile_reports_only_differences() {
        let mut state = LightState::new()
            .with_power(PowerState::On)
            .with_brightness(50);
        let observed = LightState::new()
            .with_power(PowerState::On)
            .with_brightness(75)
            .with_effect(2);

        let changes = state.reconcile(&observed, false);
        assert_eq!(
            changes,
            vec![StateChange::Brightness(75), StateChange::Effect(2)]
        );
        assert_eq!(state.brightness(), Some(75));
    }

    #[test]
    fn reconcile_force_reports_everything_observed() {
        let mut state = LightState::new().with_power(PowerState::Off);
        let observed = LightState::new().with_power(PowerState::Off);

        assert!(state.reconcile(&observed, false).is_empty());
        assert_eq!(
            state.reconcile(&observed, true),
            vec![StateChange::Power(PowerState::Off)]
        );
    }

    #[test]
    fn reconcile_leaves_unobserved_fields() {
        let mut state = LightState::new().with_color(120);
        state.reconcile(&LightState::new().with_brightness(10), false);
        assert_eq!(state.color(), Some(120));
    }
}
