// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by every device family.
//!
//! # Types
//!
//! - [`DeviceAddress`] - Network locator of a physical unit (host, optional port)
//! - [`Credential`] - Authentication token bound to one address
//! - [`PowerState`] - On/Off state of a light

mod address;
mod credential;
mod power;

pub use address::DeviceAddress;
pub use credential::Credential;
pub use power::PowerState;

use crate::error::ConfigError;

/// Splits a comma-separated parameter into trimmed, non-empty entries.
///
/// # Errors
///
/// Returns `ConfigError::EmptyEntry` if any entry is blank.
pub(crate) fn split_list(list: &str) -> Result<Vec<&str>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .enumerate()
        .map(|(position, entry)| {
            if entry.is_empty() {
                Err(ConfigError::EmptyEntry {
                    list: list.to_string(),
                    position,
                })
            } else {
                Ok(entry)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_entries() {
        assert_eq!(
            split_list("10.0.0.5, 10.0.0.6 ").unwrap(),
            vec!["10.0.0.5", "10.0.0.6"]
        );
    }

    #[test]
    fn split_list_rejects_blank_entry() {
        let err = split_list("10.0.0.5,,10.0.0.7").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyEntry { position: 1, .. }));
    }
}
