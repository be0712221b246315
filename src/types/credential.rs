// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device authentication tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// An authentication token granted by a device during pairing.
///
/// The format is family specific and opaque to this crate. Tokens are kept
/// in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wraps a token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses a comma-separated token list, keeping positional order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::EmptyEntry` if any entry is blank.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ConfigError> {
        Ok(super::split_list(list)?
            .into_iter()
            .map(Self::new)
            .collect())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
