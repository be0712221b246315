// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Token acquisition.
//!
//! Some devices only grant a token while they are in linking mode, which the
//! operator enables by hand. The negotiator therefore makes exactly one
//! bounded request per address and fails fast instead of waiting for the
//! button press.

use std::sync::Arc;
use std::time::Duration;

use crate::error::PairingError;
use crate::family::DeviceFamily;
use crate::store::CredentialStore;
use crate::types::{Credential, DeviceAddress};

/// Requests tokens from devices and persists the ones it gets.
#[derive(Debug)]
pub struct PairingNegotiator<F> {
    family: Arc<F>,
    store: CredentialStore,
    timeout: Duration,
}

impl<F: DeviceFamily> PairingNegotiator<F> {
    /// Default bound on one token request.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a negotiator that saves tokens to `store`.
    #[must_use]
    pub fn new(family: Arc<F>, store: CredentialStore) -> Self {
        Self {
            family,
            store,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the bound on one token request.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Makes one token request to `address`.
    ///
    /// A granted token is saved unconditionally. A failed save is logged
    /// and the token is still returned.
    ///
    /// # Errors
    ///
    /// - `PairingError::NoToken` if the device answered without a token
    /// - `PairingError::TimedOut` if it did not answer in time
    /// - `PairingError::Channel` if the request failed
    pub async fn pair(&self, address: &DeviceAddress) -> Result<Credential, PairingError> {
        tracing::info!(family = self.family.name(), %address, "Requesting token");

        let credential =
            match tokio::time::timeout(self.timeout, self.family.request_token(address)).await {
                Ok(Ok(Some(credential))) => credential,
                Ok(Ok(None)) => {
                    return Err(PairingError::NoToken {
                        address: address.to_string(),
                    });
                }
                Ok(Err(source)) => {
                    return Err(PairingError::Channel {
                        address: address.to_string(),
                        source,
                    });
                }
                Err(_) => {
                    return Err(PairingError::TimedOut {
                        address: address.to_string(),
                        millis: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            };

        if let Err(e) = self.store.save(address, &credential) {
            tracing::error!(%address, error = %e, "Failed to persist token");
        }
        tracing::info!(%address, "Paired");
        Ok(credential)
    }
}
