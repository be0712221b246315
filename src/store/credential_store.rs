// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Token persistence and the credential merge policy.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::StoreError;
use crate::types::{Credential, DeviceAddress};

use super::KeyValueStore;

/// Key under which all tokens are stored.
const TOKENS_KEY: &str = "tokens";

/// Persists per-address tokens in the host's key/value store.
///
/// All tokens live under one fixed key as a JSON object mapping each
/// device's host to its token. The port is not part of the key, so a token
/// survives a change of the configured port.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use lightnode::store::{CredentialStore, MemoryStore};
/// use lightnode::types::{Credential, DeviceAddress};
///
/// let store = CredentialStore::new(Arc::new(MemoryStore::new()));
/// let addr = DeviceAddress::new("10.0.0.5");
///
/// store.save(&addr, &Credential::new("abc")).unwrap();
/// assert_eq!(store.load(&addr), Some(Credential::new("abc")));
/// ```
#[derive(Debug, Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Creates a credential store over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Loads the token persisted for `address`.
    ///
    /// Unreadable or malformed data is logged and treated as absent, which
    /// leaves the device unpaired rather than failing startup.
    #[must_use]
    pub fn load(&self, address: &DeviceAddress) -> Option<Credential> {
        match self.load_all() {
            Ok(mut tokens) => tokens.remove(address.host()),
            Err(e) => {
                tracing::warn!(%address, error = %e, "Failed to read persisted tokens");
                None
            }
        }
    }

    /// Persists `credential` for `address`, keeping other addresses' tokens.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read or written.
    pub fn save(&self, address: &DeviceAddress, credential: &Credential) -> Result<(), StoreError> {
        let mut tokens = self.load_all()?;
        tokens.insert(address.host().to_string(), credential.clone());
        self.backend
            .set(TOKENS_KEY, serde_json::to_value(&tokens)?)?;

        tracing::debug!(%address, "Saved access credentials");
        Ok(())
    }

    /// Applies the merge policy for one address.
    ///
    /// An explicitly configured credential always wins; otherwise the
    /// persisted one is used; otherwise the address is unpaired.
    #[must_use]
    pub fn resolve(
        &self,
        address: &DeviceAddress,
        configured: Option<&Credential>,
    ) -> Option<Credential> {
        configured.cloned().or_else(|| self.load(address))
    }

    fn load_all(&self) -> Result<BTreeMap<String, Credential>, StoreError> {
        match self.backend.get(TOKENS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn store() -> (Arc<MemoryStore>, CredentialStore) {
        let backend = Arc::new(MemoryStore::new());
        let store = CredentialStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn save_then_load_round_trip() {
        let (_, store) = store();
        let addr = DeviceAddress::new("10.0.0.5");

        store.save(&addr, &Credential::new("abc")).unwrap();
        assert_eq!(store.load(&addr), Some(Credential::new("abc")));
    }

    #[test]
    fn load_unknown_address_is_absent() {
        let (_, store) = store();
        store
            .save(&DeviceAddress::new("10.0.0.5"), &Credential::new("abc"))
            .unwrap();
        assert_eq!(store.load(&DeviceAddress::new("10.0.0.6")), None);
    }

    #[test]
    fn save_keeps_other_addresses() {
        let (backend, store) = store();
        store
            .save(&DeviceAddress::new("a"), &Credential::new("1"))
            .unwrap();
        store
            .save(&DeviceAddress::new("b"), &Credential::new("2"))
            .unwrap();

        assert_eq!(
            backend.get(TOKENS_KEY).unwrap(),
            Some(json!({"a": "1", "b": "2"}))
        );
    }

    #[test]
    fn token_is_keyed_by_host_only() {
        let (backend, store) = store();
        store
            .save(&DeviceAddress::new("10.0.0.5"), &Credential::new("abc"))
            .unwrap();

        assert_eq!(
            store.load(&DeviceAddress::with_port("10.0.0.5", 16021)),
            Some(Credential::new("abc"))
        );
        assert_eq!(
            backend.get(TOKENS_KEY).unwrap(),
            Some(json!({"10.0.0.5": "abc"}))
        );
    }

    #[test]
    fn configured_credential_wins() {
        let (_, store) = store();
        let addr = DeviceAddress::new("a");
        store.save(&addr, &Credential::new("persisted")).unwrap();

        let configured = Credential::new("configured");
        assert_eq!(store.resolve(&addr, Some(&configured)), Some(configured));
        assert_eq!(
            store.resolve(&addr, None),
            Some(Credential::new("persisted"))
        );
        assert_eq!(store.resolve(&DeviceAddress::new("b"), None), None);
    }

    #[test]
    fn malformed_data_loads_as_absent() {
        let (backend, store) = store();
        backend.set(TOKENS_KEY, json!(["not", "a", "map"])).unwrap();

        assert_eq!(store.load(&DeviceAddress::new("a")), None);
        assert!(
            store
                .save(&DeviceAddress::new("a"), &Credential::new("1"))
                .is_err()
        );
    }
}
