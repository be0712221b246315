// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registry of discovered devices.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::Error;
use crate::event::DeviceId;
use crate::types::DeviceAddress;

use super::Device;

/// A registered device behind its per-device lock.
pub type SharedDevice<C> = Arc<Mutex<Device<C>>>;

#[derive(Debug)]
struct Entry<C> {
    id: DeviceId,
    address: DeviceAddress,
    device: SharedDevice<C>,
}

/// Ordered set of registered devices.
///
/// Cloning yields another handle on the same registry. Iteration follows
/// insertion order, which is the order the synchronizer polls in.
///
/// # Examples
///
/// ```
/// use lightnode::{Capabilities, Device, DeviceRegistry};
/// use lightnode::event::DeviceId;
/// use lightnode::types::DeviceAddress;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> lightnode::Result<()> {
/// let registry = DeviceRegistry::new();
/// registry
///     .insert(Device::new(
///         DeviceId::new("milight1_zone1"),
///         "Zone1",
///         DeviceAddress::new("10.0.0.9"),
///         Capabilities::milight_zone(),
///         (),
///     ))
///     .await?;
///
/// assert_eq!(registry.len().await, 1);
/// assert!(registry.get(&DeviceId::new("milight1_zone1")).await.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceRegistry<C> {
    entries: Arc<RwLock<Vec<Entry<C>>>>,
}

impl<C> Clone for DeviceRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<C> Default for DeviceRegistry<C> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<C> DeviceRegistry<C> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device and returns its shared handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateDevice` if the id is already registered.
    pub async fn insert(&self, device: Device<C>) -> Result<SharedDevice<C>, Error> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.id == *device.id()) {
            return Err(Error::DuplicateDevice(device.id().clone()));
        }

        let id = device.id().clone();
        tracing::debug!(device_id = %id, address = %device.address(), "Registering device");
        let entry = Entry {
            id,
            address: device.address().clone(),
            device: Arc::new(Mutex::new(device)),
        };
        let shared = Arc::clone(&entry.device);
        entries.push(entry);
        Ok(shared)
    }

    /// Returns the device with `id`.
    pub async fn get(&self, id: &DeviceId) -> Option<SharedDevice<C>> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.id == *id)
            .map(|e| Arc::clone(&e.device))
    }

    /// Returns every device handle in registry order.
    ///
    /// The list lock is released before returning, so callers can await on
    /// the devices without blocking insertion.
    pub async fn snapshot(&self) -> Vec<SharedDevice<C>> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| Arc::clone(&e.device))
            .collect()
    }

    /// Returns every registered id in registry order.
    pub async fn ids(&self) -> Vec<DeviceId> {
        self.entries.read().await.iter().map(|e| e.id.clone()).collect()
    }

    /// Returns whether any device was built from `address`.
    pub async fn contains_address(&self, address: &DeviceAddress) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|e| e.address == *address)
    }

    /// Number of registered devices.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;

    fn device(id: &str, host: &str) -> Device<()> {
        Device::new(
            DeviceId::new(id),
            id,
            DeviceAddress::new(host),
            Capabilities::nanoleaf_panel(),
            (),
        )
    }

    #[tokio::test]
    async fn insert_preserves_order() {
        let registry = DeviceRegistry::new();
        registry.insert(device("aurora1", "10.0.0.5")).await.unwrap();
        registry.insert(device("aurora2", "10.0.0.6")).await.unwrap();

        assert_eq!(
            registry.ids().await,
            vec![DeviceId::new("aurora1"), DeviceId::new("aurora2")]
        );
        assert_eq!(registry.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let registry = DeviceRegistry::new();
        registry.insert(device("aurora1", "10.0.0.5")).await.unwrap();

        let err = registry
            .insert(device("aurora1", "10.0.0.6"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDevice(id) if id.as_str() == "aurora1"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn lookup_by_address_and_id() {
        let registry = DeviceRegistry::new();
        registry.insert(device("aurora1", "10.0.0.5")).await.unwrap();

        assert!(registry.contains_address(&DeviceAddress::new("10.0.0.5")).await);
        assert!(!registry.contains_address(&DeviceAddress::new("10.0.0.7")).await);
        assert!(registry.get(&DeviceId::new("missing")).await.is_none());
    }

    #[tokio::test]
    async fn shared_handle_sees_updates() {
        let registry = DeviceRegistry::new();
        let handle = registry.insert(device("aurora1", "10.0.0.5")).await.unwrap();
        handle
            .lock()
            .await
            .apply(&crate::state::StateChange::Brightness(10));

        let fetched = registry.get(&DeviceId::new("aurora1")).await.unwrap();
        assert_eq!(fetched.lock().await.state().brightness(), Some(10));
    }
}
