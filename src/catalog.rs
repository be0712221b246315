// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Effect catalogs and their on-disk cache.
//!
//! Commands and reported state address effects by 1-based position in the
//! catalog a device returned. Catalogs are cached in one JSON file keyed by
//! device host so a restart does not have to re-query every device.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::types::DeviceAddress;

/// Ordered effect names with 1-based addressing.
///
/// # Examples
///
/// ```
/// use lightnode::EffectCatalog;
///
/// let catalog = EffectCatalog::from(["Flames", "Forest", "Nemo"]);
/// assert_eq!(catalog.name(2), Some("Forest"));
/// assert_eq!(catalog.index_of("Nemo"), Some(3));
/// assert_eq!(catalog.name(0), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectCatalog(Vec<String>);

impl EffectCatalog {
    /// Creates a catalog from names in device order.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    /// Returns the name at 1-based `index`, if any.
    #[must_use]
    pub fn name(&self, index: i32) -> Option<&str> {
        let position = usize::try_from(index).ok()?.checked_sub(1)?;
        self.0.get(position).map(String::as_str)
    }

    /// Returns the 1-based index of `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<i32> {
        let position = self.0.iter().position(|n| n == name)?;
        i32::try_from(position + 1).ok()
    }

    /// Number of effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the device offers no effects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(index, name)` pairs starting at 1.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map(|(i, name)| (i + 1, name.as_str()))
    }

    /// Returns the names in order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for EffectCatalog {
    fn from(names: [S; N]) -> Self {
        Self(names.into_iter().map(Into::into).collect())
    }
}

/// JSON file cache of effect catalogs keyed by device host.
#[derive(Debug)]
pub struct EffectCatalogCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl EffectCatalogCache {
    /// Creates a cache backed by the file at `path`. The file is created on
    /// the first store.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the cache file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the cached catalog for `address`.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or decoded.
    pub fn load(&self, address: &DeviceAddress) -> Result<Option<EffectCatalog>, CacheError> {
        Ok(self.read_all()?.remove(address.host()))
    }

    /// Replaces the cached catalog for `address`, keeping other entries.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn store(&self, address: &DeviceAddress, catalog: &EffectCatalog) -> Result<(), CacheError> {
        let _guard = self.write_lock.lock();

        let mut all = self.read_all().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Discarding unreadable effect cache");
            BTreeMap::new()
        });
        all.insert(address.host().to_string(), catalog.clone());

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let json = serde_json::to_string_pretty(&all)?;
        fs::write(&self.path, json).map_err(|source| self.io_error(source))?;

        tracing::debug!(%address, effects = catalog.len(), "Stored effect catalog");
        Ok(())
    }

    fn read_all(&self) -> Result<BTreeMap<String, EffectCatalog>, CacheError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_one_based() {
        let catalog = EffectCatalog::from(["A", "B", "C"]);
        assert_eq!(catalog.name(1), Some("A"));
        assert_eq!(catalog.name(3), Some("C"));
        assert_eq!(catalog.name(4), None);
        assert_eq!(catalog.name(0), None);
        assert_eq!(catalog.name(-1), None);
        assert_eq!(catalog.index_of("B"), Some(2));
        assert_eq!(catalog.index_of("Z"), None);
    }

    #[test]
    fn iter_yields_positions() {
        let catalog = EffectCatalog::from(["Flames", "Forest"]);
        assert_eq!(
            catalog.iter().collect::<Vec<_>>(),
            vec![(1, "Flames"), (2, "Forest")]
        );
    }

    #[test]
    fn cache_miss_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EffectCatalogCache::new(dir.path().join(".effectLists.json"));
        assert_eq!(cache.load(&DeviceAddress::new("10.0.0.5")).unwrap(), None);
    }

    #[test]
    fn cache_keeps_entries_per_address() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EffectCatalogCache::new(dir.path().join("nested").join("effects.json"));
        let first = DeviceAddress::new("10.0.0.5");
        let second = DeviceAddress::with_port("10.0.0.6", 16021);

        cache.store(&first, &EffectCatalog::from(["Flames"])).unwrap();
        cache
            .store(&second, &EffectCatalog::from(["Nemo", "Forest"]))
            .unwrap();

        assert_eq!(
            cache.load(&first).unwrap(),
            Some(EffectCatalog::from(["Flames"]))
        );
        assert_eq!(cache.load(&second).unwrap().unwrap().len(), 2);
        assert_eq!(
            cache.load(&DeviceAddress::new("10.0.0.6")).unwrap().unwrap().len(),
            2
        );
    }

    #[test]
    fn corrupt_cache_is_an_error_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("effects.json");
        fs::write(&path, "not json").unwrap();

        let cache = EffectCatalogCache::new(&path);
        assert!(matches!(
            cache.load(&DeviceAddress::new("10.0.0.5")),
            Err(CacheError::Json(_))
        ));

        cache
            .store(&DeviceAddress::new("10.0.0.5"), &EffectCatalog::from(["A"]))
            .unwrap();
        assert!(cache.load(&DeviceAddress::new("10.0.0.5")).unwrap().is_some());
    }
}
