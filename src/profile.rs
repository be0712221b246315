// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability profile generation.
//!
//! The host renders the effect selector from two generated files under the
//! profile root:
//!
//! - `nls/en_us.txt`: the `nls/en_us.template` contents followed by one
//!   `EFFECT_SEL-<n> = <name>` line per catalog entry
//! - `editor/editors.xml`: the `editor/editors.template` contents followed by
//!   a `MEFFECT` editor whose range is `1-<N>`, closing the `<editors>` root
//!
//! After writing both files the host is asked to reload the profile.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{EffectCatalog, EffectCatalogCache};
use crate::channel::DeviceChannel;
use crate::config::ControllerSettings;
use crate::error::{Error, ProfileError};
use crate::registry::Device;

const NLS_TEMPLATE: &str = "nls/en_us.template";
const NLS_OUTPUT: &str = "nls/en_us.txt";
const EDITORS_TEMPLATE: &str = "editor/editors.template";
const EDITORS_OUTPUT: &str = "editor/editors.xml";

/// Host hook that reloads a generated profile.
pub trait ProfileInstaller: Send + Sync + std::fmt::Debug {
    /// Asks the host to pick up the profile under `root`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Install` if the host refuses the profile.
    fn install(&self, root: &Path) -> Result<(), ProfileError>;
}

/// Installer for hosts that pick up profile files on their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstaller;

impl ProfileInstaller for NoopInstaller {
    fn install(&self, root: &Path) -> Result<(), ProfileError> {
        tracing::info!(root = %root.display(), "Profile written; restart the admin console to see it");
        Ok(())
    }
}

/// Renders the language file for `catalog`.
///
/// # Examples
///
/// ```
/// use lightnode::{EffectCatalog, profile::render_nls};
///
/// let text = render_nls("ND-ctl-NAME = Nanoleaf", &EffectCatalog::from(["Flames"]));
/// assert_eq!(text, "ND-ctl-NAME = Nanoleaf\nEFFECT_SEL-1 = Flames\n");
/// ```
#[must_use]
pub fn render_nls(template: &str, catalog: &EffectCatalog) -> String {
    let mut out = String::with_capacity(template.len() + catalog.len() * 24);
    out.push_str(template);
    out.push('\n');
    for (index, name) in catalog.iter() {
        let _ = writeln!(out, "EFFECT_SEL-{index} = {name}");
    }
    out
}

/// Renders the editor file for `catalog`.
///
/// An empty catalog still yields the range `1-1`.
#[must_use]
pub fn render_editors(template: &str, catalog: &EffectCatalog) -> String {
    let upper = catalog.len().max(1);
    let mut out = String::with_capacity(template.len() + 128);
    out.push_str(template);
    out.push('\n');
    out.push_str("\t<editor id=\"MEFFECT\">\n");
    let _ = writeln!(
        out,
        "\t\t<range uom=\"25\" subset=\"1-{upper}\" nls=\"EFFECT_SEL\" />"
    );
    out.push_str("\t</editor>\n");
    out.push_str("</editors>");
    out
}

/// Writes the capability profile and hands it to the host.
#[derive(Debug, Clone)]
pub struct ProfileGenerator {
    root: PathBuf,
    installer: Arc<dyn ProfileInstaller>,
}

impl ProfileGenerator {
    /// Creates a generator writing under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, installer: Arc<dyn ProfileInstaller>) -> Self {
        Self {
            root: root.into(),
            installer,
        }
    }

    /// Returns the profile root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Regenerates both profile files from `catalog` and installs them.
    ///
    /// # Errors
    ///
    /// Returns error if a template is missing, an output cannot be written
    /// or the host refuses the profile.
    pub fn generate(&self, catalog: &EffectCatalog) -> Result<(), ProfileError> {
        self.render_file(NLS_TEMPLATE, NLS_OUTPUT, |t| render_nls(t, catalog))?;
        self.render_file(EDITORS_TEMPLATE, EDITORS_OUTPUT, |t| {
            render_editors(t, catalog)
        })?;

        tracing::info!(root = %self.root.display(), effects = catalog.len(), "Generated capability profile");
        self.installer.install(&self.root)
    }

    fn render_file(
        &self,
        template: &str,
        output: &str,
        render: impl FnOnce(&str) -> String,
    ) -> Result<(), ProfileError> {
        let template_path = self.root.join(template);
        let contents = fs::read_to_string(&template_path).map_err(|source| ProfileError::Io {
            path: template_path,
            source,
        })?;

        let output_path = self.root.join(output);
        fs::write(&output_path, render(contents.trim_end_matches('\n'))).map_err(|source| {
            ProfileError::Io {
                path: output_path,
                source,
            }
        })
    }
}

/// Keeps device effect catalogs, their cache and the generated profile in
/// step.
#[derive(Debug)]
pub struct ProfileManager {
    cache: EffectCatalogCache,
    generator: ProfileGenerator,
}

impl ProfileManager {
    /// Creates a manager from its parts.
    #[must_use]
    pub fn new(cache: EffectCatalogCache, generator: ProfileGenerator) -> Self {
        Self { cache, generator }
    }

    /// Creates a manager using the cache path and profile root of
    /// `settings`.
    #[must_use]
    pub fn from_settings(settings: &ControllerSettings, installer: Arc<dyn ProfileInstaller>) -> Self {
        Self::new(
            EffectCatalogCache::new(settings.effect_cache()),
            ProfileGenerator::new(settings.profile_root(), installer),
        )
    }

    /// Returns the catalog cache.
    #[must_use]
    pub fn cache(&self) -> &EffectCatalogCache {
        &self.cache
    }

    /// Loads the catalog of a newly registered device and renders the
    /// profile from it.
    ///
    /// The cached catalog is used when there is one; otherwise the device is
    /// asked. Devices without catalog-driven effects are left alone. Every
    /// failure is logged; a device without a catalog stays usable for
    /// everything but effect selection.
    pub async fn initialize<C: DeviceChannel>(&self, device: &mut Device<C>) {
        if !device.capabilities().uses_effect_catalog() {
            return;
        }

        let cached = self.cache.load(device.address()).unwrap_or_else(|e| {
            tracing::warn!(device_id = %device.id(), error = %e, "Ignoring effect cache");
            None
        });
        let catalog = match cached {
            Some(catalog) => catalog,
            None => match self.fetch(device).await {
                Ok(catalog) => catalog,
                Err(e) => {
                    tracing::warn!(device_id = %device.id(), error = %e, "Unable to get effect list");
                    return;
                }
            },
        };

        device.set_catalog(catalog.clone());
        if let Err(e) = self.generator.generate(&catalog) {
            tracing::error!(device_id = %device.id(), error = %e, "Error generating profile");
        }
    }

    /// Re-reads the catalog from the device, caches it and regenerates the
    /// profile.
    ///
    /// A cache write failure is logged and does not fail the rebuild.
    ///
    /// # Errors
    ///
    /// Returns `Error::Unreachable` if the device cannot be asked and
    /// `Error::Profile` if the profile cannot be generated.
    pub async fn rebuild<C: DeviceChannel>(
        &self,
        device: &mut Device<C>,
    ) -> Result<EffectCatalog, Error> {
        let catalog = self.fetch(device).await?;
        device.set_catalog(catalog.clone());
        self.generator.generate(&catalog)?;
        Ok(catalog)
    }

    async fn fetch<C: DeviceChannel>(&self, device: &Device<C>) -> Result<EffectCatalog, Error> {
        let catalog = EffectCatalog::new(device.channel().list_effects().await?);
        tracing::debug!(device_id = %device.id(), effects = catalog.len(), "Fetched effect list");

        if let Err(e) = self.cache.store(device.address(), &catalog) {
            tracing::error!(device_id = %device.id(), error = %e, "Unable to write effect cache");
        }
        Ok(catalog)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Installer that counts reloads and can be told to fail.
    #[derive(Debug, Default)]
    pub struct RecordingInstaller {
        installs: Mutex<usize>,
        fail: bool,
    }

    impl RecordingInstaller {
        pub fn failing() -> Self {
            Self {
                installs: Mutex::new(0),
                fail: true,
            }
        }

        pub fn installs(&self) -> usize {
            *self.installs.lock()
        }
    }

    impl ProfileInstaller for RecordingInstaller {
        fn install(&self, _root: &Path) -> Result<(), ProfileError> {
            if self.fail {
                return Err(ProfileError::Install("host rejected profile".to_string()));
            }
            *self.installs.lock() += 1;
            Ok(())
        }
    }

    /// Creates a profile root with both templates.
    pub fn profile_root(dir: &Path) -> PathBuf {
        let root = dir.join("profile");
        fs::create_dir_all(root.join("nls")).unwrap();
        fs::create_dir_all(root.join("editor")).unwrap();
        fs::write(root.join(NLS_TEMPLATE), "ND-ctl-NAME = Controller\n").unwrap();
        fs::write(root.join(EDITORS_TEMPLATE), "<editors>\n").unwrap();
        root
    }
}
