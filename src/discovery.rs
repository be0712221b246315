// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery of configured devices.
//!
//! Hosts are configured, not scanned for. A discovery pass turns the
//! configured address list into registered devices:
//!
//! 1. If a token list is given it must pair up one-to-one with the
//!    addresses; otherwise the pass fails and registers nothing.
//! 2. After a short settling delay, each address is resolved to a token:
//!    forced pairing, then the configured token, then the persisted one,
//!    then pairing. Families that need no token skip this step.
//! 3. Each resolved address is indexed by its 1-based position in the
//!    configured list, so ids do not depend on whether other addresses
//!    paired. If that index is already taken the next free one is used. The
//!    family builds the device(s), which are registered, announced, given
//!    their effect catalog and profile, and refreshed once.
//!
//! Addresses that fail to pair are skipped without affecting the others.
//! Only one pass runs at a time per controller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::config::IntegrationConfig;
use crate::error::{ChannelError, ConfigError, Error, PairingError};
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::family::DeviceFamily;
use crate::pairing::PairingNegotiator;
use crate::profile::ProfileManager;
use crate::registry::{Device, DeviceRegistry};
use crate::store::CredentialStore;
use crate::sync::StateSynchronizer;
use crate::types::{Credential, DeviceAddress};

/// What a discovery pass should resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryRequest {
    addresses: Vec<DeviceAddress>,
    tokens: Option<Vec<Credential>>,
    force_pairing: bool,
}

impl DiscoveryRequest {
    /// Creates a request for `addresses` with no tokens.
    #[must_use]
    pub fn new(addresses: Vec<DeviceAddress>) -> Self {
        Self {
            addresses,
            tokens: None,
            force_pairing: false,
        }
    }

    /// Supplies tokens, paired with the addresses by position.
    #[must_use]
    pub fn with_tokens(mut self, tokens: Vec<Credential>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Requests new tokens even when some are known.
    #[must_use]
    pub fn with_force_pairing(mut self, force: bool) -> Self {
        self.force_pairing = force;
        self
    }

    /// Returns the addresses.
    #[must_use]
    pub fn addresses(&self) -> &[DeviceAddress] {
        &self.addresses
    }

    /// Returns the configured tokens.
    #[must_use]
    pub fn tokens(&self) -> Option<&[Credential]> {
        self.tokens.as_deref()
    }

    /// Returns whether pairing is forced.
    #[must_use]
    pub fn force_pairing(&self) -> bool {
        self.force_pairing
    }
}

impl From<&IntegrationConfig> for DiscoveryRequest {
    fn from(config: &IntegrationConfig) -> Self {
        Self {
            addresses: config.addresses().to_vec(),
            tokens: config.tokens().map(<[Credential]>::to_vec),
            force_pairing: config.request_new_token(),
        }
    }
}

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Ids of the devices registered, in registration order.
    pub registered: Vec<DeviceId>,
    /// Addresses skipped because they were already registered.
    pub skipped: Vec<DeviceAddress>,
    /// Addresses that could not be paired.
    pub failed: Vec<PairingError>,
}

/// Whether [`DiscoveryOrchestrator::start`] launched a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStart {
    /// A new pass was spawned.
    Started,
    /// A pass was already running; nothing was started.
    AlreadyRunning,
}

/// Shared "discovery in progress" flag.
///
/// Cloned into the synchronizer so it can stand down while devices are
/// being registered.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryActivity(Arc<AtomicBool>);

impl DiscoveryActivity {
    /// Returns whether a pass is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Marks a pass as running, or returns `None` if one already is.
    pub(crate) fn begin(&self) -> Option<ActiveGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveGuard(Arc::clone(&self.0)))
    }
}

/// Clears the activity flag when dropped, including on panic.
#[derive(Debug)]
pub(crate) struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Pass<F: DeviceFamily> {
    family: Arc<F>,
    registry: DeviceRegistry<F::Channel>,
    store: CredentialStore,
    negotiator: PairingNegotiator<F>,
    profiles: Arc<ProfileManager>,
    sync: StateSynchronizer<F::Channel>,
    events: EventBus,
    delay: Duration,
}

/// Runs discovery passes, at most one at a time.
pub struct DiscoveryOrchestrator<F: DeviceFamily> {
    pass: Arc<Pass<F>>,
    activity: DiscoveryActivity,
    task: Mutex<Option<JoinHandle<Result<DiscoveryReport, Error>>>>,
}

impl<F: DeviceFamily> std::fmt::Debug for DiscoveryOrchestrator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryOrchestrator")
            .field("family", &self.pass.family.name())
            .field("active", &self.activity.is_active())
            .finish_non_exhaustive()
    }
}

impl<F: DeviceFamily> DiscoveryOrchestrator<F> {
    /// Default settling delay before a pass starts resolving addresses.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// Creates an orchestrator.
    ///
    /// `sync` provides the initial refresh of each new device and must share
    /// `activity` so that it skips polling while a pass runs.
    #[must_use]
    pub fn new(
        family: Arc<F>,
        registry: DeviceRegistry<F::Channel>,
        store: CredentialStore,
        profiles: Arc<ProfileManager>,
        sync: StateSynchronizer<F::Channel>,
        events: EventBus,
        activity: DiscoveryActivity,
    ) -> Self {
        let negotiator = PairingNegotiator::new(Arc::clone(&family), store.clone());
        Self {
            pass: Arc::new(Pass {
                family,
                registry,
                store,
                negotiator,
                profiles,
                sync,
                events,
                delay: Self::DEFAULT_DELAY,
            }),
            activity,
            task: Mutex::new(None),
        }
    }

    /// Sets the settling delay and the pairing timeout.
    ///
    /// Must be called before the first pass.
    #[must_use]
    pub fn with_timing(mut self, delay: Duration, pairing_timeout: Duration) -> Self {
        if let Some(pass) = Arc::get_mut(&mut self.pass) {
            pass.delay = delay;
            pass.negotiator = PairingNegotiator::new(Arc::clone(&pass.family), pass.store.clone())
                .with_timeout(pairing_timeout);
        }
        self
    }

    /// Returns the shared activity flag.
    #[must_use]
    pub fn activity(&self) -> &DiscoveryActivity {
        &self.activity
    }

    /// Returns whether a pass is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.activity.is_active()
    }

    /// Spawns a background pass unless one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, request: DiscoveryRequest) -> DiscoveryStart {
        let Some(guard) = self.activity.begin() else {
            tracing::info!("Discovery already running, request ignored");
            return DiscoveryStart::AlreadyRunning;
        };

        let pass = Arc::clone(&self.pass);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            pass.run(request).await
        });
        *self.task.lock() = Some(handle);
        DiscoveryStart::Started
    }

    /// Waits for the pass launched by [`start`](Self::start).
    ///
    /// Returns `None` if no pass was started since the last wait, or if the
    /// pass panicked.
    pub async fn wait(&self) -> Option<Result<DiscoveryReport, Error>> {
        let handle = self.task.lock().take()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::error!(error = %e, "Discovery task failed");
                None
            }
        }
    }

    /// Runs a pass on the current task.
    ///
    /// # Errors
    ///
    /// - `Error::DiscoveryInProgress` if a pass is already running
    /// - `Error::Config` if the token list does not match the addresses
    pub async fn discover(&self, request: DiscoveryRequest) -> Result<DiscoveryReport, Error> {
        let _guard = self.activity.begin().ok_or(Error::DiscoveryInProgress)?;
        self.pass.run(request).await
    }
}

impl<F: DeviceFamily> Pass<F> {
    async fn run(&self, request: DiscoveryRequest) -> Result<DiscoveryReport, Error> {
        let DiscoveryRequest {
            addresses,
            tokens,
            force_pairing,
        } = request;

        if let Some(tokens) = &tokens
            && tokens.len() != addresses.len()
        {
            let err = ConfigError::AddressTokenMismatch {
                addresses: addresses.len(),
                tokens: tokens.len(),
            };
            tracing::error!(error = %err, "Discovery aborted");
            return Err(err.into());
        }

        tracing::info!(family = self.family.name(), addresses = addresses.len(), "Starting discovery");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut report = DiscoveryReport::default();
        let mut resolved = Vec::with_capacity(addresses.len());
        for (position, address) in addresses.into_iter().enumerate() {
            if self.registry.contains_address(&address).await {
                tracing::debug!(%address, "Already registered, skipping");
                report.skipped.push(address);
                continue;
            }

            let configured = tokens.as_ref().map(|t| &t[position]);
            match self.resolve(&address, configured, force_pairing).await {
                Ok(credential) => resolved.push((position + 1, address, credential)),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping address");
                    report.failed.push(e);
                }
            }
        }

        for (index, address, credential) in resolved {
            let devices = match self.build_free(index, &address, credential.as_ref()).await {
                Ok(devices) => devices,
                Err(e) => {
                    tracing::error!(%address, error = %e, "Unable to create device");
                    continue;
                }
            };
            for device in devices {
                if let Some(id) = self.register(device).await {
                    report.registered.push(id);
                }
            }
        }

        tracing::info!(
            registered = report.registered.len(),
            failed = report.failed.len(),
            "Discovery finished"
        );
        self.events.publish(DeviceEvent::DiscoveryFinished {
            registered: report.registered.len(),
            failed: report.failed.len(),
        });
        Ok(report)
    }

    async fn resolve(
        &self,
        address: &DeviceAddress,
        configured: Option<&Credential>,
        force_pairing: bool,
    ) -> Result<Option<Credential>, PairingError> {
        if !self.family.requires_token() {
            return Ok(None);
        }

        if !force_pairing {
            if let Some(credential) = configured
                && let Err(e) = self.store.save(address, credential)
            {
                tracing::warn!(%address, error = %e, "Failed to persist configured token");
            }
            if let Some(credential) = self.store.resolve(address, configured) {
                return Ok(Some(credential));
            }
        }

        self.negotiator.pair(address).await.map(Some)
    }

    /// Builds the devices for `address` at `index`, or at the first higher
    /// index whose ids are all free.
    async fn build_free(
        &self,
        mut index: usize,
        address: &DeviceAddress,
        credential: Option<&Credential>,
    ) -> Result<Vec<Device<F::Channel>>, ChannelError> {
        loop {
            let devices = self.family.build(index, address, credential)?;
            let mut taken = false;
            for device in &devices {
                taken |= self.registry.get(device.id()).await.is_some();
            }
            if !taken {
                return Ok(devices);
            }
            index += 1;
        }
    }

    async fn register(&self, device: Device<F::Channel>) -> Option<DeviceId> {
        let id = device.id().clone();
        let address = device.address().clone();

        let shared = match self.registry.insert(device).await {
            Ok(shared) => shared,
            Err(e) => {
                tracing::warn!(device_id = %id, error = %e, "Unable to register device");
                return None;
            }
        };
        tracing::info!(device_id = %id, %address, "Device added");
        self.events.publish(DeviceEvent::device_added(id.clone(), address));

        let mut device = shared.lock().await;
        self.profiles.initialize(&mut device).await;
        if let Err(e) = self.sync.refresh_locked(&mut device, true).await {
            tracing::warn!(device_id = %id, error = %e, "Initial refresh failed");
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::EffectCatalogCache;
    use crate::channel::NativeState;
    use crate::family::testing::{FakeFamily, TokenReply};
    use crate::profile::testing::{RecordingInstaller, profile_root};
    use crate::profile::ProfileGenerator;
    use crate::store::MemoryStore;

    struct Fixture {
        family: Arc<FakeFamily>,
        registry: DeviceRegistry<crate::channel::fake::FakeChannel>,
        store: CredentialStore,
        sync: StateSynchronizer<crate::channel::fake::FakeChannel>,
        orchestrator: DiscoveryOrchestrator<FakeFamily>,
        _dir: tempfile::TempDir,
    }

    fn fixture(family: FakeFamily) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let family = Arc::new(family);
        let registry = DeviceRegistry::new();
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        let events = EventBus::new();
        let activity = DiscoveryActivity::default();
        let sync = StateSynchronizer::new(registry.clone(), events.clone(), activity.clone());
        let profiles = Arc::new(ProfileManager::new(
            EffectCatalogCache::new(dir.path().join(".effectLists.json")),
            ProfileGenerator::new(
                profile_root(dir.path()),
                Arc::new(RecordingInstaller::default()),
            ),
        ));
        let orchestrator = DiscoveryOrchestrator::new(
            Arc::clone(&family),
            registry.clone(),
            store.clone(),
            profiles,
            sync.clone(),
            events,
            activity,
        )
        .with_timing(Duration::ZERO, Duration::from_millis(100));

        Fixture {
            family,
            registry,
            store,
            sync,
            orchestrator,
            _dir: dir,
        }
    }

    fn addresses(hosts: &[&str]) -> Vec<DeviceAddress> {
        hosts.iter().map(|h| DeviceAddress::new(*h)).collect()
    }

    fn tokens(values: &[&str]) -> Vec<Credential> {
        values.iter().map(|t| Credential::new(*t)).collect()
    }

    #[tokio::test]
    async fn registers_each_positional_pair() {
        let fx = fixture(FakeFamily::new());
        let request = DiscoveryRequest::new(addresses(&["10.0.0.5", "10.0.0.6", "10.0.0.7"]))
            .with_tokens(tokens(&["a", "b", "c"]));

        let report = fx.orchestrator.discover(request).await.unwrap();

        assert_eq!(report.registered.len(), 3);
        for (i, (host, token)) in [("10.0.0.5", "a"), ("10.0.0.6", "b"), ("10.0.0.7", "c")]
            .into_iter()
            .enumerate()
        {
            let device = fx
                .registry
                .get(&DeviceId::indexed("aurora", i + 1))
                .await
                .unwrap();
            let device = device.lock().await;
            assert_eq!(device.address().host(), host);
            assert_eq!(device.credential(), Some(&Credential::new(token)));
        }
        assert!(fx.family.token_requests().is_empty());
        assert_eq!(
            fx.store.load(&DeviceAddress::new("10.0.0.6")),
            Some(Credential::new("b"))
        );
    }

    #[tokio::test]
    async fn mismatched_lists_register_nothing() {
        let fx = fixture(FakeFamily::new());
        let request = DiscoveryRequest::new(addresses(&["10.0.0.5", "10.0.0.6"]))
            .with_tokens(tokens(&["a"]));

        let err = fx.orchestrator.discover(request).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Config(ConfigError::AddressTokenMismatch {
                addresses: 2,
                tokens: 1
            })
        ));
        assert!(fx.registry.is_empty().await);
        assert!(fx.family.token_requests().is_empty());
        assert!(!fx.orchestrator.is_active());
    }

    #[tokio::test]
    async fn partial_pairing_registers_the_rest() {
        let fx = fixture(
            FakeFamily::new()
                .reply("10.0.0.5", TokenReply::Token("abc"))
                .reply("10.0.0.6", TokenReply::NoToken),
        );

        let report = fx
            .orchestrator
            .discover(DiscoveryRequest::new(addresses(&["10.0.0.5", "10.0.0.6"])))
            .await
            .unwrap();

        assert_eq!(fx.family.token_requests().len(), 2);
        assert_eq!(report.registered, vec![DeviceId::new("aurora1")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(fx.registry.len().await, 1);

        let device = fx.registry.get(&DeviceId::new("aurora1")).await.unwrap();
        let device = device.lock().await;
        assert_eq!(device.address(), &DeviceAddress::new("10.0.0.5"));
        assert_eq!(device.credential(), Some(&Credential::new("abc")));
    }

    #[tokio::test]
    async fn ids_follow_configured_position() {
        let fx = fixture(
            FakeFamily::new()
                .reply("10.0.0.5", TokenReply::NoToken)
                .reply("10.0.0.6", TokenReply::Token("def")),
        );

        let report = fx
            .orchestrator
            .discover(DiscoveryRequest::new(addresses(&["10.0.0.5", "10.0.0.6"])))
            .await
            .unwrap();

        assert_eq!(report.registered, vec![DeviceId::new("aurora2")]);
        assert!(fx.registry.get(&DeviceId::new("aurora1")).await.is_none());
        let device = fx.registry.get(&DeviceId::new("aurora2")).await.unwrap();
        assert_eq!(
            device.lock().await.address(),
            &DeviceAddress::new("10.0.0.6")
        );
    }

    #[tokio::test]
    async fn taken_index_falls_back_to_next_free_id() {
        let fx = fixture(FakeFamily::new());
        fx.orchestrator
            .discover(
                DiscoveryRequest::new(addresses(&["10.0.0.9"])).with_tokens(tokens(&["z"])),
            )
            .await
            .unwrap();

        let report = fx
            .orchestrator
            .discover(
                DiscoveryRequest::new(addresses(&["10.0.0.5"])).with_tokens(tokens(&["a"])),
            )
            .await
            .unwrap();

        assert_eq!(report.registered, vec![DeviceId::new("aurora2")]);
    }

    #[tokio::test]
    async fn persisted_token_avoids_pairing() {
        let fx = fixture(FakeFamily::new());
        let address = DeviceAddress::new("10.0.0.5");
        fx.store.save(&address, &Credential::new("stored")).unwrap();

        fx.orchestrator
            .discover(DiscoveryRequest::new(vec![address]))
            .await
            .unwrap();

        assert!(fx.family.token_requests().is_empty());
        let device = fx.registry.get(&DeviceId::new("aurora1")).await.unwrap();
        assert_eq!(
            device.lock().await.credential(),
            Some(&Credential::new("stored"))
        );
    }

    #[tokio::test]
    async fn forced_pairing_replaces_known_tokens() {
        let fx = fixture(FakeFamily::new().reply("10.0.0.5", TokenReply::Token("fresh")));
        let address = DeviceAddress::new("10.0.0.5");
        fx.store.save(&address, &Credential::new("stale")).unwrap();

        let request = DiscoveryRequest::new(vec![address.clone()])
            .with_tokens(tokens(&["configured"]))
            .with_force_pairing(true);
        fx.orchestrator.discover(request).await.unwrap();

        assert_eq!(fx.family.token_requests(), vec![address.clone()]);
        assert_eq!(fx.store.load(&address), Some(Credential::new("fresh")));
    }

    #[tokio::test]
    async fn tokenless_family_skips_pairing() {
        let fx = fixture(FakeFamily::tokenless());

        let report = fx
            .orchestrator
            .discover(DiscoveryRequest::new(addresses(&["10.0.0.9"])))
            .await
            .unwrap();

        assert_eq!(report.registered.len(), 1);
        assert!(fx.family.token_requests().is_empty());
    }

    #[tokio::test]
    async fn rediscovery_skips_known_addresses_and_uses_free_ids() {
        let fx = fixture(FakeFamily::new());
        fx.orchestrator
            .discover(
                DiscoveryRequest::new(addresses(&["10.0.0.5"])).with_tokens(tokens(&["a"])),
            )
            .await
            .unwrap();

        let report = fx
            .orchestrator
            .discover(
                DiscoveryRequest::new(addresses(&["10.0.0.5", "10.0.0.6"]))
                    .with_tokens(tokens(&["a", "b"])),
            )
            .await
            .unwrap();

        assert_eq!(report.skipped, addresses(&["10.0.0.5"]));
        assert_eq!(report.registered, vec![DeviceId::new("aurora2")]);
        assert_eq!(fx.registry.len().await, 2);
    }

    #[tokio::test]
    async fn new_device_gets_catalog_and_initial_state() {
        let fx = fixture(FakeFamily::new().with_effects(&["Flames", "Forest"]));
        let channel = fx.family.channel("10.0.0.5");
        channel.push_state(NativeState {
            on: Some(true),
            effect: Some("Forest".to_string()),
            ..NativeState::default()
        });

        fx.orchestrator
            .discover(
                DiscoveryRequest::new(addresses(&["10.0.0.5"])).with_tokens(tokens(&["a"])),
            )
            .await
            .unwrap();

        let device = fx.registry.get(&DeviceId::new("aurora1")).await.unwrap();
        let device = device.lock().await;
        assert_eq!(device.catalog().map(crate::EffectCatalog::len), Some(2));
        assert_eq!(device.state().effect(), Some(2));
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let (family, gate) = FakeFamily::new()
            .reply("10.0.0.5", TokenReply::Token("abc"))
            .gated();
        let fx = fixture(family);
        let request = DiscoveryRequest::new(addresses(&["10.0.0.5"]));

        assert_eq!(fx.orchestrator.start(request.clone()), DiscoveryStart::Started);
        while fx.family.token_requests().is_empty() {
            tokio::task::yield_now().await;
        }

        assert!(fx.orchestrator.is_active());
        assert_eq!(fx.orchestrator.start(request.clone()), DiscoveryStart::AlreadyRunning);
        assert!(matches!(
            fx.orchestrator.discover(request).await,
            Err(Error::DiscoveryInProgress)
        ));
        let tick = fx.sync.short_tick().await;
        assert!(tick.skipped);
        assert_eq!(fx.registry.len().await, 0);

        gate.add_permits(1);
        let report = fx.orchestrator.wait().await.unwrap().unwrap();
        assert_eq!(report.registered.len(), 1);
        assert_eq!(fx.family.token_requests().len(), 1);
        assert!(!fx.orchestrator.is_active());
    }

    #[tokio::test]
    async fn activity_flag_resets_after_panic() {
        let activity = DiscoveryActivity::default();
        let guard = activity.begin().unwrap();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("boom");
        });

        assert!(handle.await.is_err());
        assert!(!activity.is_active());
        assert!(activity.begin().is_some());
    }
}
