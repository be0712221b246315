// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The supervisory controller.
//!
//! One [`Controller`] exists per device family. It owns the registry, the
//! event bus and every lifecycle component, and exposes them to the host
//! through the [`Supervisor`] callbacks:
//!
//! - `on_start`: parse the host parameters and launch discovery
//! - `on_short_tick`: poll live state
//! - `on_long_tick`: flip the heartbeat
//! - `on_command`: route a host command to the controller or a device
//!
//! Hosts that do not drive the callbacks themselves can call
//! [`Controller::run`], which schedules both ticks until shutdown.
//!
//! # Examples
//!
//! ```no_run
//! use std::collections::HashMap;
//!
//! use lightnode::controller::{Controller, Supervisor};
//! use lightnode::family::Nanoleaf;
//!
//! # async fn example() -> lightnode::Result<()> {
//! let params = HashMap::from([
//!     ("host".to_string(), "192.168.1.40,192.168.1.41".to_string()),
//!     ("token".to_string(), "abc,def".to_string()),
//! ]);
//!
//! let controller = Controller::builder(Nanoleaf::new())
//!     .with_params(params)
//!     .build();
//!
//! let mut events = controller.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//!
//! let (_stop, stopped) = tokio::sync::oneshot::channel::<()>();
//! controller.run(stopped).await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use crate::command::CommandName;
use crate::config::{ControllerSettings, IntegrationConfig};
use crate::dispatch::CommandDispatcher;
use crate::discovery::{
    DiscoveryActivity, DiscoveryOrchestrator, DiscoveryRequest, DiscoveryStart,
};
use crate::error::{ConfigError, Error, ValidationError};
use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::family::DeviceFamily;
use crate::profile::{NoopInstaller, ProfileInstaller, ProfileManager};
use crate::registry::DeviceRegistry;
use crate::state::StateChange;
use crate::store::{CredentialStore, KeyValueStore, MemoryStore};
use crate::sync::{Heartbeat, StateSynchronizer, SyncReport};

/// Id under which controller-level commands are rejected.
const CONTROLLER_ID: &str = "controller";

/// Lifecycle callbacks the host invokes.
pub trait Supervisor: Send + Sync {
    /// Called once when the host starts the integration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the host parameters are unusable; the
    /// integration then reports itself offline and discovers nothing.
    fn on_start(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Called on the short polling interval.
    fn on_short_tick(&self) -> impl Future<Output = SyncReport> + Send;

    /// Called on the long polling interval.
    fn on_long_tick(&self) -> impl Future<Output = Heartbeat> + Send;

    /// Called for every host command. `target` is `None` for commands
    /// addressed to the controller itself.
    ///
    /// # Errors
    ///
    /// Returns the error that rejected the command; the command had no
    /// effect.
    fn on_command(
        &self,
        target: Option<&DeviceId>,
        name: &str,
        value: Option<&str>,
    ) -> impl Future<Output = Result<Vec<StateChange>, Error>> + Send;
}

/// Builder for a [`Controller`].
#[derive(Debug)]
pub struct ControllerBuilder<F> {
    family: F,
    params: HashMap<String, String>,
    settings: ControllerSettings,
    store: Arc<dyn KeyValueStore>,
    installer: Arc<dyn ProfileInstaller>,
}

impl<F: DeviceFamily> ControllerBuilder<F> {
    fn new(family: F) -> Self {
        Self {
            family,
            params: HashMap::new(),
            settings: ControllerSettings::default(),
            store: Arc::new(MemoryStore::new()),
            installer: Arc::new(NoopInstaller),
        }
    }

    /// Sets the host's custom parameters (`host`, `token`, ...).
    #[must_use]
    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Sets the runtime settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the persisted store tokens are kept in.
    ///
    /// Defaults to a [`MemoryStore`], which forgets tokens on restart.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the hook that makes the host reload a regenerated profile.
    #[must_use]
    pub fn with_installer(mut self, installer: Arc<dyn ProfileInstaller>) -> Self {
        self.installer = installer;
        self
    }

    /// Wires up the controller. Nothing touches the network until
    /// [`Supervisor::on_start`].
    #[must_use]
    pub fn build(self) -> Controller<F> {
        let family = Arc::new(self.family);
        let registry = DeviceRegistry::new();
        let events = EventBus::new();
        let store = CredentialStore::new(self.store);
        let activity = DiscoveryActivity::default();
        let profiles = Arc::new(ProfileManager::from_settings(
            &self.settings,
            self.installer,
        ));

        let sync = StateSynchronizer::new(registry.clone(), events.clone(), activity.clone());
        let dispatcher = CommandDispatcher::new(
            registry.clone(),
            events.clone(),
            sync.clone(),
            Arc::clone(&profiles),
        );
        let discovery = DiscoveryOrchestrator::new(
            Arc::clone(&family),
            registry.clone(),
            store,
            profiles,
            sync.clone(),
            events.clone(),
            activity,
        )
        .with_timing(
            self.settings.discovery_delay(),
            self.settings.pairing_timeout(),
        );

        Controller {
            family,
            params: self.params,
            settings: self.settings,
            registry,
            events,
            sync,
            dispatcher,
            discovery,
            online: AtomicBool::new(false),
        }
    }
}

/// Supervisory controller for one device family.
pub struct Controller<F: DeviceFamily> {
    family: Arc<F>,
    params: HashMap<String, String>,
    settings: ControllerSettings,
    registry: DeviceRegistry<F::Channel>,
    events: EventBus,
    sync: StateSynchronizer<F::Channel>,
    dispatcher: CommandDispatcher<F::Channel>,
    discovery: DiscoveryOrchestrator<F>,
    online: AtomicBool,
}

impl<F: DeviceFamily> std::fmt::Debug for Controller<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("family", &self.family.name())
            .field("settings", &self.settings)
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl<F: DeviceFamily> Controller<F> {
    /// Starts building a controller for `family`.
    #[must_use]
    pub fn builder(family: F) -> ControllerBuilder<F> {
        ControllerBuilder::new(family)
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribes to device and controller events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Returns the device registry.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry<F::Channel> {
        &self.registry
    }

    /// Returns the discovery orchestrator.
    #[must_use]
    pub fn discovery(&self) -> &DiscoveryOrchestrator<F> {
        &self.discovery
    }

    /// Returns the command dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &CommandDispatcher<F::Channel> {
        &self.dispatcher
    }

    /// Returns the state synchronizer.
    #[must_use]
    pub fn synchronizer(&self) -> &StateSynchronizer<F::Channel> {
        &self.sync
    }

    /// Returns the runtime settings.
    #[must_use]
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Returns whether the integration reported itself online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Runs the supervisory loop until `shutdown` resolves.
    ///
    /// Calls [`Supervisor::on_start`] once, then the short and long ticks on
    /// the configured intervals. A startup failure is logged and the loop
    /// keeps ticking so the host still sees the heartbeat; the integration
    /// stays offline. Reports offline on exit.
    pub async fn run(&self, shutdown: impl Future) {
        if let Err(e) = self.on_start().await {
            tracing::error!(family = self.family.name(), error = %e, "Controller start failed");
        }

        let short_period = self.settings.short_poll();
        let long_period = self.settings.long_poll();
        let mut short = tokio::time::interval_at(Instant::now() + short_period, short_period);
        let mut long = tokio::time::interval_at(Instant::now() + long_period, long_period);
        short.set_missed_tick_behavior(MissedTickBehavior::Skip);
        long.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = short.tick() => {
                    self.on_short_tick().await;
                }
                _ = long.tick() => {
                    self.on_long_tick().await;
                }
            }
        }

        tracing::info!(family = self.family.name(), "Controller stopping");
        self.set_online(false);
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
        self.events.publish(DeviceEvent::StatusChanged { online });
    }

    /// Parses the host parameters, filling in the family's default port.
    fn config(&self) -> Result<IntegrationConfig, ConfigError> {
        IntegrationConfig::from_params(&self.params)
            .map(|config| config.with_default_port(self.family.default_port()))
    }

    /// Re-reads the host parameters and launches a discovery pass.
    fn start_discovery(&self) -> Result<DiscoveryStart, ConfigError> {
        let config = self.config()?;
        tracing::debug!(
            addresses = config.addresses().len(),
            force_pairing = config.request_new_token(),
            "Configuration loaded"
        );
        Ok(self.discovery.start(DiscoveryRequest::from(&config)))
    }

    async fn route(
        &self,
        target: Option<&DeviceId>,
        name: &str,
        value: Option<&str>,
    ) -> Result<Vec<StateChange>, Error> {
        if let Some(device_id) = target {
            return self.dispatcher.apply(device_id, name, value).await;
        }

        match name.parse::<CommandName>()? {
            CommandName::Discovery => {
                self.start_discovery()?;
                Ok(Vec::new())
            }
            CommandName::Query => Ok(self.query_all().await),
            command => Err(ValidationError::Unsupported {
                device: DeviceId::new(CONTROLLER_ID),
                command,
            }
            .into()),
        }
    }

    async fn query_all(&self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        for shared in self.registry.snapshot().await {
            let mut device = shared.lock().await;
            if !device.is_authorized() {
                continue;
            }
            match self.sync.refresh_locked(&mut device, true).await {
                Ok(mut c) => changes.append(&mut c),
                Err(e) => {
                    tracing::warn!(device_id = %device.id(), error = %e, "Error querying device");
                }
            }
        }
        self.events.publish(DeviceEvent::StatusChanged {
            online: self.is_online(),
        });
        changes
    }
}

impl<F: DeviceFamily> Supervisor for Controller<F> {
    async fn on_start(&self) -> Result<(), Error> {
        tracing::info!(family = self.family.name(), "Starting controller");

        let checked = self.config().and_then(|config| config.check_tokens());
        if let Err(e) = checked {
            tracing::error!(error = %e, "Invalid configuration");
            self.set_online(false);
            return Err(e.into());
        }

        self.set_online(true);
        self.start_discovery()?;
        Ok(())
    }

    async fn on_short_tick(&self) -> SyncReport {
        self.sync.short_tick().await
    }

    async fn on_long_tick(&self) -> Heartbeat {
        self.sync.long_tick()
    }

    async fn on_command(
        &self,
        target: Option<&DeviceId>,
        name: &str,
        value: Option<&str>,
    ) -> Result<Vec<StateChange>, Error> {
        let result = self.route(target, name, value).await;
        if let Err(e) = &result {
            tracing::warn!(
                device_id = %target.map_or(CONTROLLER_ID, DeviceId::as_str),
                command = name,
                error = %e,
                "Command rejected"
            );
        }
        result
    }
}
