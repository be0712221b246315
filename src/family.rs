// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device families.
//!
//! A [`DeviceFamily`] knows how to pair with one kind of hardware and how to
//! turn a paired address into registered devices:
//!
//! | Family | Token | Devices per address |
//! |--------|-------|---------------------|
//! | [`Nanoleaf`] | required | one panel array (`aurora<i>`) |
//! | [`MiLight`] | none | bridge lamp (`milight<i>_bridge`) and zones 1-4 (`milight<i>_zone<n>`) |

use std::future::Future;
use std::time::Duration;

use crate::channel::DeviceChannel;
use crate::error::ChannelError;
use crate::registry::Device;
use crate::types::{Credential, DeviceAddress};

/// One kind of hardware the controller can integrate.
pub trait DeviceFamily: Send + Sync + 'static {
    /// Control channel of the devices this family builds.
    type Channel: DeviceChannel;

    /// Human-readable family name, used in logs.
    fn name(&self) -> &'static str;

    /// Port applied to configured addresses that carry none and no `port`
    /// parameter overrides.
    fn default_port(&self) -> u16;

    /// Whether devices need a token before they can be used.
    fn requires_token(&self) -> bool;

    /// Asks the device at `address` for a new token.
    ///
    /// `Ok(None)` means the device answered but granted nothing, typically
    /// because it is not in linking mode.
    fn request_token(
        &self,
        _address: &DeviceAddress,
    ) -> impl Future<Output = Result<Option<Credential>, ChannelError>> + Send {
        async { Err(ChannelError::Unsupported("pairing")) }
    }

    /// Builds the device(s) behind a resolved address.
    ///
    /// `index` is the 1-based position of the address in the configured
    /// list, or a higher free index if that one is taken.
    ///
    /// # Errors
    ///
    /// Returns error if the control channel cannot be created.
    fn build(
        &self,
        index: usize,
        address: &DeviceAddress,
        credential: Option<&Credential>,
    ) -> Result<Vec<Device<Self::Channel>>, ChannelError>;
}

#[cfg(feature = "nanoleaf")]
pub use nanoleaf::Nanoleaf;

#[cfg(feature = "nanoleaf")]
mod nanoleaf {
    use super::{ChannelError, Credential, Device, DeviceAddress, DeviceFamily, Duration};
    use crate::capabilities::Capabilities;
    use crate::channel::NanoleafClient;
    use crate::event::DeviceId;

    /// Nanoleaf panel arrays (Aurora, Canvas, Shapes).
    #[derive(Debug, Clone)]
    pub struct Nanoleaf {
        timeout: Duration,
    }

    impl Nanoleaf {
        /// Creates the family with the default request timeout.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets the request timeout of the channels it builds.
        #[must_use]
        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }
    }

    impl Default for Nanoleaf {
        fn default() -> Self {
            Self {
                timeout: NanoleafClient::DEFAULT_TIMEOUT,
            }
        }
    }

    impl DeviceFamily for Nanoleaf {
        type Channel = NanoleafClient;

        fn name(&self) -> &'static str {
            "Nanoleaf"
        }

        fn default_port(&self) -> u16 {
            NanoleafClient::DEFAULT_PORT
        }

        fn requires_token(&self) -> bool {
            true
        }

        async fn request_token(
            &self,
            address: &DeviceAddress,
        ) -> Result<Option<Credential>, ChannelError> {
            NanoleafClient::request_token(address, self.timeout).await
        }

        fn build(
            &self,
            index: usize,
            address: &DeviceAddress,
            credential: Option<&Credential>,
        ) -> Result<Vec<Device<NanoleafClient>>, ChannelError> {
            let token = credential.ok_or(ChannelError::NotAuthorized)?;
            let client = NanoleafClient::with_timeout(address, token, self.timeout)?;

            let device = Device::new(
                DeviceId::indexed("aurora", index),
                format!("Aurora{index}"),
                address.clone(),
                Capabilities::nanoleaf_panel(),
                client,
            )
            .requiring_credential()
            .with_credential(token.clone());

            Ok(vec![device])
        }
    }
}

#[cfg(feature = "milight")]
pub use milight::MiLight;

#[cfg(feature = "milight")]
mod milight {
    use std::sync::Arc;

    use super::{ChannelError, Credential, Device, DeviceAddress, DeviceFamily, Duration};
    use crate::capabilities::Capabilities;
    use crate::channel::{MiLightBridge, MiLightChannel, MiLightTarget};
    use crate::event::DeviceId;

    /// Number of remote zones behind a v6 bridge.
    const ZONES: u8 = 4;

    /// MiLight v6 wifi bridges and their zones.
    #[derive(Debug, Clone)]
    pub struct MiLight {
        timeout: Duration,
    }

    impl MiLight {
        /// Creates the family with the default bridge timeout.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets how long each bridge answer is awaited.
        #[must_use]
        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }
    }

    impl Default for MiLight {
        fn default() -> Self {
            Self {
                timeout: MiLightBridge::DEFAULT_TIMEOUT,
            }
        }
    }

    impl DeviceFamily for MiLight {
        type Channel = MiLightChannel;

        fn name(&self) -> &'static str {
            "MiLight"
        }

        fn default_port(&self) -> u16 {
            MiLightBridge::DEFAULT_PORT
        }

        fn requires_token(&self) -> bool {
            false
        }

        fn build(
            &self,
            index: usize,
            address: &DeviceAddress,
            _credential: Option<&Credential>,
        ) -> Result<Vec<Device<MiLightChannel>>, ChannelError> {
            let bridge = Arc::new(MiLightBridge::new(address.clone()).with_timeout(self.timeout));

            let mut devices = Vec::with_capacity(usize::from(ZONES) + 1);
            devices.push(Device::new(
                DeviceId::new(format!("milight{index}_bridge")),
                format!("MiLight{index} Bridge"),
                address.clone(),
                Capabilities::milight_bridge(),
                MiLightChannel::new(Arc::clone(&bridge), MiLightTarget::BridgeLamp),
            ));
            for zone in 1..=ZONES {
                devices.push(Device::new(
                    DeviceId::new(format!("milight{index}_zone{zone}")),
                    format!("MiLight{index} Zone{zone}"),
                    address.clone(),
                    Capabilities::milight_zone(),
                    MiLightChannel::new(Arc::clone(&bridge), MiLightTarget::Zone(zone)),
                ));
            }
            Ok(devices)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted family used by unit tests.

    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    use super::{ChannelError, Credential, Device, DeviceAddress, DeviceFamily};
    use crate::capabilities::Capabilities;
    use crate::channel::fake::FakeChannel;
    use crate::event::DeviceId;

    /// How the scripted device answers a token request.
    #[derive(Debug, Clone)]
    pub enum TokenReply {
        Token(&'static str),
        NoToken,
        Unreachable,
        Hang,
    }

    /// Panel-like family whose channels are [`FakeChannel`]s.
    #[derive(Debug, Default)]
    pub struct FakeFamily {
        replies: Mutex<HashMap<String, TokenReply>>,
        requests: Mutex<Vec<DeviceAddress>>,
        channels: Mutex<HashMap<String, FakeChannel>>,
        effects: Vec<&'static str>,
        tokenless: bool,
        gate: Option<Arc<Semaphore>>,
    }

    impl FakeFamily {
        pub fn new() -> Self {
            Self::default()
        }

        /// A family that needs no token, like MiLight.
        pub fn tokenless() -> Self {
            Self {
                tokenless: true,
                ..Self::default()
            }
        }

        pub fn with_effects(mut self, effects: &[&'static str]) -> Self {
            self.effects = effects.to_vec();
            self
        }

        pub fn reply(self, host: &str, reply: TokenReply) -> Self {
            self.replies.lock().insert(host.to_string(), reply);
            self
        }

        /// Blocks every token request until the returned semaphore gets
        /// permits.
        pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            self.gate = Some(Arc::clone(&gate));
            (self, gate)
        }

        pub fn token_requests(&self) -> Vec<DeviceAddress> {
            self.requests.lock().clone()
        }

        pub fn channel(&self, host: &str) -> FakeChannel {
            self.channels
                .lock()
                .entry(host.to_string())
                .or_insert_with(|| FakeChannel::new().with_effects(&self.effects))
                .clone()
        }
    }

    impl DeviceFamily for FakeFamily {
        type Channel = FakeChannel;

        fn name(&self) -> &'static str {
            "Fake"
        }

        fn default_port(&self) -> u16 {
            16021
        }

        fn requires_token(&self) -> bool {
            !self.tokenless
        }

        async fn request_token(
            &self,
            address: &DeviceAddress,
        ) -> Result<Option<Credential>, ChannelError> {
            self.requests.lock().push(address.clone());
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|_| ChannelError::Unsupported("closed gate"))?
                    .forget();
            }

            let reply = self.replies.lock().get(address.host()).cloned();
            match reply.unwrap_or(TokenReply::NoToken) {
                TokenReply::Token(token) => Ok(Some(Credential::new(token))),
                TokenReply::NoToken => Ok(None),
                TokenReply::Unreachable => Err(ChannelError::Timeout(5000)),
                TokenReply::Hang => {
                    std::future::pending::<()>().await;
                    Ok(None)
                }
            }
        }

        fn build(
            &self,
            index: usize,
            address: &DeviceAddress,
            credential: Option<&Credential>,
        ) -> Result<Vec<Device<FakeChannel>>, ChannelError> {
            let capabilities = if self.tokenless {
                Capabilities::milight_zone()
            } else {
                Capabilities::nanoleaf_panel()
            };
            let mut device = Device::new(
                DeviceId::indexed("aurora", index),
                format!("Aurora{index}"),
                address.clone(),
                capabilities,
                self.channel(address.host()),
            );
            if !self.tokenless {
                device = device.requiring_credential();
            }
            if let Some(credential) = credential {
                device = device.with_credential(credential.clone());
            }
            Ok(vec![device])
        }
    }
}
