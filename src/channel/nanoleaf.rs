// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nanoleaf OpenAPI client.
//!
//! The panel controller exposes a small REST API on port 16021. Every
//! authenticated request carries the token as the first path segment:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | pair | `POST /api/v1/new` |
//! | read state | `GET /api/v1/{token}/` |
//! | write state | `PUT /api/v1/{token}/state` |
//! | select effect | `PUT /api/v1/{token}/effects` |
//! | list effects | `GET /api/v1/{token}/effects/effectsList` |

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{DeviceChannel, NativeState};
use crate::error::ChannelError;
use crate::types::{Credential, DeviceAddress, PowerState};

/// HTTP client for one Nanoleaf panel array.
///
/// # Examples
///
/// ```
/// use lightnode::channel::NanoleafClient;
/// use lightnode::types::{Credential, DeviceAddress};
///
/// let address = DeviceAddress::new("10.0.0.5");
/// let client = NanoleafClient::new(&address, &Credential::new("abc")).unwrap();
/// assert_eq!(client.base_url(), "http://10.0.0.5:16021/api/v1/abc");
/// ```
#[derive(Debug, Clone)]
pub struct NanoleafClient {
    base_url: String,
    client: Client,
}

impl NanoleafClient {
    /// Default OpenAPI port.
    pub const DEFAULT_PORT: u16 = 16021;
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a client for `address` authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(address: &DeviceAddress, token: &Credential) -> Result<Self, ChannelError> {
        Self::with_timeout(address, token, Self::DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the address is blank or the HTTP client cannot be
    /// created.
    pub fn with_timeout(
        address: &DeviceAddress,
        token: &Credential,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let base_url = format!(
            "{}/{}",
            api_root(address)?,
            urlencoding::encode(token.as_str())
        );
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, client })
    }

    /// Returns the authenticated API root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Asks the device for a new token.
    ///
    /// The device only hands one out during the 30 seconds after its power
    /// button was held. Outside that window it answers 403 and `Ok(None)`
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or an unexpected status.
    pub async fn request_token(
        address: &DeviceAddress,
        timeout: Duration,
    ) -> Result<Option<Credential>, ChannelError> {
        #[derive(Deserialize)]
        struct NewToken {
            auth_token: String,
        }

        let url = format!("{}/new", api_root(address)?);
        let client = Client::builder().timeout(timeout).build()?;

        tracing::debug!(url = %url, "Requesting Nanoleaf token");

        let response = client.post(&url).send().await?;
        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => return Ok(None),
            status if !status.is_success() => {
                return Err(ChannelError::UnexpectedStatus(status.as_u16()));
            }
            _ => {}
        }

        let body: NewToken = serde_json::from_str(&response.text().await?)?;
        if body.auth_token.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential::new(body.auth_token)))
    }

    async fn put(&self, path: &str, body: Value) -> Result<(), ChannelError> {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!(url = %url, body = %body, "Sending Nanoleaf command");

        let response = self.client.put(&url).json(&body).send().await?;
        check_status(&response)?;
        Ok(())
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ChannelError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self.client.get(&url).send().await?;
        check_status(&response)?;

        let body = response.text().await?;
        tracing::trace!(body = %body, "Received Nanoleaf response");
        Ok(serde_json::from_str(&body)?)
    }

    async fn put_state(&self, key: &str, value: Value) -> Result<(), ChannelError> {
        self.put("state", json!({ key: { "value": value } })).await
    }
}

fn api_root(address: &DeviceAddress) -> Result<String, ChannelError> {
    if address.host().trim().is_empty() {
        return Err(ChannelError::InvalidAddress(address.to_string()));
    }
    Ok(format!(
        "http://{}:{}/api/v1",
        address.host(),
        address.port_or(NanoleafClient::DEFAULT_PORT)
    ))
}

fn check_status(response: &Response) -> Result<(), ChannelError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ChannelError::NotAuthorized);
    }
    if !status.is_success() {
        return Err(ChannelError::UnexpectedStatus(status.as_u16()));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelInfo {
    state: PanelState,
    effects: PanelEffects,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelState {
    on: Option<Field<bool>>,
    brightness: Option<Field<i32>>,
    hue: Option<Field<i32>>,
    sat: Option<Field<i32>>,
    ct: Option<Field<i32>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelEffects {
    select: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Field<T> {
    value: T,
}

impl From<PanelInfo> for NativeState {
    fn from(info: PanelInfo) -> Self {
        let state = info.state;
        Self {
            on: state.on.map(|f| f.value),
            brightness: state.brightness.map(|f| f.value),
            hue: state.hue.map(|f| f.value),
            saturation: state.sat.map(|f| f.value),
            color_temperature: state.ct.map(|f| f.value),
            effect: info.effects.select,
        }
    }
}

impl DeviceChannel for NanoleafClient {
    async fn set_power(&self, state: PowerState) -> Result<(), ChannelError> {
        self.put_state("on", json!(state.is_on())).await
    }

    async fn set_brightness(&self, value: i32) -> Result<(), ChannelError> {
        self.put_state("brightness", json!(value)).await
    }

    async fn set_color(&self, value: i32) -> Result<(), ChannelError> {
        self.put_state("hue", json!(value)).await
    }

    async fn set_saturation(&self, value: i32) -> Result<(), ChannelError> {
        self.put_state("sat", json!(value)).await
    }

    async fn set_color_temperature(&self, value: i32) -> Result<(), ChannelError> {
        self.put_state("ct", json!(value)).await
    }

    async fn select_effect(&self, name: &str) -> Result<(), ChannelError> {
        self.put("effects", json!({ "select": name })).await
    }

    async fn query_state(&self) -> Result<NativeState, ChannelError> {
        let info: PanelInfo = self.get("").await?;
        Ok(info.into())
    }

    async fn list_effects(&self) -> Result<Vec<String>, ChannelError> {
        self.get("effects/effectsList").await
    }
}
