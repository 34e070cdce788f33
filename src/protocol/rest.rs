// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! REST access to the Helki cloud.
//!
//! One client instance is shared by the auth session and discovery. It owns
//! the base URL, the vendor headers and the HTTP status mapping; token
//! lifecycle and payload interpretation live with the callers.

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::auth::AccessToken;
use crate::config::CloudConfig;
use crate::error::{AuthError, DiscoveryError};
use crate::types::DeviceId;

/// OAuth2 token endpoint path.
const TOKEN_PATH: &str = "/client/token";
/// Grouped device listing endpoint path.
const GROUPED_DEVS_PATH: &str = "/api/v2/grouped_devs";

// ===== Wire payloads =====

/// Token grant response body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenWire {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// One group entry from the grouped device listing.
#[derive(Debug, Deserialize)]
pub(crate) struct GroupWire {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub devs: Vec<DevWire>,
}

/// One hub entry inside a group.
#[derive(Debug, Deserialize)]
pub(crate) struct DevWire {
    pub dev_id: Option<String>,
    pub name: Option<String>,
    pub serial_id: Option<String>,
}

/// Node listing response for one hub.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeListWire {
    #[serde(default)]
    pub nodes: Vec<NodeWire>,
}

/// One zone entry in a node listing.
#[derive(Debug, Deserialize)]
pub(crate) struct NodeWire {
    pub addr: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

// ===== RestClient =====

/// HTTP client bound to one cloud account's base URL and vendor headers.
#[derive(Debug, Clone)]
pub(crate) struct RestClient {
    client: Client,
    config: CloudConfig,
}

impl RestClient {
    /// Creates the client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Http`] if the underlying HTTP client cannot be
    /// constructed, e.g. when the TLS backend fails to initialise.
    pub(crate) fn new(config: CloudConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(AuthError::Http)?;

        Ok(Self { client, config })
    }

    /// Returns the configuration this client was built from.
    pub(crate) fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Exchanges account credentials for a token pair (password grant).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialsRejected`] when the cloud answers with
    /// a non-success status, [`AuthError::Http`] on transport failure and
    /// [`AuthError::MalformedResponse`] when the body does not decode.
    pub(crate) async fn password_grant(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenWire, AuthError> {
        let form = [
            ("grant_type", "password"),
            ("username", email),
            ("password", password),
        ];
        let response = self.send_token_request(&form).await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "login rejected");
            return Err(AuthError::CredentialsRejected {
                status: status.as_u16(),
            });
        }

        decode_token(response).await
    }

    /// Exchanges a refresh value for a new token pair (refresh grant).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshRejected`] when the cloud answers with a
    /// non-success status; this is fatal for the session.
    pub(crate) async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenWire, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let response = self.send_token_request(&form).await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "token refresh rejected");
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
            });
        }

        decode_token(response).await
    }

    /// Fetches the account's device groups.
    pub(crate) async fn grouped_devices(
        &self,
        token: &AccessToken,
    ) -> Result<Vec<GroupWire>, DiscoveryError> {
        self.get_json(GROUPED_DEVS_PATH, token).await
    }

    /// Fetches the zone listing of one hub.
    pub(crate) async fn device_nodes(
        &self,
        token: &AccessToken,
        device: &DeviceId,
    ) -> Result<NodeListWire, DiscoveryError> {
        let path = format!("/api/v2/devs/{device}/mgr/nodes");
        self.get_json(&path, token).await
    }

    async fn send_token_request(
        &self,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, AuthError> {
        let url = format!("{}{TOKEN_PATH}", self.config.api_base());

        tracing::debug!(url = %url, grant = form[0].1, "requesting token");

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.client_id(), Some(self.config.client_secret()))
            .header("x-referer", CloudConfig::REFERER)
            .header("x-serialid", self.config.serial_id())
            .form(form)
            .send()
            .await?;

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &AccessToken,
    ) -> Result<T, DiscoveryError> {
        let url = format!("{}{path}", self.config.api_base());

        tracing::debug!(url = %url, "fetching");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.secret())
            .header("x-referer", CloudConfig::REFERER)
            .header("x-serialid", self.config.serial_id())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
                endpoint: path.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

async fn decode_token(response: reqwest::Response) -> Result<TokenWire, AuthError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| AuthError::MalformedResponse(e.to_string()))
}
