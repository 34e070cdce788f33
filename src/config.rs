// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud account configuration.
//!
//! [`CloudConfig`] carries everything needed to reach the Helki cloud on
//! behalf of one account: credentials, the serial/site identifier the vendor
//! expects in the `x-serialid` header, the OAuth2 client pair, and the REST
//! and socket base URLs. Sensible vendor defaults are provided for everything
//! except the account credentials.

use std::fmt;
use std::time::Duration;

/// Configuration for one Helki cloud account.
///
/// # Examples
///
/// ```
/// use helki_lib::CloudConfig;
///
/// // Vendor defaults
/// let config = CloudConfig::new("user@example.com", "secret");
///
/// // With all options
/// let config = CloudConfig::new("user@example.com", "secret")
///     .with_serial_id("7")
///     .with_client_credentials("my-client-id", "my-client-secret")
///     .with_api_base("https://api-elnur.helki.com")
///     .with_socket_base("wss://api-elnur.helki.com");
/// ```
#[derive(Clone)]
pub struct CloudConfig {
    email: String,
    password: String,
    serial_id: String,
    client_id: String,
    client_secret: String,
    api_base: String,
    socket_base: String,
    timeout: Duration,
}

impl CloudConfig {
    /// Default REST API base URL.
    pub const DEFAULT_API_BASE: &'static str = "https://api-elnur.helki.com";
    /// Default socket base URL (websocket scheme).
    pub const DEFAULT_SOCKET_BASE: &'static str = "wss://api-elnur.helki.com";
    /// Default serial/site identifier sent as `x-serialid`.
    pub const DEFAULT_SERIAL_ID: &'static str = "7";
    /// OAuth2 client id published by the vendor web app.
    pub const DEFAULT_CLIENT_ID: &'static str = "54bccbfb41a9a5113f0488d0";
    /// OAuth2 client secret published by the vendor web app.
    pub const DEFAULT_CLIENT_SECRET: &'static str = "vdivdi";
    /// Referer the vendor API expects on every request.
    pub const REFERER: &'static str = "https://remotecontrol.elnur.es";
    /// Default request timeout for REST calls.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration with vendor defaults for the given account.
    ///
    /// # Arguments
    ///
    /// * `email` - Account email used for the password grant
    /// * `password` - Account password
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            serial_id: Self::DEFAULT_SERIAL_ID.to_string(),
            client_id: Self::DEFAULT_CLIENT_ID.to_string(),
            client_secret: Self::DEFAULT_CLIENT_SECRET.to_string(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            socket_base: Self::DEFAULT_SOCKET_BASE.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the serial/site identifier.
    #[must_use]
    pub fn with_serial_id(mut self, serial_id: impl Into<String>) -> Self {
        self.serial_id = serial_id.into();
        self
    }

    /// Overrides the OAuth2 client id/secret pair.
    #[must_use]
    pub fn with_client_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Overrides the REST API base URL (no trailing slash).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Overrides the socket base URL (no trailing slash, `ws://` or `wss://`).
    #[must_use]
    pub fn with_socket_base(mut self, socket_base: impl Into<String>) -> Self {
        self.socket_base = socket_base.into();
        self
    }

    /// Sets the REST request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the account email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the serial/site identifier.
    #[must_use]
    pub fn serial_id(&self) -> &str {
        &self.serial_id
    }

    /// Returns the OAuth2 client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Returns the REST API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the socket base URL.
    #[must_use]
    pub fn socket_base(&self) -> &str {
        &self.socket_base
    }

    /// Returns the REST request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

// Credentials stay out of debug output.
impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("email", &self.email)
            .field("password", &"***")
            .field("serial_id", &self.serial_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("api_base", &self.api_base)
            .field("socket_base", &self.socket_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}
