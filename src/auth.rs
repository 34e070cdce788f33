// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OAuth2 session against the Helki cloud.
//!
//! [`AuthSession`] owns the token pair. Other components never see the
//! stored token; they call [`AuthSession::ensure_valid`] and receive an
//! opaque [`AccessToken`] to present on their next request.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use crate::config::CloudConfig;
use crate::error::AuthError;
use crate::protocol::rest::{RestClient, TokenWire};

// ===== AccessToken =====

/// Opaque bearer credential handed out per request or connection attempt.
///
/// The wrapped value is deliberately kept out of `Debug` output so tokens do
/// not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub(crate) fn new(raw: String) -> Self {
        Self(raw)
    }

    /// The raw bearer value to present to the cloud.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

// ===== Token =====

/// The stored token pair plus its expiry bookkeeping.
#[derive(Debug, Clone)]
struct Token {
    access: AccessToken,
    refresh: String,
    expires_at: DateTime<Utc>,
    lifetime: TimeDelta,
}

impl Token {
    fn from_wire(wire: TokenWire, now: DateTime<Utc>) -> Self {
        let lifetime = TimeDelta::seconds(i64::try_from(wire.expires_in).unwrap_or(3600));
        Self {
            access: AccessToken::new(wire.access_token),
            refresh: wire.refresh_token,
            expires_at: now + lifetime,
            lifetime,
        }
    }

    /// A token counts as stale once less than a fifth of its lifetime
    /// remains.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + self.lifetime / 5 < self.expires_at
    }
}

// ===== AuthSession =====

/// Owns the OAuth2 token lifecycle for one cloud account.
///
/// # Examples
///
/// ```no_run
/// use helki_lib::{AuthSession, CloudConfig};
///
/// # async fn example() -> helki_lib::Result<()> {
/// let session = AuthSession::new(CloudConfig::new("me@example.com", "hunter2"))?;
/// let token = session.ensure_valid().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AuthSession {
    rest: Arc<RestClient>,
    token: Mutex<Option<Token>>,
}

impl AuthSession {
    /// Creates a session for the given account.
    ///
    /// No network traffic happens here; the first token exchange runs on
    /// [`AuthSession::authenticate`] or lazily on the first
    /// [`AuthSession::ensure_valid`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Http`] if the HTTP client cannot be constructed.
    pub fn new(config: CloudConfig) -> Result<Self, AuthError> {
        Ok(Self {
            rest: Arc::new(RestClient::new(config)?),
            token: Mutex::new(None),
        })
    }

    /// Returns the configuration this session was built from.
    #[must_use]
    pub fn config(&self) -> &CloudConfig {
        self.rest.config()
    }

    pub(crate) fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }

    /// Performs the login exchange regardless of any stored token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialsRejected`] when the cloud refuses the
    /// account credentials.
    pub async fn authenticate(&self) -> Result<AccessToken, AuthError> {
        let mut slot = self.token.lock().await;
        let token = self.login().await?;
        let access = token.access.clone();
        *slot = Some(token);
        Ok(access)
    }

    /// Returns a token that is fresh enough to survive its caller's use.
    ///
    /// Logs in when no token is stored yet, refreshes when the stored one is
    /// inside its expiry margin, otherwise hands back the stored token. The
    /// internal lock is held across the exchange, so concurrent callers in
    /// the same expiry window collapse into a single outbound request and
    /// all receive the resulting token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshRejected`] when the cloud refuses the
    /// stored refresh value. That is fatal for this session; recovery
    /// requires a fresh [`AuthSession::authenticate`].
    pub async fn ensure_valid(&self) -> Result<AccessToken, AuthError> {
        let mut slot = self.token.lock().await;

        let stale_refresh = match slot.as_ref() {
            Some(token) if token.is_fresh(Utc::now()) => return Ok(token.access.clone()),
            Some(token) => Some(token.refresh.clone()),
            None => None,
        };

        let token = match stale_refresh {
            Some(refresh) => {
                tracing::debug!("access token stale, refreshing");
                self.exchange_refresh(&refresh).await?
            }
            None => {
                tracing::debug!("no token stored, logging in");
                self.login().await?
            }
        };

        let access = token.access.clone();
        *slot = Some(token);
        Ok(access)
    }

    /// Forces a renewal of the stored token.
    ///
    /// Uses the refresh grant when a token pair is stored and falls back to
    /// the login exchange when none is.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshRejected`] when the cloud refuses the
    /// stored refresh value.
    pub async fn refresh(&self) -> Result<AccessToken, AuthError> {
        let mut slot = self.token.lock().await;

        let token = match slot.as_ref().map(|t| t.refresh.clone()) {
            Some(refresh) => self.exchange_refresh(&refresh).await?,
            None => self.login().await?,
        };

        let access = token.access.clone();
        *slot = Some(token);
        Ok(access)
    }

    async fn login(&self) -> Result<Token, AuthError> {
        let config = self.rest.config();
        let wire = self
            .rest
            .password_grant(config.email(), config.password())
            .await?;
        tracing::debug!("login exchange succeeded");
        Ok(Token::from_wire(wire, Utc::now()))
    }

    async fn exchange_refresh(&self, refresh: &str) -> Result<Token, AuthError> {
        let wire = self.rest.refresh_grant(refresh).await?;
        tracing::debug!("token refresh succeeded");
        Ok(Token::from_wire(wire, Utc::now()))
    }
}
