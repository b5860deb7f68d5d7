//! Identity service contract used by the signup flow, the auth operations and
//! the route guard. Any backend implements `IdentityService`; nothing here
//! depends on backend-specific fields beyond the documented `User` shape.

pub mod gotrue;

#[cfg(test)]
pub(crate) mod fake;

pub use self::gotrue::GoTrueClient;

use crate::error::{ConfigurationError, RemoteError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};
use url::Url;
use uuid::Uuid;

/// Default bound on every backend call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Role claim value that unlocks `/admin`.
pub const ADMIN_ROLE: &str = "admin";

/// Delivery channel for one-time passcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OtpChannel {
    Email,
    Phone,
}

impl OtpChannel {
    /// Verification type expected by the backend for this channel.
    #[must_use]
    pub fn verify_type(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "sms",
        }
    }
}

impl fmt::Display for OtpChannel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => formatter.write_str("email"),
            Self::Phone => formatter.write_str("phone"),
        }
    }
}

/// Profile data stored alongside a new account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub full_name: String,
    pub location: String,
    pub phone: String,
}

/// Authenticated principal as reported by the backend.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
}

impl User {
    /// Role claim, read from application metadata first and user metadata
    /// second. The first non-empty string wins.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        [&self.app_metadata, &self.user_metadata]
            .into_iter()
            .filter_map(|metadata| metadata.get("role").and_then(Value::as_str))
            .find(|role| !role.trim().is_empty())
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role() == Some(ADMIN_ROLE)
    }
}

/// A signed-in user together with the bearer token proving it.
#[derive(Clone, Debug)]
pub struct Session {
    pub access_token: SecretString,
    pub user: User,
}

impl Session {
    #[must_use]
    pub fn new(access_token: SecretString, user: User) -> Self {
        Self { access_token, user }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Create an account; the backend is expected to send the first OTP codes.
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
        profile: &ProfileMetadata,
    ) -> Result<(), RemoteError>;

    /// Send a one-time passcode to `address` over `channel`.
    async fn dispatch_otp(&self, channel: OtpChannel, address: &str) -> Result<(), RemoteError>;

    /// Check `code` for `address` over `channel`.
    async fn verify_otp(
        &self,
        channel: OtpChannel,
        address: &str,
        code: &str,
    ) -> Result<(), RemoteError>;

    /// Resolve the session behind a request-scoped access token.
    /// Returns `Ok(None)` when the token is unknown or expired.
    async fn current_session(&self, access_token: &str) -> Result<Option<Session>, RemoteError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, RemoteError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError>;
}

/// Where the backend lives and how to talk to it. Both values are optional so
/// the server can start unconfigured and report it at every entry point.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub url: Option<Url>,
    pub anon_key: Option<SecretString>,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
            && self
                .anon_key
                .as_ref()
                .is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

/// Build the identity client for `config`.
///
/// # Errors
/// Returns `ConfigurationError` when the backend URL or key is missing, or the
/// HTTP client cannot be built.
pub fn connect(config: &BackendConfig) -> Result<Arc<dyn IdentityService>, ConfigurationError> {
    let (Some(url), Some(anon_key)) = (config.url.as_ref(), config.anon_key.as_ref()) else {
        return Err(ConfigurationError);
    };
    if anon_key.expose_secret().trim().is_empty() {
        return Err(ConfigurationError);
    }
    let client = GoTrueClient::new(url.clone(), anon_key.clone(), config.timeout)
        .map_err(|_| ConfigurationError)?;
    Ok(Arc::new(client))
}
