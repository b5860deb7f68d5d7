//! HTTP client for a GoTrue-compatible auth API (`/auth/v1/...`). Every call is
//! sent once, bounded by the configured timeout, and carries the project's
//! public `apikey`. Error bodies are reduced to the backend's own message so it
//! can be shown verbatim.

use super::{IdentityService, OtpChannel, ProfileMetadata, Session, User};
use crate::{
    error::{RemoteError, RemoteErrorKind},
    APP_USER_AGENT,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

#[derive(Clone, Debug)]
pub struct GoTrueClient {
    base_url: Url,
    anon_key: SecretString,
    client: Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: User,
}

impl GoTrueClient {
    /// Create a client for the project at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: Url, anon_key: SecretString, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url,
            anon_key,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/auth/v1/{}", path.trim_start_matches('/'))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(self.endpoint(path))
            .header("apikey", self.anon_key.expose_secret())
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.endpoint(path))
            .header("apikey", self.anon_key.expose_secret())
    }

    /// Send the request and turn transport failures and non-2xx statuses into
    /// `RemoteError` of the given kind.
    async fn send(request: RequestBuilder, kind: RemoteErrorKind) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|err| RemoteError::new(kind, transport_message(&err)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        Err(RemoteError::new(kind, error_message(response).await))
    }
}

#[async_trait]
impl IdentityService for GoTrueClient {
    #[instrument(skip(self, password, profile))]
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
        profile: &ProfileMetadata,
    ) -> Result<(), RemoteError> {
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
            "data": profile,
        });

        Self::send(self.post("signup").json(&body), RemoteErrorKind::SignupFailed).await?;

        debug!("account created");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn dispatch_otp(&self, channel: OtpChannel, address: &str) -> Result<(), RemoteError> {
        let body = match channel {
            OtpChannel::Email => json!({ "email": address }),
            OtpChannel::Phone => json!({ "phone": address }),
        };

        Self::send(self.post("otp").json(&body), RemoteErrorKind::OtpDispatchFailed).await?;

        Ok(())
    }

    #[instrument(skip(self, code))]
    async fn verify_otp(
        &self,
        channel: OtpChannel,
        address: &str,
        code: &str,
    ) -> Result<(), RemoteError> {
        let body = match channel {
            OtpChannel::Email => json!({ "email": address, "token": code, "type": channel.verify_type() }),
            OtpChannel::Phone => json!({ "phone": address, "token": code, "type": channel.verify_type() }),
        };

        Self::send(self.post("verify").json(&body), RemoteErrorKind::OtpVerifyFailed).await?;

        Ok(())
    }

    #[instrument(skip_all)]
    async fn current_session(&self, access_token: &str) -> Result<Option<Session>, RemoteError> {
        let kind = RemoteErrorKind::SessionLookupFailed;
        let response = self
            .get("user")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| RemoteError::new(kind, transport_message(&err)))?;

        // Unknown or expired tokens mean "no session", not an error.
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(RemoteError::new(kind, error_message(response).await));
        }

        let user: User = response
            .json()
            .await
            .map_err(|err| RemoteError::new(kind, format!("Invalid user response: {err}")))?;

        Ok(Some(Session::new(
            SecretString::from(access_token.to_string()),
            user,
        )))
    }

    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Session, RemoteError> {
        let kind = RemoteErrorKind::SignInFailed;
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
        });

        let response = Self::send(
            self.post("token")
                .query(&[("grant_type", "password")])
                .json(&body),
            kind,
        )
        .await?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| RemoteError::new(kind, format!("Invalid token response: {err}")))?;

        Ok(Session::new(SecretString::from(token.access_token), token.user))
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
        Self::send(
            self.post("logout").bearer_auth(access_token),
            RemoteErrorKind::SignOutFailed,
        )
        .await?;

        Ok(())
    }
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request timed out".to_string()
    } else {
        format!("Network error: {err}")
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    message_from_body(status, &body)
}

/// First string among the fields GoTrue uses for errors, else the status line.
fn message_from_body(status: StatusCode, body: &Value) -> String {
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str))
        .filter(|message| !message.trim().is_empty())
        .map_or_else(|| status.to_string(), str::to_string)
}
