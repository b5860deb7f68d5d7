//! In-memory `IdentityService` for tests. Every call is recorded as
//! `"<operation>[:<channel>]:<address>"`; failures are scripted per operation.

use super::{IdentityService, OtpChannel, ProfileMetadata, Session, User};
use crate::error::{RemoteError, RemoteErrorKind};
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc, sync::Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeIdentity {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, String>>,
    sessions: Mutex<HashMap<String, User>>,
    profiles: Mutex<Vec<ProfileMetadata>>,
    gate: Option<Arc<Notify>>,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create_account` waits for a permit on `gate` before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Make `operation` (e.g. `"verify_otp:email"`) fail with `message`.
    pub fn fail(&self, operation: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation.to_string(), message.to_string());
    }

    pub fn with_session(self, token: &str, user: User) -> Self {
        self.sessions.lock().unwrap().insert(token.to_string(), user);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn profiles(&self) -> Vec<ProfileMetadata> {
        self.profiles.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn outcome(&self, operation: &str, kind: RemoteErrorKind) -> Result<(), RemoteError> {
        match self.failures.lock().unwrap().get(operation) {
            Some(message) => Err(RemoteError::new(kind, message.clone())),
            None => Ok(()),
        }
    }
}

pub fn user_with_metadata(app_metadata: Value, user_metadata: Value) -> User {
    User {
        id: Uuid::new_v4(),
        email: Some("renter@sura.lk".to_string()),
        phone: Some("+94771234567".to_string()),
        app_metadata,
        user_metadata,
    }
}

pub fn renter() -> User {
    user_with_metadata(json!({"provider": "email"}), json!({"full_name": "Nimal Perera"}))
}

pub fn admin() -> User {
    user_with_metadata(json!({"role": "admin"}), json!({}))
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn create_account(
        &self,
        email: &str,
        _password: &SecretString,
        profile: &ProfileMetadata,
    ) -> Result<(), RemoteError> {
        self.record(format!("create_account:{email}"));
        self.profiles.lock().unwrap().push(profile.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome("create_account", RemoteErrorKind::SignupFailed)
    }

    async fn dispatch_otp(&self, channel: OtpChannel, address: &str) -> Result<(), RemoteError> {
        self.record(format!("dispatch_otp:{channel}:{address}"));
        self.outcome(
            &format!("dispatch_otp:{channel}"),
            RemoteErrorKind::OtpDispatchFailed,
        )
    }

    async fn verify_otp(
        &self,
        channel: OtpChannel,
        address: &str,
        code: &str,
    ) -> Result<(), RemoteError> {
        self.record(format!("verify_otp:{channel}:{address}:{code}"));
        self.outcome(
            &format!("verify_otp:{channel}"),
            RemoteErrorKind::OtpVerifyFailed,
        )
    }

    async fn current_session(&self, access_token: &str) -> Result<Option<Session>, RemoteError> {
        self.record("current_session".to_string());
        self.outcome("current_session", RemoteErrorKind::SessionLookupFailed)?;
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(access_token)
            .cloned()
            .map(|user| Session::new(SecretString::from(access_token.to_string()), user)))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &SecretString,
    ) -> Result<Session, RemoteError> {
        self.record(format!("sign_in:{email}"));
        self.outcome("sign_in", RemoteErrorKind::SignInFailed)?;
        let mut user = renter();
        user.email = Some(email.to_string());
        let token = format!("token-{}", user.id);
        self.sessions
            .lock()
            .unwrap()
            .insert(token.clone(), user.clone());
        Ok(Session::new(SecretString::from(token), user))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), RemoteError> {
        self.record("sign_out".to_string());
        self.outcome("sign_out", RemoteErrorKind::SignOutFailed)?;
        self.sessions.lock().unwrap().remove(access_token);
        Ok(())
    }
}
