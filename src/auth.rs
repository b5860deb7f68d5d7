//! Password login and logout against the identity service.

use crate::{
    error::{ConfigurationError, FlowError, RemoteErrorKind, SessionError},
    identity::{IdentityService, Session},
    notify::{NotificationSink, Severity},
    session::SessionContext,
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const NOT_CONFIGURED: &str = "Backend not configured";

/// Sign in with email and password, publishing the session to `context` when
/// one is given.
///
/// # Errors
/// `Configuration` without a backend, `Remote` when the credentials are
/// rejected or the call fails.
#[instrument(skip(identity, sink, password, context))]
pub async fn sign_in(
    identity: Option<&Arc<dyn IdentityService>>,
    sink: &dyn NotificationSink,
    email: &str,
    password: &SecretString,
    context: Option<&SessionContext>,
) -> Result<Session, FlowError> {
    let Some(identity) = identity else {
        sink.notify(
            NOT_CONFIGURED,
            Some("Add environment variables before logging in."),
            Severity::Error,
        );
        return Err(ConfigurationError.into());
    };

    match identity.sign_in_with_password(email.trim(), password).await {
        Ok(session) => {
            info!(user_id = %session.user.id, "signed in");
            if let Some(context) = context {
                context.set_session(session.clone());
            }
            sink.notify(
                "Welcome back",
                Some("Redirecting you to your dashboard."),
                Severity::Success,
            );
            Ok(session)
        }
        Err(err) => {
            warn!(error = %err, "sign in failed");
            let err = err.with_kind(RemoteErrorKind::SignInFailed);
            sink.notify("Login failed", Some(&err.message), Severity::Error);
            Err(err.into())
        }
    }
}

/// Revoke `access_token`. The local session in `context` is cleared only when
/// the backend accepted the logout.
///
/// # Errors
/// `Configuration` without a backend, `Remote` when the call fails.
#[instrument(skip_all)]
pub async fn sign_out(
    identity: Option<&Arc<dyn IdentityService>>,
    sink: &dyn NotificationSink,
    access_token: &str,
    context: Option<&SessionContext>,
) -> Result<(), FlowError> {
    let Some(identity) = identity else {
        sink.notify(
            NOT_CONFIGURED,
            Some("Add environment variables before logging out."),
            Severity::Error,
        );
        return Err(ConfigurationError.into());
    };

    if let Err(err) = identity.sign_out(access_token).await {
        warn!(error = %err, "sign out failed");
        let err = err.with_kind(RemoteErrorKind::SignOutFailed);
        sink.notify("Unable to log out", Some(&err.message), Severity::Error);
        return Err(err.into());
    }

    if let Some(context) = context {
        context.clear_session();
    }
    info!("signed out");
    sink.notify(
        "Signed out",
        Some("You have been logged out securely."),
        Severity::Success,
    );
    Ok(())
}

/// # Errors
/// `SessionError` when nobody is signed in.
pub fn require_session(session: Option<&Session>) -> Result<&Session, SessionError> {
    session.ok_or(SessionError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::RemoteError,
        identity::fake::{renter, FakeIdentity},
        notify::ToastQueue,
    };

    fn service(fake: FakeIdentity) -> (Arc<FakeIdentity>, Arc<dyn IdentityService>) {
        let fake = Arc::new(fake);
        let service: Arc<dyn IdentityService> = fake.clone();
        (fake, service)
    }

    #[tokio::test]
    async fn sign_in_publishes_session() {
        let (fake, identity) = service(FakeIdentity::new());
        let toasts = ToastQueue::new();
        let context = SessionContext::new();

        let session = sign_in(
            Some(&identity),
            &toasts,
            " nimal@sura.lk ",
            &SecretString::from("Secret123"),
            Some(&context),
        )
        .await
        .unwrap();

        assert_eq!(session.user.email.as_deref(), Some("nimal@sura.lk"));
        assert_eq!(fake.calls(), vec!["sign_in:nimal@sura.lk"]);
        assert_eq!(
            context.current().map(|s| s.token().to_string()),
            Some(session.token().to_string())
        );

        let toasts = toasts.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, "Welcome back");
    }

    #[tokio::test]
    async fn sign_in_failure_passes_message_through() {
        let fake = FakeIdentity::new();
        fake.fail("sign_in", "Invalid login credentials");
        let (_, identity) = service(fake);
        let toasts = ToastQueue::new();
        let context = SessionContext::new();

        let err = sign_in(
            Some(&identity),
            &toasts,
            "nimal@sura.lk",
            &SecretString::from("wrong"),
            Some(&context),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err,
            FlowError::Remote(RemoteError::new(
                RemoteErrorKind::SignInFailed,
                "Invalid login credentials"
            ))
        );
        assert!(context.current().is_none());

        let toasts = toasts.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, "Login failed");
        assert_eq!(
            toasts[0].description.as_deref(),
            Some("Invalid login credentials")
        );
    }

    #[tokio::test]
    async fn missing_backend_reports_configuration() {
        let toasts = ToastQueue::new();

        let err = sign_in(None, &toasts, "a@b.lk", &SecretString::from("x"), None)
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::Configuration(ConfigurationError));

        let err = sign_out(None, &toasts, "token", None).await.unwrap_err();
        assert_eq!(err, FlowError::Configuration(ConfigurationError));

        let descriptions: Vec<_> = toasts
            .drain()
            .into_iter()
            .map(|t| t.description.unwrap_or_default())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                "Add environment variables before logging in.",
                "Add environment variables before logging out."
            ]
        );
    }

    #[tokio::test]
    async fn sign_out_clears_context() {
        let (fake, identity) = service(FakeIdentity::new().with_session("token-1", renter()));
        let toasts = ToastQueue::new();
        let context = SessionContext::new();
        context.set_session(Session::new(SecretString::from("token-1"), renter()));

        sign_out(Some(&identity), &toasts, "token-1", Some(&context))
            .await
            .unwrap();

        assert!(context.current().is_none());
        assert_eq!(fake.calls(), vec!["sign_out"]);
        assert!(matches!(identity.current_session("token-1").await, Ok(None)));
        assert_eq!(toasts.drain()[0].title, "Signed out");
    }

    #[tokio::test]
    async fn failed_sign_out_keeps_context() {
        let fake = FakeIdentity::new();
        fake.fail("sign_out", "Network error: connection refused");
        let (_, identity) = service(fake);
        let toasts = ToastQueue::new();
        let context = SessionContext::new();
        context.set_session(Session::new(SecretString::from("token-1"), renter()));

        assert!(sign_out(Some(&identity), &toasts, "token-1", Some(&context))
            .await
            .is_err());
        assert!(context.current().is_some());

        let toasts = toasts.drain();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].title, "Unable to log out");
    }

    #[test]
    fn require_session_rejects_anonymous() {
        assert_eq!(require_session(None).unwrap_err(), SessionError);
        let session = Session::new(SecretString::from("t"), renter());
        assert!(require_session(Some(&session)).is_ok());
    }
}
