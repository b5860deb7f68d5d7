//! Error taxonomy shared by the signup flow, the auth operations and the guard.
//!
//! Every variant is terminal for the step that produced it: nothing is retried
//! automatically and the flow stays interactive after any failure.

use crate::signup::FlowState;
use std::fmt;
use thiserror::Error;

/// Local, pre-network failures. Always recoverable by re-prompting.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid phone number")]
    InvalidPhone,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("human check failed")]
    HumanCheckFailed,
}

/// Backend credentials or endpoint are absent.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("backend not configured")]
pub struct ConfigurationError;

/// No authenticated user where one is required.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("login required")]
pub struct SessionError;

/// Which identity call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteErrorKind {
    SignupFailed,
    OtpDispatchFailed,
    OtpVerifyFailed,
    SignInFailed,
    SignOutFailed,
    SessionLookupFailed,
    Transport,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SignupFailed => "signup failed",
            Self::OtpDispatchFailed => "otp dispatch failed",
            Self::OtpVerifyFailed => "otp verification failed",
            Self::SignInFailed => "sign in failed",
            Self::SignOutFailed => "sign out failed",
            Self::SessionLookupFailed => "session lookup failed",
            Self::Transport => "transport error",
        };
        formatter.write_str(label)
    }
}

/// Failure returned by the identity service. The message is passed through
/// verbatim so it can be shown to the user as-is.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Re-labels the error for the operation that observed it, keeping the
    /// original message.
    #[must_use]
    pub fn with_kind(mut self, kind: RemoteErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Everything a signup or auth action can fail with.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("another request is still in progress")]
    Busy,
    #[error("action not available in step {0:?}")]
    InvalidStep(FlowState),
}
