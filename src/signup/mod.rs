//! Three step signup: details, human check, then OTP verification of both the
//! email address and the phone number.
//!
//! Flow Overview: `advance()` validates the details locally, then checks the
//! human answer and creates the account. `submit_details()` and
//! `submit_human_check()` take the step's input and run only that step. In the
//! OTP step `resend_otp()` and `verify()` talk to both channels under the
//! configured `OtpPolicy`. Steps only move forward. Every action emits exactly one notification.
//!
//! A flow allows one action at a time: while a call is outstanding any further
//! action fails with `FlowError::Busy` and issues nothing.

pub mod challenge;
pub mod validation;

pub use self::challenge::{new_challenge, HumanChallenge};

use crate::{
    error::{ConfigurationError, FlowError, RemoteError, RemoteErrorKind, ValidationError},
    identity::{IdentityService, OtpChannel, ProfileMetadata},
    notify::{NotificationSink, Severity},
};
use rand::{rngs::StdRng, SeedableRng};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

/// Marketplace locations; the first is the signup default.
pub const LOCATIONS: [&str; 6] = ["Colombo", "Kandy", "Galle", "Negombo", "Jaffna", "Matara"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Details = 1,
    HumanCheck = 2,
    OtpVerify = 3,
    /// Both channels verified; the user continues in the authenticated area.
    Verified = 4,
}

/// What to do when one of the two OTP calls fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OtpPolicy {
    /// Issue both calls regardless of each other; report the email failure
    /// first when both fail.
    #[default]
    Concurrent,
    /// Email first; a failed email call skips the phone call.
    ShortCircuit,
}

impl FromStr for OtpPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "short-circuit" | "short_circuit" | "sequential" => Ok(Self::ShortCircuit),
            _ => Err(format!("invalid otp policy: {value}")),
        }
    }
}

impl OtpPolicy {
    async fn run<E, P>(self, email: E, phone: P) -> Result<(), RemoteError>
    where
        E: Future<Output = Result<(), RemoteError>>,
        P: Future<Output = Result<(), RemoteError>>,
    {
        match self {
            Self::ShortCircuit => {
                email.await?;
                phone.await
            }
            Self::Concurrent => {
                let (email, phone) = tokio::join!(email, phone);
                email.and(phone)
            }
        }
    }
}

/// Form input collected during the flow. Held in memory only.
#[derive(Clone, Debug)]
pub struct SignupDraft {
    pub full_name: String,
    pub location: String,
    pub email: String,
    pub phone: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub human_answer: String,
}

impl Default for SignupDraft {
    fn default() -> Self {
        Self {
            full_name: String::new(),
            location: LOCATIONS[0].to_string(),
            email: String::new(),
            phone: String::new(),
            password: SecretString::default(),
            confirm_password: SecretString::default(),
            human_answer: String::new(),
        }
    }
}

impl SignupDraft {
    fn profile(&self) -> ProfileMetadata {
        ProfileMetadata {
            full_name: self.full_name.trim().to_string(),
            location: self.location.clone(),
            phone: self.phone.trim().to_string(),
        }
    }
}

/// Codes typed in the OTP step. Consumed by a single `verify` call.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpPair {
    pub email_otp: String,
    pub phone_otp: String,
}

struct Inner {
    state: FlowState,
    draft: SignupDraft,
    challenge: Option<HumanChallenge>,
    rng: StdRng,
}

pub struct SignupFlow {
    inner: Mutex<Inner>,
    in_flight: AtomicBool,
    identity: Option<Arc<dyn IdentityService>>,
    sink: Arc<dyn NotificationSink>,
    policy: OtpPolicy,
}

/// Holds the in-flight flag for the duration of one action.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

const NOT_CONFIGURED: &str = "Backend not configured";

impl SignupFlow {
    /// Start a flow in `Details`. `identity` is `None` when the backend is not
    /// configured; remote-dependent actions then fail with `ConfigurationError`.
    #[must_use]
    pub fn new(
        identity: Option<Arc<dyn IdentityService>>,
        sink: Arc<dyn NotificationSink>,
        policy: OtpPolicy,
    ) -> Self {
        Self::with_rng(identity, sink, policy, StdRng::from_entropy())
    }

    #[must_use]
    pub fn with_rng(
        identity: Option<Arc<dyn IdentityService>>,
        sink: Arc<dyn NotificationSink>,
        policy: OtpPolicy,
        rng: StdRng,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: FlowState::Details,
                draft: SignupDraft::default(),
                challenge: None,
                rng,
            }),
            in_flight: AtomicBool::new(false),
            identity,
            sink,
            policy,
        }
    }

    pub fn state(&self) -> FlowState {
        self.lock().state
    }

    /// Challenge currently shown, present from `HumanCheck` on.
    pub fn challenge(&self) -> Option<HumanChallenge> {
        self.lock().challenge.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Edit the draft in place, e.g. from form input.
    pub fn edit_draft(&self, edit: impl FnOnce(&mut SignupDraft)) {
        edit(&mut self.lock().draft);
    }

    pub fn set_human_answer(&self, answer: &str) {
        self.lock().draft.human_answer = answer.to_string();
    }

    pub fn human_answer(&self) -> String {
        self.lock().draft.human_answer.clone()
    }

    /// Move to the next step.
    ///
    /// # Errors
    /// `Validation` for local checks, `Configuration` without a backend,
    /// `Remote` when account creation fails, `Busy` or `InvalidStep`.
    #[instrument(skip(self))]
    pub async fn advance(&self) -> Result<FlowState, FlowError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            return Err(self.busy());
        };

        match self.state() {
            FlowState::Details => self.accept_details(),
            FlowState::HumanCheck => self.check_human_answer().await,
            step => Err(self.wrong_step(step)),
        }
    }

    /// Apply `edit` to the draft and leave `Details`. The draft is untouched
    /// unless the flow is idle and in `Details`.
    ///
    /// # Errors
    /// `Validation` for the phone or password checks, `Busy` or `InvalidStep`.
    #[instrument(skip_all)]
    pub async fn submit_details(
        &self,
        edit: impl FnOnce(&mut SignupDraft),
    ) -> Result<FlowState, FlowError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            return Err(self.busy());
        };
        {
            let mut inner = self.lock();
            if inner.state != FlowState::Details {
                let step = inner.state;
                drop(inner);
                return Err(self.wrong_step(step));
            }
            edit(&mut inner.draft);
        }

        self.accept_details()
    }

    /// Record `answer` and run the human check. Only valid in `HumanCheck`.
    ///
    /// # Errors
    /// `Validation` for a wrong answer, `Configuration`, `Remote`, `Busy` or
    /// `InvalidStep`.
    #[instrument(skip_all)]
    pub async fn submit_human_check(&self, answer: &str) -> Result<FlowState, FlowError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            return Err(self.busy());
        };
        {
            let mut inner = self.lock();
            if inner.state != FlowState::HumanCheck {
                let step = inner.state;
                drop(inner);
                return Err(self.wrong_step(step));
            }
            inner.draft.human_answer = answer.to_string();
        }

        self.check_human_answer().await
    }

    /// Ask the backend to send fresh codes to both channels. Never changes the
    /// step.
    ///
    /// # Errors
    /// `Configuration`, `Remote`, `Busy`, or `InvalidStep` outside `OtpVerify`.
    #[instrument(skip(self))]
    pub async fn resend_otp(&self) -> Result<(), FlowError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            return Err(self.busy());
        };
        let identity = self.otp_step_identity("Add environment variables to send OTP codes.")?;
        let (email, phone) = self.addresses();

        let result = self
            .policy
            .run(
                identity.dispatch_otp(OtpChannel::Email, &email),
                identity.dispatch_otp(OtpChannel::Phone, &phone),
            )
            .await;

        match result {
            Ok(()) => {
                self.notify("OTP sent", "Check your email and SMS inbox.", Severity::Success);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "otp dispatch failed");
                let err = err.with_kind(RemoteErrorKind::OtpDispatchFailed);
                self.notify("Unable to send OTP", &err.message, Severity::Error);
                Err(err.into())
            }
        }
    }

    /// Check both codes. On success the flow reaches `Verified`; on failure it
    /// stays in `OtpVerify` so the user may retry.
    ///
    /// # Errors
    /// `Configuration`, `Remote`, `Busy`, or `InvalidStep` outside `OtpVerify`.
    #[instrument(skip_all)]
    pub async fn verify(&self, codes: OtpPair) -> Result<FlowState, FlowError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            return Err(self.busy());
        };
        let identity = self.otp_step_identity("Add environment variables to verify OTP codes.")?;
        let (email, phone) = self.addresses();
        let OtpPair {
            email_otp,
            phone_otp,
        } = codes;

        let result = self
            .policy
            .run(
                identity.verify_otp(OtpChannel::Email, &email, email_otp.trim()),
                identity.verify_otp(OtpChannel::Phone, &phone, phone_otp.trim()),
            )
            .await;

        match result {
            Ok(()) => {
                self.lock().state = FlowState::Verified;
                info!("signup verified");
                self.notify(
                    "Verified successfully",
                    "Welcome to Sura Rentals.",
                    Severity::Success,
                );
                Ok(FlowState::Verified)
            }
            Err(err) => {
                warn!(error = %err, "otp verification failed");
                let err = err.with_kind(RemoteErrorKind::OtpVerifyFailed);
                self.notify("Verification failed", &err.message, Severity::Error);
                Err(err.into())
            }
        }
    }

    fn accept_details(&self) -> Result<FlowState, FlowError> {
        let mut inner = self.lock();
        let draft = &inner.draft;

        if let Err(err) =
            validation::validate_details(&draft.phone, &draft.password, &draft.confirm_password)
        {
            drop(inner);
            match err {
                ValidationError::InvalidPhone => self.notify(
                    "Invalid phone number",
                    "Use an international format like +94771234567.",
                    Severity::Error,
                ),
                _ => self.notify(
                    "Passwords do not match",
                    "Please confirm your password before continuing.",
                    Severity::Error,
                ),
            }
            return Err(err.into());
        }

        let challenge = new_challenge(&mut inner.rng);
        inner.challenge = Some(challenge);
        inner.state = FlowState::HumanCheck;
        drop(inner);

        debug!("details accepted");
        self.notify(
            "Details saved",
            "Answer the human check to continue.",
            Severity::Info,
        );

        Ok(FlowState::HumanCheck)
    }

    async fn check_human_answer(&self) -> Result<FlowState, FlowError> {
        let (email, password, profile) = {
            let mut inner = self.lock();
            let accepted = inner
                .challenge
                .as_ref()
                .is_some_and(|challenge| challenge.accepts(&inner.draft.human_answer));

            if !accepted {
                // A failed answer never gets a second try on the same question.
                inner.draft.human_answer.clear();
                let challenge = new_challenge(&mut inner.rng);
                inner.challenge = Some(challenge);
                drop(inner);

                self.notify(
                    "Human check failed",
                    "Please answer the verification question correctly.",
                    Severity::Error,
                );
                return Err(ValidationError::HumanCheckFailed.into());
            }

            (
                inner.draft.email.trim().to_string(),
                inner.draft.password.clone(),
                inner.draft.profile(),
            )
        };

        let Some(identity) = self.identity.clone() else {
            self.notify(
                NOT_CONFIGURED,
                "Add environment variables before signing up.",
                Severity::Error,
            );
            return Err(ConfigurationError.into());
        };

        if let Err(err) = identity.create_account(&email, &password, &profile).await {
            warn!(error = %err, "account creation failed");
            let err = err.with_kind(RemoteErrorKind::SignupFailed);
            self.notify("Signup failed", &err.message, Severity::Error);
            return Err(err.into());
        }

        self.lock().state = FlowState::OtpVerify;
        info!("account created");
        self.notify(
            "Account created",
            "We sent OTP codes to your email and phone.",
            Severity::Success,
        );

        Ok(FlowState::OtpVerify)
    }

    /// Identity client for an OTP action, after checking the step.
    fn otp_step_identity(
        &self,
        not_configured: &str,
    ) -> Result<Arc<dyn IdentityService>, FlowError> {
        let step = self.state();
        if step != FlowState::OtpVerify {
            return Err(self.wrong_step(step));
        }

        self.identity.clone().ok_or_else(|| {
            self.notify(NOT_CONFIGURED, not_configured, Severity::Error);
            ConfigurationError.into()
        })
    }

    fn addresses(&self) -> (String, String) {
        let inner = self.lock();
        (
            inner.draft.email.trim().to_string(),
            inner.draft.phone.trim().to_string(),
        )
    }

    fn busy(&self) -> FlowError {
        self.notify(
            "Request in progress",
            "Please wait for the current request to finish.",
            Severity::Info,
        );
        FlowError::Busy
    }

    fn wrong_step(&self, step: FlowState) -> FlowError {
        self.notify(
            "Step unavailable",
            "This action is not available at the current step.",
            Severity::Error,
        );
        FlowError::InvalidStep(step)
    }

    fn notify(&self, title: &str, description: &str, severity: Severity) {
        self.sink.notify(title, Some(description), severity);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
