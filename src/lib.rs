//! # Sura (Identity gateway for Sura Rentals)
//!
//! `sura` is the thin identity layer of the Sura Rentals car-rental marketplace.
//! Persistence, credential storage and OTP delivery belong to an external
//! backend-as-a-service; this crate only orchestrates calls against it.
//!
//! ## Signup
//!
//! New accounts go through a three step flow: details, a human check, then
//! OTP verification of both the email address and the phone number. The flow
//! is a small forward-only state machine (`signup::SignupFlow`) and every
//! outcome is reported through a `notify::NotificationSink`.
//!
//! ## Route protection
//!
//! `/dashboard` requires a session and `/admin` additionally requires the
//! `admin` role claim. The decision is a pure function (`guard::decide`) wrapped
//! by an axum middleware that resolves the session from the `sura_session`
//! cookie.

pub mod api;
pub mod auth;
pub mod cli;
pub mod error;
pub mod guard;
pub mod identity;
pub mod notify;
pub mod session;
pub mod signup;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
