use crate::{
    cli::{
        actions::{server::Args, Action},
        commands::{
            ARG_BACKEND_ANON_KEY, ARG_BACKEND_URL, ARG_COOKIE_SECURE, ARG_OTP_POLICY, ARG_PORT,
            ARG_REQUEST_TIMEOUT,
        },
    },
    identity::DEFAULT_REQUEST_TIMEOUT,
    signup::OtpPolicy,
};
use anyhow::{anyhow, Result};
use secrecy::SecretString;
use std::time::Duration;

/// # Errors
/// Returns an error if an argument cannot be interpreted.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let backend_url = matches.get_one::<url::Url>(ARG_BACKEND_URL).cloned();
    let backend_anon_key = matches
        .get_one::<String>(ARG_BACKEND_ANON_KEY)
        .map(|key| SecretString::from(key.clone()));
    let request_timeout = matches
        .get_one::<u64>(ARG_REQUEST_TIMEOUT)
        .map_or(DEFAULT_REQUEST_TIMEOUT, |secs| Duration::from_secs(*secs));
    let otp_policy = matches
        .get_one::<String>(ARG_OTP_POLICY)
        .map(|policy| policy.parse::<OtpPolicy>())
        .transpose()
        .map_err(|e| anyhow!(e))?
        .unwrap_or_default();
    let cookie_secure = matches.get_flag(ARG_COOKIE_SECURE);

    Ok(Action::Server(Args {
        port,
        backend_url,
        backend_anon_key,
        request_timeout,
        otp_policy,
        cookie_secure,
    }))
}
