use crate::{
    api::{self, AppState, CookieConfig},
    identity::{self, BackendConfig},
    signup::OtpPolicy,
    APP_USER_AGENT,
};
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub backend_url: Option<Url>,
    pub backend_anon_key: Option<SecretString>,
    pub request_timeout: Duration,
    pub otp_policy: OtpPolicy,
    pub cookie_secure: bool,
}

impl Args {
    #[must_use]
    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            url: self.backend_url.clone(),
            anon_key: self.backend_anon_key.clone(),
            timeout: self.request_timeout,
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let identity = match identity::connect(&args.backend()) {
        Ok(identity) => Some(identity),
        Err(err) => {
            warn!("{err}: set SURA_BACKEND_URL and SURA_BACKEND_ANON_KEY");
            None
        }
    };

    let cookie = CookieConfig {
        secure: args.cookie_secure,
        ..CookieConfig::default()
    };

    let state = AppState::new(identity, args.otp_policy, cookie);

    api::new(args.port, state).await
}

fn log_startup_args(args: &Args) {
    info!("Starting {APP_USER_AGENT}");
    debug!(
        port = args.port,
        backend_url = args.backend_url.as_ref().map_or("unset", Url::as_str),
        backend_anon_key = if args
            .backend_anon_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().is_empty())
        {
            "set"
        } else {
            "unset"
        },
        request_timeout_secs = args.request_timeout.as_secs(),
        otp_policy = ?args.otp_policy,
        cookie_secure = args.cookie_secure,
        "startup arguments"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_config_from_args() {
        let args = Args {
            port: 8080,
            backend_url: Some(Url::parse("https://project.supabase.co").unwrap()),
            backend_anon_key: Some(SecretString::from("anon-key")),
            request_timeout: Duration::from_secs(5),
            otp_policy: OtpPolicy::ShortCircuit,
            cookie_secure: false,
        };
        let backend = args.backend();
        assert!(backend.is_configured());
        assert_eq!(backend.timeout, Duration::from_secs(5));
    }
}
