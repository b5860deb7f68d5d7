use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_BACKEND_ANON_KEY: &str = "backend-anon-key";
pub const ARG_REQUEST_TIMEOUT: &str = "request-timeout";
pub const ARG_OTP_POLICY: &str = "otp-policy";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_VERBOSITY: &str = "verbosity";

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn validator_url() -> ValueParser {
    ValueParser::from(move |value: &str| -> std::result::Result<url::Url, String> {
        let url = url::Url::parse(value).map_err(|e| format!("invalid URL: {e}"))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(format!("unsupported URL scheme: {scheme}")),
        }
    })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    Command::new("sura")
        .about("Sura Rentals identity gateway")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("SURA_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long("backend-url")
                .help("Identity backend base URL, example: https://project.supabase.co")
                .env("SURA_BACKEND_URL")
                .value_parser(validator_url()),
        )
        .arg(
            Arg::new(ARG_BACKEND_ANON_KEY)
                .long("backend-anon-key")
                .help("Identity backend public (anon) key")
                .env("SURA_BACKEND_ANON_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_REQUEST_TIMEOUT)
                .long("request-timeout")
                .help("Timeout in seconds for every backend call")
                .default_value("10")
                .env("SURA_REQUEST_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..=300)),
        )
        .arg(
            Arg::new(ARG_OTP_POLICY)
                .long("otp-policy")
                .help("How email and phone OTP calls are issued: concurrent or short-circuit")
                .default_value("concurrent")
                .env("SURA_OTP_POLICY")
                .value_parser(["concurrent", "short-circuit"]),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long("cookie-secure")
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("SURA_COOKIE_SECURE")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SURA_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
