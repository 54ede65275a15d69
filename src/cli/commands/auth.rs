use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_PUBLIC_URL: &str = "public-url";
pub const ARG_COOKIE_SECRET: &str = "cookie-secret";
pub const ARG_XRI_RESOLVER: &str = "xri-resolver";
pub const ARG_SESSION_TTL: &str = "session-ttl-seconds";
pub const ARG_TICKET_TTL: &str = "ticket-ttl-seconds";
pub const ARG_NONCE_MAX_AGE: &str = "nonce-max-age-seconds";
pub const ARG_LANDING_PATH: &str = "landing-path";

const MIN_COOKIE_SECRET_LEN: usize = 32;

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PUBLIC_URL)
                .long(ARG_PUBLIC_URL)
                .help("Public base URL of this service, used for return_to and realm")
                .env("OPENID_RP_PUBLIC_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECRET)
                .long(ARG_COOKIE_SECRET)
                .help("Secret used to sign the identity cookie (at least 32 characters)")
                .env("OPENID_RP_COOKIE_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_XRI_RESOLVER)
                .long(ARG_XRI_RESOLVER)
                .help("XRI proxy resolver used to discover XRI identifiers")
                .env("OPENID_RP_XRI_RESOLVER")
                .default_value(crate::auth::state::DEFAULT_XRI_RESOLVER),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Idle session TTL in seconds")
                .env("OPENID_RP_SESSION_TTL_SECONDS")
                .default_value("1200")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_TICKET_TTL)
                .long(ARG_TICKET_TTL)
                .help("Identity cookie lifetime in seconds")
                .env("OPENID_RP_TICKET_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_NONCE_MAX_AGE)
                .long(ARG_NONCE_MAX_AGE)
                .help("Maximum age of a provider response nonce in seconds")
                .env("OPENID_RP_NONCE_MAX_AGE_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_LANDING_PATH)
                .long(ARG_LANDING_PATH)
                .help("Where to send users after sign-in when no returnUrl was given")
                .env("OPENID_RP_LANDING_PATH")
                .default_value("/"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub public_url: Url,
    pub cookie_secret: SecretString,
    pub xri_resolver: Url,
    pub session_ttl_seconds: u64,
    pub ticket_ttl_seconds: u64,
    pub nonce_max_age_seconds: u64,
    pub landing_path: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a URL is malformed or the cookie secret is too short.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let public_url = http_url(matches, ARG_PUBLIC_URL)?;
        let xri_resolver = http_url(matches, ARG_XRI_RESOLVER)?;

        let cookie_secret = matches
            .get_one::<String>(ARG_COOKIE_SECRET)
            .cloned()
            .context("missing required argument: --cookie-secret")?;
        if cookie_secret.len() < MIN_COOKIE_SECRET_LEN {
            return Err(anyhow!(
                "--{ARG_COOKIE_SECRET} must be at least {MIN_COOKIE_SECRET_LEN} characters"
            ));
        }

        let landing_path = matches
            .get_one::<String>(ARG_LANDING_PATH)
            .cloned()
            .unwrap_or_else(|| "/".to_string());
        if !landing_path.starts_with('/') {
            return Err(anyhow!("--{ARG_LANDING_PATH} must start with '/'"));
        }

        Ok(Self {
            public_url,
            cookie_secret: SecretString::from(cookie_secret),
            xri_resolver,
            session_ttl_seconds: seconds(matches, ARG_SESSION_TTL),
            ticket_ttl_seconds: seconds(matches, ARG_TICKET_TTL),
            nonce_max_age_seconds: seconds(matches, ARG_NONCE_MAX_AGE),
            landing_path,
        })
    }
}

fn http_url(matches: &ArgMatches, name: &str) -> Result<Url> {
    let value = matches
        .get_one::<String>(name)
        .with_context(|| format!("missing required argument: --{name}"))?;
    let url = Url::parse(value).with_context(|| format!("invalid --{name}: {value}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(anyhow!("--{name} must be an http(s) URL: {value}"));
    }
    Ok(url)
}

fn seconds(matches: &ArgMatches, name: &str) -> u64 {
    matches.get_one::<u64>(name).copied().unwrap_or_default()
}
