//! Maps validated CLI arguments to the action the binary executes.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, auth};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if a URL is malformed or the cookie secret is too short.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        public_url: auth_opts.public_url,
        cookie_secret: auth_opts.cookie_secret,
        xri_resolver: auth_opts.xri_resolver,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        ticket_ttl_seconds: auth_opts.ticket_ttl_seconds,
        nonce_max_age_seconds: auth_opts.nonce_max_age_seconds,
        landing_path: auth_opts.landing_path,
    }))
}
