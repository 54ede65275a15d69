use crate::{
    api,
    auth::{AuthConfig, AuthState},
    cli::telemetry,
    openid::OpenIdRelyingParty,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub public_url: Url,
    pub cookie_secret: SecretString,
    pub xri_resolver: Url,
    pub session_ttl_seconds: u64,
    pub ticket_ttl_seconds: u64,
    pub nonce_max_age_seconds: u64,
    pub landing_path: String,
}

impl Args {
    fn auth_config(self) -> AuthConfig {
        AuthConfig::new(self.public_url, self.cookie_secret)
            .with_xri_resolver(self.xri_resolver)
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_ticket_ttl_seconds(self.ticket_ttl_seconds)
            .with_nonce_max_age_seconds(self.nonce_max_age_seconds)
            .with_landing_path(self.landing_path)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the HTTP client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let port = args.port;
    let config = args.auth_config();
    debug!("Auth config: {:?}", config);

    let relying_party = OpenIdRelyingParty::new(
        config.realm(),
        config.xri_resolver().clone(),
        config.nonce_max_age_seconds(),
    )
    .context("Failed to build OpenID HTTP client")?;

    info!(realm = %relying_party.realm(), "OpenID relying party ready");

    let auth_state = Arc::new(AuthState::new(config, Arc::new(relying_party)));

    let result = api::new(port, auth_state).await;

    telemetry::shutdown_tracer();

    result
}
