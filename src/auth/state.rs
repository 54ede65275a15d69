//! Auth configuration and shared state.

use axum::http::Uri;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use url::Url;

use super::{cookie::TicketSigner, session::SessionStore};
use crate::openid::RelyingParty;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 20 * 60;
const DEFAULT_TICKET_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_NONCE_MAX_AGE_SECONDS: u64 = 5 * 60;
const DEFAULT_LANDING_PATH: &str = "/";
pub const DEFAULT_XRI_RESOLVER: &str = "https://xri.net/";

#[derive(Debug)]
pub struct AuthConfig {
    public_base_url: Url,
    cookie_secret: SecretString,
    xri_resolver: Url,
    session_ttl_seconds: u64,
    ticket_ttl_seconds: u64,
    nonce_max_age_seconds: u64,
    landing_path: String,
}

impl AuthConfig {
    /// `public_base_url` is the origin browsers and providers use to reach this service.
    #[must_use]
    pub fn new(public_base_url: Url, cookie_secret: SecretString) -> Self {
        let xri_resolver =
            Url::parse(DEFAULT_XRI_RESOLVER).unwrap_or_else(|_| public_base_url.clone());
        Self {
            public_base_url,
            cookie_secret,
            xri_resolver,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            ticket_ttl_seconds: DEFAULT_TICKET_TTL_SECONDS,
            nonce_max_age_seconds: DEFAULT_NONCE_MAX_AGE_SECONDS,
            landing_path: DEFAULT_LANDING_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_xri_resolver(mut self, resolver: Url) -> Self {
        self.xri_resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_ticket_ttl_seconds(mut self, seconds: u64) -> Self {
        self.ticket_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_nonce_max_age_seconds(mut self, seconds: u64) -> Self {
        self.nonce_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_landing_path(mut self, path: String) -> Self {
        self.landing_path = path;
        self
    }

    #[must_use]
    pub fn public_base_url(&self) -> &Url {
        &self.public_base_url
    }

    #[must_use]
    pub fn xri_resolver(&self) -> &Url {
        &self.xri_resolver
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn ticket_ttl_seconds(&self) -> u64 {
        self.ticket_ttl_seconds
    }

    #[must_use]
    pub fn nonce_max_age_seconds(&self) -> u64 {
        self.nonce_max_age_seconds
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    pub(crate) fn cookie_secret(&self) -> &SecretString {
        &self.cookie_secret
    }

    /// The realm sent to providers: the root of the public base URL.
    #[must_use]
    pub fn realm(&self) -> Url {
        let mut realm = self.public_base_url.clone();
        realm.set_path("/");
        realm.set_query(None);
        realm.set_fragment(None);
        realm
    }

    /// Absolute URL of an inbound request as seen from outside.
    #[must_use]
    pub fn request_url(&self, uri: &Uri) -> Url {
        let mut url = self.public_base_url.clone();
        url.set_path(uri.path());
        url.set_query(uri.query());
        url.set_fragment(None);
        url
    }

    // Only mark cookies secure when the service is reached over HTTPS.
    pub(crate) fn cookie_secure(&self) -> bool {
        self.public_base_url.scheme() == "https"
    }
}

pub struct AuthState {
    config: AuthConfig,
    relying_party: Arc<dyn RelyingParty>,
    sessions: SessionStore,
    signer: TicketSigner,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, relying_party: Arc<dyn RelyingParty>) -> Self {
        let sessions = SessionStore::new(Duration::from_secs(config.session_ttl_seconds()));
        let signer = TicketSigner::new(config.cookie_secret(), config.ticket_ttl_seconds());
        Self {
            config,
            relying_party,
            sessions,
            signer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn relying_party(&self) -> &dyn RelyingParty {
        self.relying_party.as_ref()
    }

    pub(crate) fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(crate) fn signer(&self) -> &TicketSigner {
        &self.signer
    }
}
