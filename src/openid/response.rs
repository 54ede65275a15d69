use url::Url;

use super::{ax::FetchResponse, error::ProtocolError, identifier::Identifier};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthenticationStatus {
    Authenticated,
    Canceled,
    Failed,
    SetupRequired,
}

/// A verified positive assertion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositiveAssertion {
    pub claimed_identifier: String,
    pub friendly_identifier: String,
    pub provider_endpoint: Url,
    /// Attribute exchange data, read only from signed fields.
    pub fetch_response: Option<FetchResponse>,
}

impl PositiveAssertion {
    #[must_use]
    pub fn new(claimed_identifier: impl Into<String>, provider_endpoint: Url) -> Self {
        let claimed_identifier = claimed_identifier.into();
        Self {
            friendly_identifier: friendly_identifier(&claimed_identifier),
            claimed_identifier,
            provider_endpoint,
            fetch_response: None,
        }
    }

    #[must_use]
    pub fn with_fetch_response(mut self, fetch_response: FetchResponse) -> Self {
        self.fetch_response = Some(fetch_response);
        self
    }
}

/// Outcome of a provider's response to an authentication request.
#[derive(Debug)]
pub enum AuthenticationResponse {
    Authenticated(PositiveAssertion),
    Canceled,
    Failed(ProtocolError),
    SetupRequired { user_setup_url: Option<Url> },
}

impl AuthenticationResponse {
    #[must_use]
    pub fn status(&self) -> AuthenticationStatus {
        match self {
            Self::Authenticated(_) => AuthenticationStatus::Authenticated,
            Self::Canceled => AuthenticationStatus::Canceled,
            Self::Failed(_) => AuthenticationStatus::Failed,
            Self::SetupRequired { .. } => AuthenticationStatus::SetupRequired,
        }
    }
}

/// A shortened form of a claimed identifier suitable for display.
///
/// `http://alice.example.com/` becomes `alice.example.com`; XRIs are returned as-is.
#[must_use]
pub fn friendly_identifier(claimed: &str) -> String {
    let Ok(Identifier::Uri(mut url)) = Identifier::parse(claimed) else {
        return claimed.to_string();
    };
    url.set_fragment(None);

    let mut value = url.to_string();
    if url.path() == "/" && url.query().is_none() {
        value.truncate(value.len() - 1);
    }
    match value.strip_prefix("http://") {
        Some(rest) => rest.to_string(),
        None => value,
    }
}
