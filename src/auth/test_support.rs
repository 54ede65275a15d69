//! Shared helpers for flow and handler tests.

use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;
use url::Url;

use super::state::{AuthConfig, AuthState};
use crate::openid::{
    AuthenticationRequest, AuthenticationResponse, DiscoveryError, EndpointKind, Identifier,
    RelyingParty, ServiceEndpoint,
    error::DiscoveryFailure,
};

type Responder = dyn Fn(&[(String, String)]) -> Option<AuthenticationResponse> + Send + Sync;

/// A relying party that never touches the network.
pub(crate) struct StubRelyingParty {
    provider: Option<Url>,
    responder: Box<Responder>,
}

impl StubRelyingParty {
    /// Every identifier resolves to `provider`; no request carries a response.
    pub(crate) fn with_provider(provider: &str) -> Self {
        Self {
            provider: Url::parse(provider).ok(),
            responder: Box::new(|_: &[(String, String)]| None),
        }
    }

    /// Discovery always fails.
    pub(crate) fn without_provider() -> Self {
        Self {
            provider: None,
            responder: Box::new(|_: &[(String, String)]| None),
        }
    }

    /// Answer `get_response` with `responder` whenever `openid.mode` is present.
    pub(crate) fn responding<F>(mut self, responder: F) -> Self
    where
        F: Fn() -> AuthenticationResponse + Send + Sync + 'static,
    {
        self.responder = Box::new(move |params: &[(String, String)]| {
            params
                .iter()
                .any(|(key, _)| key == "openid.mode")
                .then(&responder)
        });
        self
    }
}

#[async_trait]
impl RelyingParty for StubRelyingParty {
    async fn create_request(
        &self,
        identifier: &Identifier,
        return_to: &Url,
    ) -> Result<AuthenticationRequest, DiscoveryError> {
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| DiscoveryError::new(identifier.as_str(), DiscoveryFailure::NoEndpoint))?;
        let endpoint = ServiceEndpoint {
            provider_endpoint: provider,
            kind: EndpointKind::ClaimedIdentifier,
            claimed_identifier: Some(identifier.as_str().to_string()),
            op_local_identifier: None,
            priority: None,
            supports_ax: true,
        };
        let realm = Url::parse("https://rp.example.com/").unwrap_or_else(|_| return_to.clone());
        Ok(AuthenticationRequest::new(
            endpoint,
            return_to.clone(),
            realm,
        ))
    }

    async fn get_response(
        &self,
        _request_url: &Url,
        params: &[(String, String)],
    ) -> Option<AuthenticationResponse> {
        (self.responder)(params)
    }
}

#[allow(clippy::unwrap_used)]
pub(crate) fn auth_state(relying_party: StubRelyingParty) -> Arc<AuthState> {
    let config = AuthConfig::new(
        Url::parse("https://rp.example.com").unwrap(),
        SecretString::from("0123456789abcdef0123456789abcdef"),
    );
    Arc::new(AuthState::new(config, Arc::new(relying_party)))
}
