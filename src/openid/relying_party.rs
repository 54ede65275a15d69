use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    OPENID2_NS, RelyingParty,
    ax::FetchResponse,
    discovery::{Discoverer, EndpointKind, MAX_BODY_BYTES, read_limited},
    error::{DiscoveryError, DiscoveryFailure, ProtocolError},
    identifier::Identifier,
    message::{Message, parse_key_value},
    nonce::NonceStore,
    request::AuthenticationRequest,
    response::{AuthenticationResponse, PositiveAssertion},
};
use crate::APP_USER_AGENT;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields an assertion must carry and sign.
const SIGNED_FIELDS: [&str; 4] = ["op_endpoint", "return_to", "response_nonce", "assoc_handle"];

/// Stateless `OpenID` 2.0 relying party: every assertion is confirmed with the
/// provider through `check_authentication`, so no associations are kept.
#[derive(Debug)]
pub struct OpenIdRelyingParty {
    client: Client,
    discoverer: Discoverer,
    realm: Url,
    nonces: NonceStore,
}

impl OpenIdRelyingParty {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        realm: Url,
        xri_resolver: Url,
        nonce_max_age_seconds: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()?;
        let max_age =
            time::Duration::seconds(i64::try_from(nonce_max_age_seconds).unwrap_or(i64::MAX));

        Ok(Self {
            discoverer: Discoverer::new(client.clone(), xri_resolver),
            client,
            realm,
            nonces: NonceStore::new(max_age),
        })
    }

    #[must_use]
    pub fn realm(&self) -> &Url {
        &self.realm
    }

    #[instrument(skip_all)]
    async fn verify_assertion(
        &self,
        request_url: &Url,
        message: &Message,
    ) -> Result<PositiveAssertion, ProtocolError> {
        let return_to = url_field(message, "return_to")?;
        verify_return_to(&return_to, request_url)?;

        for field in SIGNED_FIELDS {
            message.require(field)?;
            message.ensure_signed(field)?;
        }
        let op_endpoint = url_field(message, "op_endpoint")?;

        let (claimed_id, identity) = match (message.get("claimed_id"), message.get("identity")) {
            (Some(claimed_id), Some(identity)) => (claimed_id, identity),
            (None, _) => return Err(ProtocolError::MissingField("claimed_id".to_string())),
            (Some(_), None) => return Err(ProtocolError::MissingField("identity".to_string())),
        };
        message.ensure_signed("claimed_id")?;
        message.ensure_signed("identity")?;

        self.verify_discovered(claimed_id, identity, &op_endpoint)
            .await?;
        self.check_authentication(&op_endpoint, message).await?;

        let nonce = message.require("response_nonce")?;
        self.nonces
            .consume(op_endpoint.as_str(), nonce, OffsetDateTime::now_utc())
            .await?;

        let mut assertion = PositiveAssertion::new(claimed_id, op_endpoint);
        if let Some(fetch_response) = FetchResponse::from_message(&message.signed_subset()) {
            assertion = assertion.with_fetch_response(fetch_response);
        }

        debug!(claimed_id, "assertion verified");
        Ok(assertion)
    }

    /// The provider that signed the assertion must be authoritative for the claimed identifier.
    async fn verify_discovered(
        &self,
        claimed_id: &str,
        identity: &str,
        op_endpoint: &Url,
    ) -> Result<(), ProtocolError> {
        let identifier = Identifier::parse(claimed_id).map_err(|_| {
            DiscoveryError::new(
                claimed_id,
                DiscoveryFailure::Malformed(format!("unusable claimed identifier {claimed_id}")),
            )
        })?;
        let endpoints = self.discoverer.discover(&identifier).await?;

        let matched = endpoints.iter().any(|endpoint| {
            endpoint.kind == EndpointKind::ClaimedIdentifier
                && endpoint.provider_endpoint == *op_endpoint
                && endpoint.local_identifier() == Some(identity)
        });
        if matched {
            Ok(())
        } else {
            Err(ProtocolError::DiscoveryMismatch(claimed_id.to_string()))
        }
    }

    async fn check_authentication(
        &self,
        op_endpoint: &Url,
        message: &Message,
    ) -> Result<(), ProtocolError> {
        let mut verification = message.clone();
        verification.insert("mode", "check_authentication");

        let response = self
            .client
            .post(op_endpoint.clone())
            .form(&verification.to_pairs())
            .send()
            .await?
            .error_for_status()?;
        let body = read_limited(response, MAX_BODY_BYTES)
            .await?
            .ok_or(ProtocolError::InvalidSignature)?;

        let reply = parse_key_value(&body);
        if reply.get("is_valid").map(String::as_str) == Some("true") {
            Ok(())
        } else {
            Err(ProtocolError::InvalidSignature)
        }
    }
}

#[async_trait]
impl RelyingParty for OpenIdRelyingParty {
    async fn create_request(
        &self,
        identifier: &Identifier,
        return_to: &Url,
    ) -> Result<AuthenticationRequest, DiscoveryError> {
        let endpoint = self
            .discoverer
            .discover(identifier)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::new(identifier.as_str(), DiscoveryFailure::NoEndpoint))?;

        debug!(provider = %endpoint.provider_endpoint, "selected provider endpoint");
        Ok(AuthenticationRequest::new(
            endpoint,
            return_to.clone(),
            self.realm.clone(),
        ))
    }

    async fn get_response(
        &self,
        request_url: &Url,
        params: &[(String, String)],
    ) -> Option<AuthenticationResponse> {
        let message = Message::from_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        let mode = message.get("mode")?;

        match message.get("ns") {
            Some(OPENID2_NS) => {}
            other => {
                let version = other.unwrap_or("1.x").to_string();
                return Some(AuthenticationResponse::Failed(
                    ProtocolError::UnsupportedVersion(version),
                ));
            }
        }

        let response = match mode {
            "cancel" => AuthenticationResponse::Canceled,
            "setup_needed" => AuthenticationResponse::SetupRequired {
                user_setup_url: message
                    .get("user_setup_url")
                    .and_then(|value| Url::parse(value).ok()),
            },
            "error" => AuthenticationResponse::Failed(ProtocolError::Provider(
                message
                    .get("error")
                    .unwrap_or("The provider reported an unspecified error")
                    .to_string(),
            )),
            "id_res" => match self.verify_assertion(request_url, &message).await {
                Ok(assertion) => AuthenticationResponse::Authenticated(assertion),
                Err(err) => {
                    warn!("Rejected positive assertion: {err}");
                    AuthenticationResponse::Failed(err)
                }
            },
            other => {
                AuthenticationResponse::Failed(ProtocolError::UnrecognizedMode(other.to_string()))
            }
        };
        Some(response)
    }
}

fn url_field(message: &Message, field: &str) -> Result<Url, ProtocolError> {
    let value = message.require(field)?;
    Url::parse(value).map_err(|_| ProtocolError::MalformedUrl {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// The response must arrive on the URL named in `return_to`: same scheme,
/// authority and path, and every `return_to` query parameter present.
fn verify_return_to(return_to: &Url, request_url: &Url) -> Result<(), ProtocolError> {
    let same_target = return_to.scheme() == request_url.scheme()
        && return_to.host_str() == request_url.host_str()
        && return_to.port_or_known_default() == request_url.port_or_known_default()
        && return_to.path() == request_url.path();

    let received: Vec<_> = request_url.query_pairs().collect();
    let params_present = return_to
        .query_pairs()
        .all(|pair| received.contains(&pair));

    if same_target && params_present {
        Ok(())
    } else {
        Err(ProtocolError::ReturnToMismatch(return_to.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openid::{
        AuthenticationStatus,
        ax::{AX_NS, attributes},
    };
    use anyhow::{Result, bail};
    use time::format_description::well_known::Rfc3339;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RETURN_TO: &str = "https://rp.example.com/user/authenticate?returnUrl=%2Fdashboard";

    #[allow(clippy::unwrap_used)]
    fn url(value: &str) -> Url {
        Url::parse(value).unwrap()
    }

    #[allow(clippy::unwrap_used)]
    fn relying_party() -> OpenIdRelyingParty {
        OpenIdRelyingParty::new(
            url("https://rp.example.com/"),
            url("https://xri.example.net/"),
            300,
        )
        .unwrap()
    }

    fn fresh_nonce(suffix: &str) -> Result<String> {
        let now = OffsetDateTime::now_utc().replace_nanosecond(0)?;
        Ok(format!("{}{suffix}", now.format(&Rfc3339)?))
    }

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn assertion_params(claimed: &str, op_endpoint: &str, nonce: &str) -> Vec<(String, String)> {
        pairs(&[
            ("openid.ns", OPENID2_NS),
            ("openid.mode", "id_res"),
            ("openid.op_endpoint", op_endpoint),
            ("openid.claimed_id", claimed),
            ("openid.identity", claimed),
            ("openid.return_to", RETURN_TO),
            ("openid.response_nonce", nonce),
            ("openid.assoc_handle", "stateless-1"),
            (
                "openid.signed",
                "op_endpoint,claimed_id,identity,return_to,response_nonce,assoc_handle,ns.ax,ax.mode,ax.type.email,ax.value.email",
            ),
            ("openid.sig", "c2lnbmF0dXJl"),
            ("openid.ns.ax", AX_NS),
            ("openid.ax.mode", "fetch_response"),
            ("openid.ax.type.email", attributes::EMAIL),
            ("openid.ax.value.email", "jane@example.com"),
            ("openid.ax.type.fullname", attributes::FULL_NAME),
            ("openid.ax.value.fullname", "Unsigned Name"),
            ("returnUrl", "/dashboard"),
        ])
    }

    /// A claimed identifier page on `server` delegating to `op`.
    async fn mount_identity_page(server: &MockServer, op: &str) {
        Mock::given(method("GET"))
            .and(path("/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                format!(r#"<link rel="openid2.provider" href="{op}">"#),
                "text/html",
            ))
            .mount(server)
            .await;
    }

    async fn mount_verification(server: &MockServer, endpoint: &str, is_valid: bool, hits: u64) {
        Mock::given(method("POST"))
            .and(path(endpoint))
            .and(body_string_contains("openid.mode=check_authentication"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("ns:{OPENID2_NS}\nis_valid:{is_valid}\n")),
            )
            .expect(hits)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn no_mode_means_no_response() {
        let response = relying_party()
            .get_response(&url(RETURN_TO), &pairs(&[("returnUrl", "/dashboard")]))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn indirect_statuses_are_classified() {
        let rp = relying_party();
        let request_url = url(RETURN_TO);

        let cancel = rp
            .get_response(
                &request_url,
                &pairs(&[("openid.ns", OPENID2_NS), ("openid.mode", "cancel")]),
            )
            .await;
        assert_eq!(
            cancel.map(|r| r.status()),
            Some(AuthenticationStatus::Canceled)
        );

        let setup = rp
            .get_response(
                &request_url,
                &pairs(&[("openid.ns", OPENID2_NS), ("openid.mode", "setup_needed")]),
            )
            .await;
        assert_eq!(
            setup.map(|r| r.status()),
            Some(AuthenticationStatus::SetupRequired)
        );

        let error = rp
            .get_response(
                &request_url,
                &pairs(&[
                    ("openid.ns", OPENID2_NS),
                    ("openid.mode", "error"),
                    ("openid.error", "timeout contacting provider"),
                ]),
            )
            .await;
        match error {
            Some(AuthenticationResponse::Failed(err)) => {
                assert_eq!(err.to_string(), "timeout contacting provider");
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let unknown = rp
            .get_response(
                &request_url,
                &pairs(&[("openid.ns", OPENID2_NS), ("openid.mode", "bogus")]),
            )
            .await;
        assert!(matches!(
            unknown,
            Some(AuthenticationResponse::Failed(ProtocolError::UnrecognizedMode(_)))
        ));
    }

    #[tokio::test]
    async fn openid1_messages_are_rejected() {
        let response = relying_party()
            .get_response(&url(RETURN_TO), &pairs(&[("openid.mode", "id_res")]))
            .await;
        assert!(matches!(
            response,
            Some(AuthenticationResponse::Failed(ProtocolError::UnsupportedVersion(_)))
        ));
    }

    #[test]
    fn return_to_must_match_request_url() {
        let return_to = url(RETURN_TO);
        assert!(verify_return_to(&return_to, &url(RETURN_TO)).is_ok());
        assert!(
            verify_return_to(
                &return_to,
                &url(
                    "https://rp.example.com:443/user/authenticate?openid.mode=id_res&returnUrl=%2Fdashboard"
                )
            )
            .is_ok()
        );
        assert!(
            verify_return_to(
                &return_to,
                &url("https://rp.example.com/user/authenticate?returnUrl=%2Fadmin")
            )
            .is_err()
        );
        assert!(
            verify_return_to(
                &return_to,
                &url("https://evil.example.com/user/authenticate?returnUrl=%2Fdashboard")
            )
            .is_err()
        );
    }

    #[tokio::test]
    async fn create_request_uses_best_endpoint() -> Result<()> {
        let server = MockServer::start().await;
        let op = format!("{}/op", server.uri());
        mount_identity_page(&server, &op).await;

        let identifier = Identifier::parse(&format!("{}/alice", server.uri()))?;
        let request = relying_party()
            .create_request(&identifier, &url(RETURN_TO))
            .await?;
        assert_eq!(request.provider().provider_endpoint.as_str(), op);
        assert_eq!(request.return_to().as_str(), RETURN_TO);
        Ok(())
    }

    #[tokio::test]
    async fn verifies_positive_assertion() -> Result<()> {
        let server = MockServer::start().await;
        let claimed = format!("{}/alice", server.uri());
        let op = format!("{}/op", server.uri());
        mount_identity_page(&server, &op).await;
        mount_verification(&server, "/op", true, 2).await;

        let rp = relying_party();
        let params = assertion_params(&claimed, &op, &fresh_nonce("a1")?);
        let assertion = match rp.get_response(&url(RETURN_TO), &params).await {
            Some(AuthenticationResponse::Authenticated(assertion)) => assertion,
            other => bail!("unexpected response: {other:?}"),
        };
        assert_eq!(assertion.claimed_identifier, claimed);
        assert_eq!(assertion.provider_endpoint.as_str(), op);
        let fetched = assertion.fetch_response.unwrap_or_default();
        assert_eq!(fetched.first_value(attributes::EMAIL), Some("jane@example.com"));
        // not covered by openid.signed
        assert_eq!(fetched.first_value(attributes::FULL_NAME), None);

        // the same nonce is refused the second time
        let replay = rp.get_response(&url(RETURN_TO), &params).await;
        assert!(matches!(
            replay,
            Some(AuthenticationResponse::Failed(ProtocolError::NonceReplayed))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_assertion_the_provider_does_not_confirm() -> Result<()> {
        let server = MockServer::start().await;
        let claimed = format!("{}/alice", server.uri());
        let op = format!("{}/op", server.uri());
        mount_identity_page(&server, &op).await;
        mount_verification(&server, "/op", false, 1).await;

        let response = relying_party()
            .get_response(
                &url(RETURN_TO),
                &assertion_params(&claimed, &op, &fresh_nonce("b2")?),
            )
            .await;
        assert!(matches!(
            response,
            Some(AuthenticationResponse::Failed(ProtocolError::InvalidSignature))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_provider_not_authoritative_for_identifier() -> Result<()> {
        let server = MockServer::start().await;
        let claimed = format!("{}/alice", server.uri());
        mount_identity_page(&server, "https://op.example.com/").await;
        mount_verification(&server, "/rogue", true, 0).await;

        let response = relying_party()
            .get_response(
                &url(RETURN_TO),
                &assertion_params(
                    &claimed,
                    &format!("{}/rogue", server.uri()),
                    &fresh_nonce("c3")?,
                ),
            )
            .await;
        assert!(matches!(
            response,
            Some(AuthenticationResponse::Failed(ProtocolError::DiscoveryMismatch(_)))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_unsigned_required_fields() -> Result<()> {
        let mut params = assertion_params(
            "http://alice.example.com/",
            "https://op.example.com/",
            &fresh_nonce("d4")?,
        );
        for (key, value) in &mut params {
            if key == "openid.signed" {
                *value = "op_endpoint,claimed_id,identity,return_to,assoc_handle".to_string();
            }
        }
        match relying_party().get_response(&url(RETURN_TO), &params).await {
            Some(AuthenticationResponse::Failed(ProtocolError::UnsignedField(field))) => {
                assert_eq!(field, "response_nonce");
            }
            other => bail!("unexpected response: {other:?}"),
        }
        Ok(())
    }
}
