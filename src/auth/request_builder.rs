use tracing::{info, warn};
use url::Url;

use super::FlowOutcome;
use crate::openid::{
    AuthenticationRequest, DiscoveryError, Identifier, RelyingParty,
    ax::{FetchRequest, attributes},
};

/// The profile attributes every request asks for: email and full name, both required.
#[must_use]
pub fn build_fetch_request() -> FetchRequest {
    let mut fetch = FetchRequest::new();
    fetch.add_required(attributes::EMAIL);
    fetch.add_required(attributes::FULL_NAME);
    fetch
}

/// Discover the provider for `identifier` and attach the attribute request.
///
/// # Errors
///
/// Returns the discovery error when no usable provider is found.
pub async fn create_request(
    relying_party: &dyn RelyingParty,
    identifier: &Identifier,
    return_to: &Url,
) -> Result<AuthenticationRequest, DiscoveryError> {
    let mut request = relying_party.create_request(identifier, return_to).await?;
    request.add_extension(build_fetch_request());
    Ok(request)
}

/// Start an attempt from the identifier the user submitted.
pub async fn begin(
    relying_party: &dyn RelyingParty,
    raw_identifier: Option<&str>,
    return_to: &Url,
) -> FlowOutcome {
    let identifier = match Identifier::parse(raw_identifier.unwrap_or_default()) {
        Ok(identifier) => identifier,
        Err(err) => {
            return FlowOutcome::ShowEntry {
                message: err.to_string(),
            };
        }
    };

    match create_request(relying_party, &identifier, return_to).await {
        Ok(request) => {
            info!(
                identifier = %identifier,
                provider = %request.provider().provider_endpoint,
                "redirecting to provider"
            );
            FlowOutcome::Redirect(request.redirect_url().to_string())
        }
        Err(err) => {
            warn!(identifier = %err.identifier, "Discovery failed: {err}");
            FlowOutcome::ShowEntry {
                message: err.to_string(),
            }
        }
    }
}
