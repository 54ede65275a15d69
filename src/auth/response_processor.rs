use tracing::{debug, info};

use super::{FlowOutcome, binder::bind_session, session::SessionContext};
use crate::openid::{
    AuthenticationResponse,
    ax::{FetchResponse, attributes},
};

pub const CANCELED_MESSAGE: &str = "User canceled at provider.";

/// Name shown for the user: full name, then email, then the claimed identifier.
#[must_use]
pub fn display_name(claimed_identifier: &str, fetch_response: Option<&FetchResponse>) -> String {
    let non_empty = |type_uri: &str| {
        fetch_response
            .and_then(|fetched| fetched.first_value(type_uri))
            .filter(|value| !value.is_empty())
    };

    non_empty(attributes::FULL_NAME)
        .or_else(|| non_empty(attributes::EMAIL))
        .unwrap_or(claimed_identifier)
        .to_string()
}

/// Decide what happens after the provider sent the user back.
///
/// Only an authenticated response touches the session.
pub fn handle_response(
    response: &AuthenticationResponse,
    return_url: Option<&str>,
    landing_path: &str,
    session: &mut SessionContext,
) -> FlowOutcome {
    match response {
        AuthenticationResponse::Authenticated(assertion) => {
            let name = display_name(
                &assertion.claimed_identifier,
                assertion.fetch_response.as_ref(),
            );
            bind_session(
                session,
                &name,
                &assertion.claimed_identifier,
                &assertion.friendly_identifier,
                assertion.fetch_response.clone(),
            );
            info!(claimed_id = %assertion.claimed_identifier, "user authenticated");

            let target = return_url
                .filter(|url| !url.is_empty())
                .unwrap_or(landing_path);
            FlowOutcome::Redirect(target.to_string())
        }
        AuthenticationResponse::Canceled => FlowOutcome::ShowEntry {
            message: CANCELED_MESSAGE.to_string(),
        },
        AuthenticationResponse::Failed(err) => FlowOutcome::ShowEntry {
            message: err.to_string(),
        },
        AuthenticationResponse::SetupRequired { .. } => {
            debug!("provider requires setup; nothing to render");
            FlowOutcome::Empty
        }
    }
}
