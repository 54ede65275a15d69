use axum::{
    body::Bytes,
    extract::{Extension, Query},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
        header::{LOCATION, SET_COOKIE},
    },
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use url::{Url, form_urlencoded};

use crate::{
    api::views::{self, IDENTIFIER_FIELD},
    auth::{self, AuthConfig, AuthState, FlowOutcome, SessionContext},
};

const AUTHENTICATE_PATH: &str = "/user/authenticate";
const RETURN_URL_PARAM: &str = "returnUrl";

#[derive(Deserialize, Debug, Default)]
pub struct EntryQuery {
    #[serde(rename = "returnUrl")]
    return_url: Option<String>,
}

pub async fn entry(Query(query): Query<EntryQuery>) -> impl IntoResponse {
    Html(views::entry(query.return_url.as_deref(), None))
}

/// Both legs of the flow: starts an attempt, or completes one when the
/// request carries a provider response (via redirect or form post).
#[instrument(skip_all, fields(http.method = %method))]
pub async fn authenticate(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    body: Bytes,
) -> Response {
    let mut params: Vec<(String, String)> = uri
        .query()
        .map(|query| form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    if method == Method::POST {
        params.extend(form_urlencoded::parse(&body).into_owned());
    }

    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    let return_url = param(RETURN_URL_PARAM);

    let config = auth_state.config();
    let request_url = config.request_url(&uri);
    let relying_party = auth_state.relying_party();
    let mut session = SessionContext::load(&headers, &auth_state).await;

    let outcome = match relying_party.get_response(&request_url, &params).await {
        Some(response) => {
            debug!(status = ?response.status(), "received provider response");
            auth::handle_response(
                &response,
                return_url.as_deref(),
                config.landing_path(),
                &mut session,
            )
        }
        None => {
            let return_to = return_to(config, return_url.as_deref());
            auth::begin(relying_party, param(IDENTIFIER_FIELD).as_deref(), &return_to).await
        }
    };

    let cookies = session.commit(&auth_state).await;
    respond(outcome, return_url.as_deref(), config.landing_path(), cookies)
}

pub async fn logoff(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let mut session = SessionContext::load(&headers, &auth_state).await;
    auth::sign_out(&mut session);
    let cookies = session.commit(&auth_state).await;
    respond(
        FlowOutcome::Redirect("/".to_string()),
        None,
        "/",
        cookies,
    )
}

/// Where the provider sends the user back; `returnUrl` rides along.
fn return_to(config: &AuthConfig, return_url: Option<&str>) -> Url {
    let mut url = config.request_url(&Uri::from_static(AUTHENTICATE_PATH));
    if let Some(return_url) = return_url.filter(|url| !url.is_empty()) {
        url.query_pairs_mut()
            .append_pair(RETURN_URL_PARAM, return_url);
    }
    url
}

fn respond(
    outcome: FlowOutcome,
    return_url: Option<&str>,
    landing_path: &str,
    cookies: Vec<HeaderValue>,
) -> Response {
    let mut response = match outcome {
        FlowOutcome::Redirect(location) => {
            let location = HeaderValue::from_str(&location)
                .or_else(|_| HeaderValue::from_str(landing_path))
                .unwrap_or(HeaderValue::from_static("/"));
            (StatusCode::FOUND, [(LOCATION, location)]).into_response()
        }
        FlowOutcome::ShowEntry { message } => {
            Html(views::entry(return_url, Some(&message))).into_response()
        }
        FlowOutcome::Empty => StatusCode::OK.into_response(),
    };

    for cookie in cookies {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}
