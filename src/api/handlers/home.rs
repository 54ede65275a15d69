use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::LOCATION},
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;
use url::form_urlencoded;

use crate::{
    api::views,
    auth::{AuthState, SessionContext},
};

pub async fn index(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let session = SessionContext::load(&headers, &auth_state).await;
    Html(views::home(session.identity()))
}

/// Only reachable with a valid identity ticket; everyone else is sent to sign in.
pub async fn secured(headers: HeaderMap, auth_state: Extension<Arc<AuthState>>) -> Response {
    let session = SessionContext::load(&headers, &auth_state).await;
    let Some(identity) = session.identity() else {
        let location = format!(
            "/user?{}",
            form_urlencoded::Serializer::new(String::new())
                .append_pair("returnUrl", "/secured")
                .finish()
        );
        let location =
            HeaderValue::from_str(&location).unwrap_or(HeaderValue::from_static("/user"));
        return (StatusCode::FOUND, [(LOCATION, location)]).into_response();
    };

    Html(views::secured(identity, session.values())).into_response()
}
