//! In-process session facility.
//!
//! Session values live in memory keyed by a random id carried in an `HttpOnly`
//! cookie. The authenticated identity travels separately in a signed ticket
//! cookie so it can be checked without a store lookup.

use axum::http::{HeaderMap, HeaderValue};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{RngCore, rngs::OsRng};
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::error;

use super::{
    cookie::{AUTH_COOKIE_NAME, clear_cookie, read_cookie, session_scoped_cookie},
    state::AuthState,
};
use crate::openid::ax::FetchResponse;

pub const SESSION_COOKIE_NAME: &str = "openid_rp_session";

/// What the session remembers about the authenticated user.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionValues {
    /// Display form of the claimed identifier.
    pub provider_url: Option<String>,
    pub claimed_identifier: Option<String>,
    pub fetch_response: Option<FetchResponse>,
}

impl SessionValues {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

struct SessionEntry {
    values: SessionValues,
    touched: Instant,
}

/// Idle sessions expire after `ttl`.
pub struct SessionStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn load(&self, id: &str) -> Option<SessionValues> {
        let mut entries = self.entries.lock().await;
        let expired = entries
            .get(id)
            .is_some_and(|entry| entry.touched.elapsed() > self.ttl);
        if expired {
            entries.remove(id);
            return None;
        }
        let entry = entries.get_mut(id)?;
        entry.touched = Instant::now();
        Some(entry.values.clone())
    }

    pub async fn save(&self, id: &str, values: SessionValues) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.touched.elapsed() <= self.ttl);
        entries.insert(
            id.to_string(),
            SessionEntry {
                values,
                touched: Instant::now(),
            },
        );
    }

    pub async fn remove(&self, id: &str) {
        self.entries.lock().await.remove(id);
    }
}

enum IdentityChange {
    Issue(String),
    Clear,
}

/// Session state for one request. Changes are written back by [`SessionContext::commit`].
#[derive(Default)]
pub struct SessionContext {
    session_id: Option<String>,
    values: SessionValues,
    values_changed: bool,
    identity: Option<String>,
    identity_change: Option<IdentityChange>,
    rotate_id: bool,
}

impl SessionContext {
    /// A context with no session and no identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the session and identity cookies of a request.
    pub async fn load(headers: &HeaderMap, state: &AuthState) -> Self {
        let identity = read_cookie(headers, AUTH_COOKIE_NAME)
            .and_then(|ticket| state.signer().verify(&ticket, OffsetDateTime::now_utc()));

        let session_id = read_cookie(headers, SESSION_COOKIE_NAME);
        let values = match &session_id {
            Some(id) => state.sessions().load(id).await.unwrap_or_default(),
            None => SessionValues::default(),
        };

        Self {
            session_id,
            values,
            values_changed: false,
            identity,
            identity_change: None,
            rotate_id: false,
        }
    }

    /// Name of the authenticated user, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    #[must_use]
    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    pub fn set_values(&mut self, values: SessionValues) {
        self.values = values;
        self.values_changed = true;
    }

    pub fn clear_values(&mut self) {
        self.set_values(SessionValues::default());
    }

    /// Sign in as `name`. The session id is replaced on commit.
    pub fn set_identity(&mut self, name: &str) {
        self.identity = Some(name.to_string());
        self.identity_change = Some(IdentityChange::Issue(name.to_string()));
        self.rotate_id = true;
    }

    pub fn clear_identity(&mut self) {
        self.identity = None;
        self.identity_change = Some(IdentityChange::Clear);
    }

    /// Persist changes and return the `Set-Cookie` values for the response.
    pub async fn commit(self, state: &AuthState) -> Vec<HeaderValue> {
        let secure = state.config().cookie_secure();
        let mut cookies = Vec::new();
        let mut session_id = self.session_id;
        let mut values_changed = self.values_changed;

        // a client-supplied id never survives a sign-in
        if self.rotate_id {
            if let Some(old) = session_id.take() {
                state.sessions().remove(&old).await;
                values_changed = true;
                if self.values.is_empty() {
                    cookies.push(clear_cookie(SESSION_COOKIE_NAME, secure));
                }
            }
        }

        if values_changed {
            if self.values.is_empty() {
                if let Some(id) = &session_id {
                    state.sessions().remove(id).await;
                    cookies.push(clear_cookie(SESSION_COOKIE_NAME, secure));
                }
            } else {
                let id = session_id.unwrap_or_else(new_session_id);
                state.sessions().save(&id, self.values).await;
                cookies.push(session_scoped_cookie(SESSION_COOKIE_NAME, &id, secure));
            }
        }

        match self.identity_change {
            Some(IdentityChange::Issue(name)) => {
                let ticket = state.signer().issue(&name, OffsetDateTime::now_utc());
                cookies.push(session_scoped_cookie(AUTH_COOKIE_NAME, &ticket, secure));
            }
            Some(IdentityChange::Clear) => cookies.push(clear_cookie(AUTH_COOKIE_NAME, secure)),
            None => {}
        }

        cookies
            .into_iter()
            .filter_map(|cookie| {
                cookie
                    .map_err(|err| error!("Failed to build cookie header: {err}"))
                    .ok()
            })
            .collect()
    }
}

fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}
