//! Cookie helpers and the signed identity ticket.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use time::OffsetDateTime;

pub const AUTH_COOKIE_NAME: &str = "openid_rp_auth";

/// Issues and checks `base64url(name).expiry.base64url(hmac)` tickets.
pub struct TicketSigner {
    key: hmac::Key,
    ttl_seconds: i64,
}

impl TicketSigner {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: u64) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.expose_secret().as_bytes()),
            ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn issue(&self, name: &str, now: OffsetDateTime) -> String {
        let expires = now.unix_timestamp().saturating_add(self.ttl_seconds);
        let payload = format!(
            "{}.{expires}",
            Base64UrlUnpadded::encode_string(name.as_bytes())
        );
        let tag = hmac::sign(&self.key, payload.as_bytes());
        format!(
            "{payload}.{}",
            Base64UrlUnpadded::encode_string(tag.as_ref())
        )
    }

    /// The name carried by a ticket, or `None` if it was tampered with or has expired.
    #[must_use]
    pub fn verify(&self, ticket: &str, now: OffsetDateTime) -> Option<String> {
        let (payload, tag) = ticket.rsplit_once('.')?;
        let tag = Base64UrlUnpadded::decode_vec(tag).ok()?;
        hmac::verify(&self.key, payload.as_bytes(), &tag).ok()?;

        let (name, expires) = payload.split_once('.')?;
        let expires = expires.parse::<i64>().ok()?;
        if now.unix_timestamp() >= expires {
            return None;
        }
        String::from_utf8(Base64UrlUnpadded::decode_vec(name).ok()?).ok()
    }
}

/// `HttpOnly` cookie without `Max-Age`, so it only lives as long as the browser session.
pub(crate) fn session_scoped_cookie(
    name: &str,
    value: &str,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            if key.trim() == name && !val.trim().is_empty() {
                return Some(val.trim().to_string());
            }
        }
    }
    None
}
