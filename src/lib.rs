//! # openid-rp (OpenID 2.0 Relying Party)
//!
//! `openid-rp` is a small web application that signs users in with their
//! OpenID 2.0 identifier and asks the provider for their email address and
//! full name through Attribute Exchange (AX).
//!
//! ## Flow
//!
//! 1. The user submits an identifier (URL, bare domain or XRI) on `/user`.
//! 2. The identifier is normalized and discovered (Yadis/XRDS first, then
//!    HTML link hints), and the browser is redirected to the provider with a
//!    `checkid_setup` request carrying an AX fetch request.
//! 3. The provider sends the browser back to `/user/authenticate`. The
//!    assertion is verified statelessly: `return_to` must match the request,
//!    the essential fields must be signed, discovered information is checked
//!    again, the provider confirms the signature via `check_authentication`,
//!    and the response nonce is consumed once.
//! 4. On success a signed identity cookie and a server-side session are
//!    issued; `/secured` is then reachable until `/user/logoff`.
//!
//! ## Layout
//!
//! - [`openid`]: protocol engine (identifiers, discovery, requests, responses).
//! - [`auth`]: request builder, response processor, session binder and cookies.
//! - [`api`]: HTTP routes and server-rendered pages.
//! - [`cli`]: argument parsing, telemetry and server startup.

pub mod api;
pub mod auth;
pub mod cli;
pub mod openid;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
