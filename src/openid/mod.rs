//! `OpenID` 2.0 relying-party protocol engine.
//!
//! The engine turns a user-supplied identifier into a provider redirect and
//! verifies what the provider sends back:
//!
//! - **Discovery:** XRI identifiers resolve through a proxy resolver; URLs go
//!   through Yadis (XRDS) first and fall back to HTML `openid2.*` links.
//! - **Requests:** `checkid_setup` with an optional Attribute Exchange fetch.
//! - **Verification:** positive assertions are checked against `return_to`,
//!   the signed field list, re-discovery of the claimed identifier, a direct
//!   `check_authentication` call and a replay-protected nonce.
//!
//! Associations (shared secrets) are not used; every assertion is verified
//! directly with the provider.

use async_trait::async_trait;
use url::Url;

pub mod ax;
mod discovery;
pub mod error;
pub mod identifier;
mod message;
mod nonce;
mod relying_party;
mod request;
mod response;
mod xrds;

pub use self::{
    discovery::{EndpointKind, ServiceEndpoint},
    error::{DiscoveryError, IdentifierError, ProtocolError},
    identifier::Identifier,
    relying_party::OpenIdRelyingParty,
    request::AuthenticationRequest,
    response::{
        AuthenticationResponse, AuthenticationStatus, PositiveAssertion, friendly_identifier,
    },
};

pub const OPENID2_NS: &str = "http://specs.openid.net/auth/2.0";
pub const OP_IDENTIFIER_TYPE: &str = "http://specs.openid.net/auth/2.0/server";
pub const CLAIMED_IDENTIFIER_TYPE: &str = "http://specs.openid.net/auth/2.0/signon";
pub const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// The two legs of an authentication attempt.
#[async_trait]
pub trait RelyingParty: Send + Sync {
    /// Discover the provider for `identifier` and build a request that sends
    /// the user back to `return_to`.
    async fn create_request(
        &self,
        identifier: &Identifier,
        return_to: &Url,
    ) -> Result<AuthenticationRequest, DiscoveryError>;

    /// Interpret the parameters of a request received on `request_url`.
    ///
    /// Returns `None` when the request carries no provider response.
    async fn get_response(
        &self,
        request_url: &Url,
        params: &[(String, String)],
    ) -> Option<AuthenticationResponse>;
}
