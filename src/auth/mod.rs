//! Relying-party authentication flow.
//!
//! The flow has two legs handled by the same endpoint:
//!
//! 1. **Begin:** the submitted identifier is parsed, its provider discovered and
//!    the browser redirected there with an Attribute Exchange request for the
//!    user's email and full name ([`request_builder`]).
//! 2. **Complete:** the provider's response is classified and, when the user
//!    authenticated, bound to the session under a display name
//!    ([`response_processor`], [`binder`]).
//!
//! Failures never escape as errors; they end up as a message on the entry view.

pub mod binder;
pub mod cookie;
pub mod request_builder;
pub mod response_processor;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::{
    binder::{bind_session, sign_out},
    request_builder::{begin, build_fetch_request, create_request},
    response_processor::{CANCELED_MESSAGE, display_name, handle_response},
    session::{SessionContext, SessionValues},
    state::{AuthConfig, AuthState},
};

/// What the HTTP layer should do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Send the browser to this location.
    Redirect(String),
    /// Show the identifier entry view with a message.
    ShowEntry { message: String },
    /// Respond with an empty body.
    Empty,
}
