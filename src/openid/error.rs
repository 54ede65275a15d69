use thiserror::Error;

/// Rejected user input for an OpenID identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Invalid identifier: {raw}")]
    InvalidIdentifier { raw: String },
}

/// Why discovery produced no usable provider endpoint.
#[derive(Debug, Error)]
pub enum DiscoveryFailure {
    #[error("No OpenID endpoint found.")]
    NoEndpoint,
    #[error("Error occurred while fetching the discovery document: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Discovery document request returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("Malformed discovery document: {0}")]
    Malformed(String),
}

/// Discovery failed for a specific identifier.
///
/// Displays as the underlying cause so the message can be shown to the user as-is.
#[derive(Debug, Error)]
#[error("{cause}")]
pub struct DiscoveryError {
    pub identifier: String,
    #[source]
    pub cause: DiscoveryFailure,
}

impl DiscoveryError {
    #[must_use]
    pub fn new(identifier: impl Into<String>, cause: DiscoveryFailure) -> Self {
        Self {
            identifier: identifier.into(),
            cause,
        }
    }
}

/// Failures while interpreting or verifying a provider response.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unsupported OpenID protocol version: {0}")]
    UnsupportedVersion(String),
    #[error("Unrecognized OpenID mode: {0}")]
    UnrecognizedMode(String),
    /// Error text reported by the provider itself (`openid.error`).
    #[error("{0}")]
    Provider(String),
    #[error("Missing required field openid.{0}")]
    MissingField(String),
    #[error("Field openid.{0} is not covered by the signature")]
    UnsignedField(String),
    #[error("Malformed URL in field openid.{field}: {value}")]
    MalformedUrl { field: String, value: String },
    #[error("The return_to URL {0} does not match the URL the response was received on")]
    ReturnToMismatch(String),
    #[error("Malformed response nonce")]
    MalformedNonce,
    #[error("The response nonce has expired")]
    NonceExpired,
    #[error("The response nonce is dated in the future")]
    NonceFromFuture,
    #[error("The response nonce has already been used")]
    NonceReplayed,
    #[error("The claimed identifier {0} does not match discovered information")]
    DiscoveryMismatch(String),
    #[error("The provider did not confirm the assertion signature")]
    InvalidSignature,
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("Error occurred while contacting the provider: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_identifier_message_includes_raw_input() {
        let err = IdentifierError::InvalidIdentifier {
            raw: "not a url".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid identifier: not a url");
    }

    #[test]
    fn discovery_error_displays_cause_verbatim() {
        let err = DiscoveryError::new("http://alice.example.com/", DiscoveryFailure::NoEndpoint);
        assert_eq!(err.to_string(), "No OpenID endpoint found.");
        assert_eq!(err.identifier, "http://alice.example.com/");
    }

    #[test]
    fn provider_error_displays_detail_verbatim() {
        let err = ProtocolError::Provider("timeout contacting provider".to_string());
        assert_eq!(err.to_string(), "timeout contacting provider");
    }
}
