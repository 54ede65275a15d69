//! User-supplied identifier parsing.
//!
//! Two forms are accepted:
//! - URLs: a missing scheme defaults to `http://`, only `http`/`https` are allowed,
//!   the fragment is dropped and scheme/host are normalized by [`url::Url`].
//! - XRIs: an optional `xri://` prefix followed by a global context symbol
//!   (`=`, `@`, `+`, `$`, `!`) or a cross-reference in parentheses.

use once_cell::sync::Lazy;
use regex::Regex;
use std::{fmt, str::FromStr};
use url::Url;

use super::error::IdentifierError;

const XRI_SCHEME: &str = "xri://";

static XRI: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^(?:[=@+$!][^\s]+|\([^\s()]+\)[^\s]*)$"));

/// A canonical identifier, valid input to discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identifier {
    Uri(Url),
    Xri(String),
}

impl Identifier {
    /// Validate and canonicalize raw user input.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidIdentifier`] for empty or malformed input.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let invalid = || IdentifierError::InvalidIdentifier {
            raw: raw.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let xri_body = if trimmed
            .get(..XRI_SCHEME.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(XRI_SCHEME))
        {
            Some(&trimmed[XRI_SCHEME.len()..])
        } else if looks_like_xri(trimmed) {
            Some(trimmed)
        } else {
            None
        };

        if let Some(xri) = xri_body {
            return if valid_xri(xri) {
                Ok(Self::Xri(xri.to_string()))
            } else {
                Err(invalid())
            };
        }

        parse_uri(trimmed).map(Self::Uri).ok_or_else(invalid)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Uri(url) => url.as_str(),
            Self::Xri(xri) => xri,
        }
    }

    #[must_use]
    pub fn is_xri(&self) -> bool {
        matches!(self, Self::Xri(_))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn looks_like_xri(value: &str) -> bool {
    value.starts_with(['=', '@', '+', '$', '!', '('])
}

fn valid_xri(xri: &str) -> bool {
    Lazy::force(&XRI)
        .as_ref()
        .is_ok_and(|re| re.is_match(xri))
}

fn parse_uri(value: &str) -> Option<Url> {
    if value.chars().any(char::is_whitespace) {
        return None;
    }

    let candidate = if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{value}")
    };

    let mut url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !url.host_str().is_some_and(|host| !host.is_empty()) {
        return None;
    }
    // user info never belongs in an identifier; "mailto:x@y" would otherwise parse
    if !url.username().is_empty() || url.password().is_some() {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_adds_default_scheme_and_normalizes_host() {
        let id = Identifier::parse("Alice.Example.COM").ok();
        assert_eq!(
            id.as_ref().map(Identifier::as_str),
            Some("http://alice.example.com/")
        );
    }

    #[test]
    fn parse_keeps_https_and_path_and_drops_fragment() {
        let id = Identifier::parse("  https://me.example.org/users/alice#section ").ok();
        assert_eq!(
            id.as_ref().map(Identifier::as_str),
            Some("https://me.example.org/users/alice")
        );
    }

    #[test]
    fn parse_accepts_xri_forms() {
        assert_eq!(
            Identifier::parse("=example").ok(),
            Some(Identifier::Xri("=example".to_string()))
        );
        assert_eq!(
            Identifier::parse("xri://@example*dept").ok(),
            Some(Identifier::Xri("@example*dept".to_string()))
        );
        assert!(Identifier::parse("(=example)").is_ok_and(|id| id.is_xri()));
    }

    #[test]
    fn parse_rejects_empty_and_whitespace() {
        for raw in ["", "   ", "\t\n"] {
            assert_eq!(
                Identifier::parse(raw),
                Err(IdentifierError::InvalidIdentifier {
                    raw: raw.to_string()
                })
            );
        }
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for raw in [
            "not a url",
            "ftp://example.com/",
            "http://",
            "=",
            "xri://",
            "mailto:alice@example.com",
        ] {
            assert!(Identifier::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn from_str_matches_parse() {
        let parsed: Result<Identifier, _> = "example.com".parse();
        assert_eq!(parsed, Identifier::parse("example.com"));
    }
}
