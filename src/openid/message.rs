//! `OpenID` message encodings.
//!
//! Indirect messages travel as `openid.*` query/form parameters; direct responses
//! use key-value form (`key:value\n`). Keys are stored without the `openid.` prefix.

use std::collections::{BTreeMap, BTreeSet};

use super::error::ProtocolError;

const PREFIX: &str = "openid.";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Message {
    fields: BTreeMap<String, String>,
}

impl Message {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Collect the `openid.*` parameters; anything else on the request is ignored.
    /// The first occurrence of a repeated key wins.
    pub(crate) fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fields = BTreeMap::new();
        for (key, value) in pairs {
            if let Some(name) = key.as_ref().strip_prefix(PREFIX) {
                fields
                    .entry(name.to_string())
                    .or_insert_with(|| value.as_ref().to_string());
            }
        }
        Self { fields }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub(crate) fn require(&self, key: &str) -> Result<&str, ProtocolError> {
        self.get(key)
            .ok_or_else(|| ProtocolError::MissingField(key.to_string()))
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub(crate) fn extend(&mut self, pairs: impl IntoIterator<Item = (String, String)>) {
        self.fields.extend(pairs);
    }

    /// Keys listed in `openid.signed`.
    pub(crate) fn signed_keys(&self) -> BTreeSet<&str> {
        self.get("signed")
            .map(|signed| {
                signed
                    .split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn ensure_signed(&self, key: &str) -> Result<(), ProtocolError> {
        if self.signed_keys().contains(key) {
            Ok(())
        } else {
            Err(ProtocolError::UnsignedField(key.to_string()))
        }
    }

    /// Only the fields covered by the signature.
    pub(crate) fn signed_subset(&self) -> Self {
        let signed = self.signed_keys();
        let fields = self
            .fields
            .iter()
            .filter(|(key, _)| signed.contains(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { fields }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Wire form with the `openid.` prefix restored.
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(key, value)| (format!("{PREFIX}{key}"), value.clone()))
            .collect()
    }
}

/// Parse a key-value form body. Lines without a colon are skipped.
pub(crate) fn parse_key_value(body: &str) -> BTreeMap<String, String> {
    body.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim_end_matches('\r').to_string()))
        })
        .collect()
}
