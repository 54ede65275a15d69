//! Attribute Exchange 1.0 fetch requests and responses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::message::Message;

pub const AX_NS: &str = "http://openid.net/srv/ax/1.0";

/// Well-known attribute type URIs from axschema.org.
pub mod attributes {
    pub const EMAIL: &str = "http://axschema.org/contact/email";
    pub const FULL_NAME: &str = "http://axschema.org/namePerson";
}

const REQUEST_ALIAS: &str = "ax";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeRequest {
    pub type_uri: String,
    pub required: bool,
}

/// The attributes a relying party asks the provider to release.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchRequest {
    attributes: Vec<AttributeRequest>,
}

impl FetchRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_required(&mut self, type_uri: &str) {
        self.add(type_uri, true);
    }

    pub fn add_optional(&mut self, type_uri: &str) {
        self.add(type_uri, false);
    }

    fn add(&mut self, type_uri: &str, required: bool) {
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.type_uri == type_uri) {
            existing.required = required;
        } else {
            self.attributes.push(AttributeRequest {
                type_uri: type_uri.to_string(),
                required,
            });
        }
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeRequest] {
        &self.attributes
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|a| a.required)
            .map(|a| a.type_uri.as_str())
    }

    /// Extension fields (without the `openid.` prefix) for an outbound request.
    pub(crate) fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            (format!("ns.{REQUEST_ALIAS}"), AX_NS.to_string()),
            (format!("{REQUEST_ALIAS}.mode"), "fetch_request".to_string()),
        ];

        let mut required = Vec::new();
        let mut optional = Vec::new();
        for (index, attribute) in self.attributes.iter().enumerate() {
            let alias = attribute_alias(&attribute.type_uri, index);
            fields.push((
                format!("{REQUEST_ALIAS}.type.{alias}"),
                attribute.type_uri.clone(),
            ));
            if attribute.required {
                required.push(alias);
            } else {
                optional.push(alias);
            }
        }

        if !required.is_empty() {
            fields.push((format!("{REQUEST_ALIAS}.required"), required.join(",")));
        }
        if !optional.is_empty() {
            fields.push((format!("{REQUEST_ALIAS}.if_available"), optional.join(",")));
        }
        fields
    }
}

fn attribute_alias(type_uri: &str, index: usize) -> String {
    match type_uri {
        attributes::EMAIL => "email".to_string(),
        attributes::FULL_NAME => "fullname".to_string(),
        _ => format!("attr{index}"),
    }
}

/// Attribute values released by the provider, keyed by type URI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    attributes: BTreeMap<String, Vec<String>>,
}

impl FetchResponse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, type_uri: impl Into<String>, values: Vec<String>) {
        self.attributes.insert(type_uri.into(), values);
    }

    #[must_use]
    pub fn contains(&self, type_uri: &str) -> bool {
        self.attributes.contains_key(type_uri)
    }

    #[must_use]
    pub fn values(&self, type_uri: &str) -> Option<&[String]> {
        self.attributes.get(type_uri).map(Vec::as_slice)
    }

    #[must_use]
    pub fn first_value(&self, type_uri: &str) -> Option<&str> {
        self.values(type_uri)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.attributes
            .iter()
            .map(|(type_uri, values)| (type_uri.as_str(), values.as_slice()))
    }

    /// Extract a `fetch_response` from message fields.
    ///
    /// The caller decides which fields are trusted; pass the signed subset.
    /// Returns `None` when no AX fetch response is present.
    pub(crate) fn from_message(message: &Message) -> Option<Self> {
        let alias = message.iter().find_map(|(key, value)| {
            key.strip_prefix("ns.")
                .filter(|_| value == AX_NS)
                .map(str::to_string)
        })?;

        if message.get(&format!("{alias}.mode")) != Some("fetch_response") {
            return None;
        }

        let type_prefix = format!("{alias}.type.");
        let mut response = Self::new();
        for (key, type_uri) in message.iter() {
            let Some(attribute) = key.strip_prefix(&type_prefix) else {
                continue;
            };
            let values = match message.get(&format!("{alias}.count.{attribute}")) {
                Some(count) => counted_values(
                    message,
                    &format!("{alias}.value.{attribute}."),
                    count.parse::<usize>().unwrap_or(0),
                ),
                None => message
                    .get(&format!("{alias}.value.{attribute}"))
                    .map(|value| vec![value.to_string()])
                    .unwrap_or_default(),
            };
            response.insert(type_uri, values);
        }
        Some(response)
    }
}

/// Values `<prefix>1..=count` that are present, in index order.
///
/// Only keys in the message are visited; `count` is provider input.
fn counted_values(message: &Message, prefix: &str, count: usize) -> Vec<String> {
    let mut indexed: Vec<(usize, &str)> = message
        .iter()
        .filter_map(|(key, value)| {
            let n = key.strip_prefix(prefix)?.parse::<usize>().ok()?;
            (1..=count).contains(&n).then_some((n, value))
        })
        .collect();
    indexed.sort_unstable_by_key(|(n, _)| *n);
    indexed.into_iter().map(|(_, value)| value.to_string()).collect()
}
