//! Provider discovery: XRI proxy resolution, Yadis and HTML link discovery.

use reqwest::{
    Client, Response,
    header::{ACCEPT, CONTENT_TYPE, HeaderMap},
};
use tracing::{debug, instrument};
use url::Url;

use super::{
    CLAIMED_IDENTIFIER_TYPE, OP_IDENTIFIER_TYPE,
    ax::AX_NS,
    error::{DiscoveryError, DiscoveryFailure},
    identifier::Identifier,
    xrds::{self, Xrd},
};

const XRDS_CONTENT_TYPE: &str = "application/xrds+xml";
const YADIS_ACCEPT: &str =
    "application/xrds+xml, text/html;q=0.9, application/xhtml+xml;q=0.9, */*;q=0.1";
const XRDS_LOCATION_HEADER: &str = "x-xrds-location";

/// Largest response body read from a remote party.
pub(crate) const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointKind {
    /// The user entered the provider's own identifier; the provider picks the identity.
    OpIdentifier,
    /// The user entered their own identifier.
    ClaimedIdentifier,
}

/// A provider endpoint found by discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub provider_endpoint: Url,
    pub kind: EndpointKind,
    /// `None` for OP identifier endpoints.
    pub claimed_identifier: Option<String>,
    pub op_local_identifier: Option<String>,
    pub priority: Option<u32>,
    pub supports_ax: bool,
}

impl ServiceEndpoint {
    /// Identifier the provider knows the user by; defaults to the claimed identifier.
    #[must_use]
    pub fn local_identifier(&self) -> Option<&str> {
        self.op_local_identifier
            .as_deref()
            .or(self.claimed_identifier.as_deref())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Discoverer {
    client: Client,
    xri_resolver: Url,
}

impl Discoverer {
    pub(crate) fn new(client: Client, xri_resolver: Url) -> Self {
        Self {
            client,
            xri_resolver,
        }
    }

    /// Resolve an identifier to its endpoints, best first.
    ///
    /// # Errors
    ///
    /// Fails when the identifier cannot be fetched or no `OpenID` 2.0 endpoint is found.
    #[instrument(skip_all, fields(identifier = %identifier))]
    pub(crate) async fn discover(
        &self,
        identifier: &Identifier,
    ) -> Result<Vec<ServiceEndpoint>, DiscoveryError> {
        let result = match identifier {
            Identifier::Xri(xri) => self.discover_xri(xri).await,
            Identifier::Uri(url) => self.discover_url(url).await,
        };

        let endpoints = result.map_err(|cause| DiscoveryError::new(identifier.as_str(), cause))?;
        if endpoints.is_empty() {
            return Err(DiscoveryError::new(
                identifier.as_str(),
                DiscoveryFailure::NoEndpoint,
            ));
        }

        debug!("discovered {} endpoint(s)", endpoints.len());
        Ok(endpoints)
    }

    async fn discover_xri(&self, xri: &str) -> Result<Vec<ServiceEndpoint>, DiscoveryFailure> {
        let mut resolver_url = self
            .xri_resolver
            .join(xri)
            .map_err(|err| DiscoveryFailure::Malformed(err.to_string()))?;
        resolver_url
            .query_pairs_mut()
            .append_pair("_xrd_r", "application/xrds+xml;sep=false");

        let document = self.fetch_xrds(resolver_url).await?;
        let xrd = xrds::parse(&document)?;
        let canonical_id = xrd.canonical_id.clone().ok_or_else(|| {
            DiscoveryFailure::Malformed("XRI resolution returned no CanonicalID".to_string())
        })?;

        Ok(endpoints_from_xrd(&xrd, &canonical_id))
    }

    async fn discover_url(&self, url: &Url) -> Result<Vec<ServiceEndpoint>, DiscoveryFailure> {
        let response = self.get(url.clone()).await?;

        // The claimed identifier is the URL after following redirects.
        let mut claimed = response.url().clone();
        claimed.set_fragment(None);

        let headers = response.headers().clone();
        let body = document_body(response).await?;

        if is_xrds(&headers) {
            return Ok(endpoints_from_xrd(&xrds::parse(&body)?, claimed.as_str()));
        }

        if let Some(location) = header_xrds_location(&headers, &claimed) {
            debug!("following X-XRDS-Location header to {location}");
            let document = self.fetch_xrds(location).await?;
            return Ok(endpoints_from_xrd(&xrds::parse(&document)?, claimed.as_str()));
        }

        let hints = xrds::html_hints(&body)?;
        if let Some(location) = hints
            .xrds_location
            .as_deref()
            .and_then(|location| claimed.join(location).ok())
        {
            debug!("following X-XRDS-Location meta tag to {location}");
            let document = self.fetch_xrds(location).await?;
            let endpoints = endpoints_from_xrd(&xrds::parse(&document)?, claimed.as_str());
            if !endpoints.is_empty() {
                return Ok(endpoints);
            }
        }

        Ok(html_endpoints(&hints, &claimed))
    }

    async fn get(&self, url: Url) -> Result<Response, DiscoveryFailure> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, YADIS_ACCEPT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DiscoveryFailure::Status(response.status()));
        }
        Ok(response)
    }

    async fn fetch_xrds(&self, url: Url) -> Result<String, DiscoveryFailure> {
        document_body(self.get(url).await?).await
    }
}

async fn document_body(response: Response) -> Result<String, DiscoveryFailure> {
    read_limited(response, MAX_BODY_BYTES).await?.ok_or_else(|| {
        DiscoveryFailure::Malformed(format!("document larger than {MAX_BODY_BYTES} bytes"))
    })
}

/// Read a body as text, or `None` once it grows past `limit` bytes.
pub(crate) async fn read_limited(
    mut response: Response,
    limit: usize,
) -> Result<Option<String>, reqwest::Error> {
    if response
        .content_length()
        .is_some_and(|length| length > u64::try_from(limit).unwrap_or(u64::MAX))
    {
        return Ok(None);
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Ok(None);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Some(String::from_utf8_lossy(&body).into_owned()))
}

fn is_xrds(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim().to_ascii_lowercase().starts_with(XRDS_CONTENT_TYPE))
}

fn header_xrds_location(headers: &HeaderMap, base: &Url) -> Option<Url> {
    let value = headers.get(XRDS_LOCATION_HEADER)?.to_str().ok()?.trim();
    base.join(value).ok()
}

fn http_url(value: &str) -> Option<Url> {
    Url::parse(value)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Turn the services of an XRD into endpoints, OP identifier services first,
/// then by ascending priority. Services without a priority sort last.
pub(crate) fn endpoints_from_xrd(xrd: &Xrd, claimed_identifier: &str) -> Vec<ServiceEndpoint> {
    let mut endpoints = Vec::new();

    for service in &xrd.services {
        let has_type = |wanted: &str| service.types.iter().any(|t| t == wanted);
        let kind = if has_type(OP_IDENTIFIER_TYPE) {
            EndpointKind::OpIdentifier
        } else if has_type(CLAIMED_IDENTIFIER_TYPE) {
            EndpointKind::ClaimedIdentifier
        } else {
            continue;
        };

        let mut uris: Vec<&(Option<u32>, String)> = service.uris.iter().collect();
        uris.sort_by_key(|(priority, _)| priority.unwrap_or(u32::MAX));

        for (_, uri) in uris {
            let Some(provider_endpoint) = http_url(uri) else {
                continue;
            };
            let (claimed, local) = match kind {
                EndpointKind::OpIdentifier => (None, None),
                EndpointKind::ClaimedIdentifier => (
                    Some(claimed_identifier.to_string()),
                    service.local_id.clone(),
                ),
            };
            endpoints.push(ServiceEndpoint {
                provider_endpoint,
                kind,
                claimed_identifier: claimed,
                op_local_identifier: local,
                priority: service.priority,
                supports_ax: has_type(AX_NS),
            });
        }
    }

    endpoints.sort_by_key(|endpoint| {
        (
            endpoint.kind != EndpointKind::OpIdentifier,
            endpoint.priority.unwrap_or(u32::MAX),
        )
    });
    endpoints
}

fn html_endpoints(hints: &xrds::HtmlHints, claimed: &Url) -> Vec<ServiceEndpoint> {
    hints
        .provider
        .as_deref()
        .and_then(|provider| claimed.join(provider).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|provider_endpoint| ServiceEndpoint {
            provider_endpoint,
            kind: EndpointKind::ClaimedIdentifier,
            claimed_identifier: Some(claimed.to_string()),
            op_local_identifier: hints.local_id.clone(),
            priority: None,
            supports_ax: false,
        })
        .into_iter()
        .collect()
}
