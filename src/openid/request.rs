use url::Url;

use super::{
    IDENTIFIER_SELECT, OPENID2_NS,
    ax::FetchRequest,
    discovery::{EndpointKind, ServiceEndpoint},
    message::Message,
};

/// An outbound `checkid_setup` request for one discovered endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationRequest {
    endpoint: ServiceEndpoint,
    return_to: Url,
    realm: Url,
    fetch: Option<FetchRequest>,
}

impl AuthenticationRequest {
    #[must_use]
    pub fn new(endpoint: ServiceEndpoint, return_to: Url, realm: Url) -> Self {
        Self {
            endpoint,
            return_to,
            realm,
            fetch: None,
        }
    }

    /// Attach an attribute exchange fetch request, replacing any previous one.
    pub fn add_extension(&mut self, fetch: FetchRequest) {
        self.fetch = Some(fetch);
    }

    #[must_use]
    pub fn provider(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn return_to(&self) -> &Url {
        &self.return_to
    }

    #[must_use]
    pub fn fetch_request(&self) -> Option<&FetchRequest> {
        self.fetch.as_ref()
    }

    pub(crate) fn message(&self) -> Message {
        let (claimed_id, identity) = match self.endpoint.kind {
            EndpointKind::OpIdentifier => (IDENTIFIER_SELECT, IDENTIFIER_SELECT),
            EndpointKind::ClaimedIdentifier => {
                let claimed = self
                    .endpoint
                    .claimed_identifier
                    .as_deref()
                    .unwrap_or(IDENTIFIER_SELECT);
                (
                    claimed,
                    self.endpoint.local_identifier().unwrap_or(claimed),
                )
            }
        };

        let mut message = Message::new();
        message.insert("ns", OPENID2_NS);
        message.insert("mode", "checkid_setup");
        message.insert("claimed_id", claimed_id);
        message.insert("identity", identity);
        message.insert("return_to", self.return_to.as_str());
        message.insert("realm", self.realm.as_str());
        if let Some(fetch) = &self.fetch {
            message.extend(fetch.to_fields());
        }
        message
    }

    /// Provider URL carrying the request as query parameters; the caller redirects
    /// the browser here.
    #[must_use]
    pub fn redirect_url(&self) -> Url {
        let mut url = self.endpoint.provider_endpoint.clone();
        url.query_pairs_mut().extend_pairs(self.message().to_pairs());
        url
    }
}
