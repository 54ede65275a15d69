//! Minimal XRDS and HTML scraping for discovery.
//!
//! Only the handful of elements discovery cares about are extracted: the final
//! `XRD`, its `CanonicalID`, and each `Service` with its `Type`, `URI` and
//! `LocalID` children. Namespace prefixes on element names are tolerated.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

use super::error::DiscoveryFailure;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct XrdService {
    pub(crate) priority: Option<u32>,
    pub(crate) types: Vec<String>,
    /// `(priority, uri)` in document order.
    pub(crate) uris: Vec<(Option<u32>, String)>,
    pub(crate) local_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Xrd {
    pub(crate) canonical_id: Option<String>,
    pub(crate) services: Vec<XrdService>,
}

type Pattern = Lazy<Result<Regex, regex::Error>>;

fn element(name: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?is)<(?:[\w.-]+:)?{name}\b([^>]*)>(.*?)</(?:[\w.-]+:)?{name}\s*>"
    ))
}

static XRD: Pattern = Lazy::new(|| element("XRD"));
static CANONICAL_ID: Pattern = Lazy::new(|| element("CanonicalID"));
static SERVICE: Pattern = Lazy::new(|| element("Service"));
static TYPE: Pattern = Lazy::new(|| element("Type"));
static URI: Pattern = Lazy::new(|| element("URI"));
static LOCAL_ID: Pattern = Lazy::new(|| element("LocalID"));
static PRIORITY: Pattern = Lazy::new(|| Regex::new(r#"(?i)\bpriority\s*=\s*["'](\d+)["']"#));
static MARKUP_COMMENT: Pattern = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->"));
static CDATA: Pattern = Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>"));
static META: Pattern = Lazy::new(|| Regex::new(r"(?is)<meta\b([^>]*)>"));
static LINK: Pattern = Lazy::new(|| Regex::new(r"(?is)<link\b([^>]*)>"));
static ATTRIBUTE: Pattern =
    Lazy::new(|| Regex::new(r#"(?is)(?:^|\s)([\w:.-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#));

fn compiled(pattern: &'static Pattern) -> Result<&'static Regex, DiscoveryFailure> {
    match Lazy::force(pattern) {
        Ok(regex) => Ok(regex),
        Err(err) => Err(DiscoveryFailure::Malformed(err.to_string())),
    }
}

/// Drop comments so commented-out markup is never matched. CDATA sections
/// keep their text but lose the wrapper.
fn strip_markup(document: &str) -> Result<Cow<'_, str>, DiscoveryFailure> {
    let without_comments = compiled(&MARKUP_COMMENT)?.replace_all(document, "");
    let cdata = compiled(&CDATA)?;
    if cdata.is_match(&without_comments) {
        Ok(Cow::Owned(cdata.replace_all(&without_comments, "$1").into_owned()))
    } else {
        Ok(without_comments)
    }
}

fn priority(attributes: &str) -> Result<Option<u32>, DiscoveryFailure> {
    Ok(compiled(&PRIORITY)?
        .captures(attributes)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok()))
}

/// Parse an XRDS document, keeping the last `XRD` (the one describing the
/// resolved identifier when the resolver followed references).
pub(crate) fn parse(document: &str) -> Result<Xrd, DiscoveryFailure> {
    let document = strip_markup(document)?;
    let body = compiled(&XRD)?
        .captures_iter(&document)
        .last()
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
        .ok_or_else(|| DiscoveryFailure::Malformed("no XRD element".to_string()))?;

    let type_re = compiled(&TYPE)?;
    let uri_re = compiled(&URI)?;
    let local_id_re = compiled(&LOCAL_ID)?;

    let canonical_id = compiled(&CANONICAL_ID)?
        .captures(body)
        .and_then(|caps| caps.get(2))
        .map(|m| unescape(m.as_str().trim()))
        .filter(|id| !id.is_empty());

    let mut services = Vec::new();
    for caps in compiled(&SERVICE)?.captures_iter(body) {
        let attributes = caps.get(1).map_or("", |m| m.as_str());
        let inner = caps.get(2).map_or("", |m| m.as_str());

        let types = type_re
            .captures_iter(inner)
            .filter_map(|c| c.get(2))
            .map(|m| unescape(m.as_str().trim()))
            .collect();

        let mut uris = Vec::new();
        for uri in uri_re.captures_iter(inner) {
            let uri_priority = priority(uri.get(1).map_or("", |m| m.as_str()))?;
            if let Some(value) = uri.get(2) {
                uris.push((uri_priority, unescape(value.as_str().trim())));
            }
        }

        let local_id = local_id_re
            .captures(inner)
            .and_then(|c| c.get(2))
            .map(|m| unescape(m.as_str().trim()))
            .filter(|id| !id.is_empty());

        services.push(XrdService {
            priority: priority(attributes)?,
            types,
            uris,
            local_id,
        });
    }

    Ok(Xrd {
        canonical_id,
        services,
    })
}

/// Attributes of a tag as `(lowercased name, unescaped value)`.
fn attributes(source: &str) -> Result<Vec<(String, String)>, DiscoveryFailure> {
    Ok(compiled(&ATTRIBUTE)?
        .captures_iter(source)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?;
            Some((name, unescape(value.as_str().trim())))
        })
        .collect())
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// HTML-based discovery hints found in a page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct HtmlHints {
    pub(crate) xrds_location: Option<String>,
    pub(crate) provider: Option<String>,
    pub(crate) local_id: Option<String>,
}

pub(crate) fn html_hints(document: &str) -> Result<HtmlHints, DiscoveryFailure> {
    let document = strip_markup(document)?;
    let mut hints = HtmlHints::default();

    for caps in compiled(&META)?.captures_iter(&document) {
        let attributes = attributes(caps.get(1).map_or("", |m| m.as_str()))?;
        let is_xrds = attribute(&attributes, "http-equiv")
            .is_some_and(|value| value.eq_ignore_ascii_case("X-XRDS-Location"));
        if is_xrds && hints.xrds_location.is_none() {
            hints.xrds_location = attribute(&attributes, "content").map(str::to_string);
        }
    }

    for caps in compiled(&LINK)?.captures_iter(&document) {
        let attributes = attributes(caps.get(1).map_or("", |m| m.as_str()))?;
        let rel = attribute(&attributes, "rel");
        let href = attribute(&attributes, "href");
        let (Some(rel), Some(href)) = (rel, href) else {
            continue;
        };
        for value in rel.split_whitespace() {
            if value.eq_ignore_ascii_case("openid2.provider") && hints.provider.is_none() {
                hints.provider = Some(href.to_string());
            } else if value.eq_ignore_ascii_case("openid2.local_id") && hints.local_id.is_none() {
                hints.local_id = Some(href.to_string());
            }
        }
    }

    Ok(hints)
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const XRDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)">
  <XRD>
    <Service priority="10">
      <Type>http://specs.openid.net/auth/2.0/signon</Type>
      <Type>http://openid.net/srv/ax/1.0</Type>
      <URI>https://op.example.com/server?a=1&amp;b=2</URI>
      <LocalID>https://alice.op.example.com/</LocalID>
    </Service>
    <Service priority="0">
      <Type>http://specs.openid.net/auth/2.0/server</Type>
      <URI priority="5">https://op.example.com/backup</URI>
      <URI priority="1">https://op.example.com/primary</URI>
    </Service>
  </XRD>
</xrds:XRDS>"#;

    #[test]
    fn parse_extracts_services() {
        let xrd = parse(XRDS).ok();
        let services = xrd.map(|x| x.services).unwrap_or_default();
        assert_eq!(services.len(), 2);

        assert_eq!(services[0].priority, Some(10));
        assert_eq!(
            services[0].types,
            vec![
                "http://specs.openid.net/auth/2.0/signon".to_string(),
                "http://openid.net/srv/ax/1.0".to_string()
            ]
        );
        assert_eq!(
            services[0].uris,
            vec![(None, "https://op.example.com/server?a=1&b=2".to_string())]
        );
        assert_eq!(
            services[0].local_id.as_deref(),
            Some("https://alice.op.example.com/")
        );

        assert_eq!(services[1].priority, Some(0));
        assert_eq!(
            services[1].uris,
            vec![
                (Some(5), "https://op.example.com/backup".to_string()),
                (Some(1), "https://op.example.com/primary".to_string())
            ]
        );
    }

    #[test]
    fn parse_uses_last_xrd_and_canonical_id() {
        let document = r#"<XRDS>
<XRD><Query>*example</Query><CanonicalID>@!1</CanonicalID></XRD>
<XRD><Query>*alice</Query><CanonicalID>=!1234.5678</CanonicalID>
  <Service><Type>http://specs.openid.net/auth/2.0/signon</Type><URI>https://xri.example.net/op</URI></Service>
</XRD></XRDS>"#;
        let xrd = parse(document).ok();
        assert_eq!(
            xrd.as_ref().and_then(|x| x.canonical_id.as_deref()),
            Some("=!1234.5678")
        );
        assert_eq!(xrd.map(|x| x.services.len()), Some(1));
    }

    #[test]
    fn parse_skips_commented_services() {
        let document = r#"<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)">
  <XRD>
    <!-- <Service priority="0">
      <Type>http://specs.openid.net/auth/2.0/server</Type>
      <URI>https://evil.example.com/</URI>
    </Service> -->
    <Service priority="10">
      <Type>http://specs.openid.net/auth/2.0/signon</Type>
      <URI><![CDATA[https://op.example.com/]]></URI>
    </Service>
  </XRD>
</xrds:XRDS>"#;
        let services = parse(document).map(|x| x.services).unwrap_or_default();
        let uris: Vec<&str> = services
            .iter()
            .flat_map(|service| service.uris.iter().map(|(_, uri)| uri.as_str()))
            .collect();
        assert_eq!(uris, vec!["https://op.example.com/"]);
    }

    #[test]
    fn parse_rejects_document_without_xrd() {
        assert!(matches!(
            parse("<html><body>hello</body></html>"),
            Err(DiscoveryFailure::Malformed(_))
        ));
    }

    #[test]
    fn html_hints_reads_links_and_meta() {
        let page = r#"<html><head>
<meta http-equiv="X-XRDS-Location" content="https://alice.example.com/yadis.xrds">
<link rel="stylesheet" href="/site.css">
<link rel="openid2.provider openid.server" href="https://op.example.com/auth?x=1&amp;y=2" />
<link href='https://alice.op.example.com/' rel='openid2.local_id'>
</head></html>"#;
        let hints = html_hints(page).ok().unwrap_or_default();
        assert_eq!(
            hints.xrds_location.as_deref(),
            Some("https://alice.example.com/yadis.xrds")
        );
        assert_eq!(
            hints.provider.as_deref(),
            Some("https://op.example.com/auth?x=1&y=2")
        );
        assert_eq!(
            hints.local_id.as_deref(),
            Some("https://alice.op.example.com/")
        );
    }

    #[test]
    fn html_hints_ignore_commented_links() {
        let page = r#"<html><head>
<!-- <link rel="openid2.provider" href="https://old.example.com/auth"> -->
<link rel="openid2.provider" href="https://op.example.com/auth">
</head></html>"#;
        let hints = html_hints(page).ok().unwrap_or_default();
        assert_eq!(hints.provider.as_deref(), Some("https://op.example.com/auth"));
    }

    #[test]
    fn html_hints_empty_for_plain_page() {
        let hints = html_hints("<html><head><title>Alice</title></head></html>").ok();
        assert_eq!(hints, Some(HtmlHints::default()));
    }
}
