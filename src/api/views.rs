//! Server-rendered pages.

use url::form_urlencoded;

use crate::auth::SessionValues;
use crate::openid::ax::attributes;

pub(crate) const IDENTIFIER_FIELD: &str = "openid_identifier";

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, identity: Option<&str>, body: &str) -> String {
    let account = match identity {
        Some(name) => format!(
            r#"Signed in as <strong>{}</strong> | <a href="/user/logoff">Sign out</a>"#,
            escape(name)
        ),
        None => r#"<a href="/user">Sign in</a>"#.to_string(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8" />
    <title>{title}</title>
</head>
<body>
    <header><a href="/">Home</a> | <a href="/secured">Secured</a> | {account}</header>
    <main>
{body}
    </main>
</body>
</html>
"#,
        title = escape(title),
    )
}

pub(crate) fn home(identity: Option<&str>) -> String {
    layout(
        "Home",
        identity,
        "        <h1>OpenID relying party</h1>\n        <p>Sign in with your OpenID to see the secured page.</p>",
    )
}

pub(crate) fn secured(identity: &str, values: &SessionValues) -> String {
    let mut rows = Vec::new();
    if let Some(provider_url) = &values.provider_url {
        rows.push(("OpenID", provider_url.clone()));
    }
    if let Some(claimed) = &values.claimed_identifier {
        rows.push(("Claimed identifier", claimed.clone()));
    }
    if let Some(fetched) = &values.fetch_response {
        for (label, type_uri) in [
            ("Full name", attributes::FULL_NAME),
            ("Email", attributes::EMAIL),
        ] {
            if let Some(value) = fetched.first_value(type_uri) {
                rows.push((label, value.to_string()));
            }
        }
    }

    let rows: String = rows
        .iter()
        .map(|(label, value)| {
            format!(
                "            <tr><th>{}</th><td>{}</td></tr>\n",
                escape(label),
                escape(value)
            )
        })
        .collect();

    layout(
        "Secured",
        Some(identity),
        &format!(
            "        <h1>Welcome, {}</h1>\n        <table>\n{rows}        </table>",
            escape(identity)
        ),
    )
}

/// The identifier form. `returnUrl` is carried in the form action so it survives the round trip.
pub(crate) fn entry(return_url: Option<&str>, message: Option<&str>) -> String {
    let mut action = "/user/authenticate".to_string();
    if let Some(return_url) = return_url.filter(|url| !url.is_empty()) {
        action.push('?');
        action.push_str(
            &form_urlencoded::Serializer::new(String::new())
                .append_pair("returnUrl", return_url)
                .finish(),
        );
    }

    let message = message
        .map(|message| format!(r#"        <p class="error">{}</p>"#, escape(message)))
        .unwrap_or_default();

    layout(
        "Sign in",
        None,
        &format!(
            r#"        <h1>Sign in with OpenID</h1>
{message}
        <form method="post" action="{action}">
            <label for="{IDENTIFIER_FIELD}">OpenID</label>
            <input type="text" id="{IDENTIFIER_FIELD}" name="{IDENTIFIER_FIELD}" autofocus />
            <input type="submit" value="Sign in" />
        </form>"#,
            action = escape(&action),
        ),
    )
}
