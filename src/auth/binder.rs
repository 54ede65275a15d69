use super::session::{SessionContext, SessionValues};
use crate::openid::ax::FetchResponse;

/// Record a successful authentication, replacing whatever the session held before.
pub fn bind_session(
    session: &mut SessionContext,
    display_name: &str,
    claimed_identifier: &str,
    friendly_identifier: &str,
    fetch_response: Option<FetchResponse>,
) {
    session.set_identity(display_name);
    session.set_values(SessionValues {
        provider_url: Some(friendly_identifier.to_string()),
        claimed_identifier: Some(claimed_identifier.to_string()),
        fetch_response,
    });
}

/// Forget the authenticated user. Safe to call when nobody is signed in.
pub fn sign_out(session: &mut SessionContext) {
    session.clear_identity();
    session.clear_values();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openid::ax::attributes;

    #[test]
    fn bind_overwrites_previous_values() {
        let mut session = SessionContext::new();
        bind_session(
            &mut session,
            "bob",
            "http://bob.example.com/",
            "bob.example.com",
            None,
        );

        let mut fetched = FetchResponse::new();
        fetched.insert(attributes::EMAIL, vec!["jane@example.com".to_string()]);
        bind_session(
            &mut session,
            "jane@example.com",
            "http://jane.example.com/",
            "jane.example.com",
            Some(fetched.clone()),
        );

        assert_eq!(session.identity(), Some("jane@example.com"));
        assert_eq!(
            session.values(),
            &SessionValues {
                provider_url: Some("jane.example.com".to_string()),
                claimed_identifier: Some("http://jane.example.com/".to_string()),
                fetch_response: Some(fetched),
            }
        );
    }

    #[test]
    fn sign_out_twice_is_harmless() {
        let mut session = SessionContext::new();
        bind_session(
            &mut session,
            "Jane Doe",
            "http://jane.example.com/",
            "jane.example.com",
            None,
        );

        sign_out(&mut session);
        assert_eq!(session.identity(), None);
        assert_eq!(session.values(), &SessionValues::default());

        sign_out(&mut session);
        assert_eq!(session.identity(), None);
        assert_eq!(session.values(), &SessionValues::default());
    }
}
