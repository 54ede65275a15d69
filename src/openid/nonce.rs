//! Replay protection for positive assertions.

use std::collections::HashMap;
use time::{Duration, OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::Mutex;

use super::error::ProtocolError;

const MAX_NONCE_LENGTH: usize = 255;
const FUTURE_SKEW: Duration = Duration::minutes(1);

/// Remembers `(op_endpoint, response_nonce)` pairs until they age out.
#[derive(Debug)]
pub(crate) struct NonceStore {
    max_age: Duration,
    seen: Mutex<HashMap<(String, String), OffsetDateTime>>,
}

impl NonceStore {
    pub(crate) fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Accept a nonce once. Expired, future-dated or repeated nonces are rejected.
    pub(crate) async fn consume(
        &self,
        endpoint: &str,
        nonce: &str,
        now: OffsetDateTime,
    ) -> Result<(), ProtocolError> {
        let issued_at = nonce_timestamp(nonce)?;
        if now - issued_at > self.max_age {
            return Err(ProtocolError::NonceExpired);
        }
        if issued_at - now > FUTURE_SKEW {
            return Err(ProtocolError::NonceFromFuture);
        }

        let mut seen = self.seen.lock().await;
        seen.retain(|_, issued| now - *issued <= self.max_age);

        let key = (endpoint.to_string(), nonce.to_string());
        if seen.contains_key(&key) {
            return Err(ProtocolError::NonceReplayed);
        }
        seen.insert(key, issued_at);
        Ok(())
    }
}

/// The timestamp prefix of a nonce, e.g. `2005-05-15T17:11:51ZUNIQUE`.
pub(crate) fn nonce_timestamp(nonce: &str) -> Result<OffsetDateTime, ProtocolError> {
    if nonce.len() > MAX_NONCE_LENGTH {
        return Err(ProtocolError::MalformedNonce);
    }
    let end = nonce.find('Z').ok_or(ProtocolError::MalformedNonce)?;
    OffsetDateTime::parse(&nonce[..=end], &Rfc3339).map_err(|_| ProtocolError::MalformedNonce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2026-10-16 12:00:00 UTC);

    #[test]
    fn nonce_timestamp_parses_prefix() {
        assert_eq!(
            nonce_timestamp("2026-10-16T11:59:30Zabc123").ok(),
            Some(datetime!(2026-10-16 11:59:30 UTC))
        );
        assert!(matches!(
            nonce_timestamp("no-timestamp"),
            Err(ProtocolError::MalformedNonce)
        ));
        assert!(matches!(
            nonce_timestamp("2026-13-40T99:00:00Zx"),
            Err(ProtocolError::MalformedNonce)
        ));
    }

    #[tokio::test]
    async fn consume_accepts_once() {
        let store = NonceStore::new(Duration::minutes(5));
        let nonce = "2026-10-16T11:59:00Zunique";
        assert!(store.consume("https://op.example.com/", nonce, NOW).await.is_ok());
        assert!(matches!(
            store.consume("https://op.example.com/", nonce, NOW).await,
            Err(ProtocolError::NonceReplayed)
        ));
        // same nonce from a different provider is a different value
        assert!(store.consume("https://other.example.com/", nonce, NOW).await.is_ok());
    }

    #[tokio::test]
    async fn consume_rejects_old_and_future_nonces() {
        let store = NonceStore::new(Duration::minutes(5));
        assert!(matches!(
            store
                .consume("https://op.example.com/", "2026-10-16T11:50:00Zold", NOW)
                .await,
            Err(ProtocolError::NonceExpired)
        ));
        assert!(matches!(
            store
                .consume("https://op.example.com/", "2026-10-16T12:05:00Zfuture", NOW)
                .await,
            Err(ProtocolError::NonceFromFuture)
        ));
    }
}
