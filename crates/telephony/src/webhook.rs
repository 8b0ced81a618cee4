//! Webhook signature verification
//!
//! Providers sign `timestamp.body` with a shared secret (HMAC-SHA256). A
//! request is rejected when the signature does not verify or the timestamp
//! is older than the configured tolerance, which bounds replay windows.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::TelephonyError;

type HmacSha256 = Hmac<Sha256>;

/// Verify a provider webhook signature.
///
/// `signature_hex` is the lowercase hex HMAC-SHA256 of `"{timestamp}.{body}"`
/// under the shared secret. `timestamp` is seconds since epoch as sent in the
/// provider's timestamp header.
pub fn verify_webhook_signature(
    secret: &str,
    timestamp: i64,
    body: &[u8],
    signature_hex: &str,
    tolerance_s: u64,
    now: DateTime<Utc>,
) -> Result<(), TelephonyError> {
    let age = now.timestamp() - timestamp;
    if age < 0 || age as u64 > tolerance_s {
        return Err(TelephonyError::StaleTimestamp);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| TelephonyError::SignatureInvalid)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);

    let expected = hex::decode(signature_hex).map_err(|_| TelephonyError::SignatureInvalid)?;
    // Constant-time comparison
    mac.verify_slice(&expected)
        .map_err(|_| TelephonyError::SignatureInvalid)
}

/// Compute the signature a provider would send, for tests and the simulator
pub fn sign_webhook(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-webhook-secret";

    #[test]
    fn test_valid_signature_accepted() {
        let now = Utc::now();
        let ts = now.timestamp() - 10;
        let body = br#"{"event":"call.incoming"}"#;
        let sig = sign_webhook(SECRET, ts, body);

        assert!(verify_webhook_signature(SECRET, ts, body, &sig, 300, now).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let ts = now.timestamp();
        let body = b"payload";
        let sig = sign_webhook("other-secret", ts, body);

        assert!(matches!(
            verify_webhook_signature(SECRET, ts, body, &sig, 300, now),
            Err(TelephonyError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_stale_timestamp_rejected_despite_valid_signature() {
        let now = Utc::now();
        let ts = now.timestamp() - 400;
        let body = b"payload";
        let sig = sign_webhook(SECRET, ts, body);

        assert!(matches!(
            verify_webhook_signature(SECRET, ts, body, &sig, 300, now),
            Err(TelephonyError::StaleTimestamp)
        ));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let now = Utc::now();
        let ts = now.timestamp() + 60;
        let body = b"payload";
        let sig = sign_webhook(SECRET, ts, body);

        assert!(verify_webhook_signature(SECRET, ts, body, &sig, 300, now).is_err());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = Utc::now();
        let ts = now.timestamp();
        let sig = sign_webhook(SECRET, ts, b"original");

        assert!(verify_webhook_signature(SECRET, ts, b"tampered", &sig, 300, now).is_err());
    }
}
