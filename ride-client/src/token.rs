//! Access token expiry policy.
//!
//! Access tokens are JWTs. Only the `exp` claim of the payload segment is
//! read; signatures are the server's business. A token whose expiry cannot
//! be decoded is treated as expired, never sent as-is.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

use crate::error::AuthFailure;

/// Default safety margin: tokens expiring within five minutes count as expired.
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_secs(300);

/// Decode the `exp` claim of a JWT.
///
/// # Errors
/// Returns `AuthFailure::MalformedCredential` if the token is not a JWT or
/// carries no numeric `exp`.
pub fn decode_expiry(token: &str) -> Result<DateTime<Utc>, AuthFailure> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_)) => payload,
        _ => {
            return Err(AuthFailure::MalformedCredential(
                "token is not a three-segment JWT".to_string(),
            ))
        },
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthFailure::MalformedCredential(format!("payload is not base64url: {}", e)))?;

    let claims: Value = serde_json::from_slice(&bytes)
        .map_err(|e| AuthFailure::MalformedCredential(format!("payload is not JSON: {}", e)))?;

    let exp = claims
        .get("exp")
        .and_then(|exp| exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64)))
        .ok_or_else(|| AuthFailure::MalformedCredential("missing exp claim".to_string()))?;

    DateTime::from_timestamp(exp, 0)
        .ok_or_else(|| AuthFailure::MalformedCredential(format!("exp {} out of range", exp)))
}

/// Check whether `token` expires within `lookahead` from now.
pub fn is_expired(token: &str, lookahead: Duration) -> bool {
    is_expired_at(token, lookahead, Utc::now())
}

/// Check whether `token` expires within `lookahead` from `now`.
///
/// Undecodable tokens are expired.
pub fn is_expired_at(token: &str, lookahead: Duration, now: DateTime<Utc>) -> bool {
    let expiry = match decode_expiry(token) {
        Ok(expiry) => expiry,
        Err(_) => return true,
    };

    match chrono::Duration::from_std(lookahead) {
        Ok(margin) => expiry <= now + margin,
        // A margin too large to represent swallows every expiry.
        Err(_) => true,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::unsigned_token;

    #[test]
    fn test_expiring_within_lookahead_is_expired() {
        let now = Utc::now();
        let token = unsigned_token(now + chrono::Duration::seconds(120));

        assert!(is_expired_at(&token, DEFAULT_LOOKAHEAD, now));
    }

    #[test]
    fn test_expiring_beyond_lookahead_is_valid() {
        let now = Utc::now();
        let token = unsigned_token(now + chrono::Duration::seconds(301));

        assert!(!is_expired_at(&token, DEFAULT_LOOKAHEAD, now));
    }

    #[test]
    fn test_zero_lookahead_only_rejects_past_tokens() {
        let now = Utc::now();
        let fresh = unsigned_token(now + chrono::Duration::seconds(5));
        let stale = unsigned_token(now - chrono::Duration::seconds(5));

        assert!(!is_expired_at(&fresh, Duration::ZERO, now));
        assert!(is_expired_at(&stale, Duration::ZERO, now));
    }

    #[test]
    fn test_undecodable_tokens_are_expired() {
        let now = Utc::now();
        for token in ["", "opaque", "a.b", "a.!!!.c", "a.bm90LWpzb24.c"] {
            assert!(is_expired_at(token, Duration::ZERO, now), "{:?} should be expired", token);
        }
    }

    #[test]
    fn test_missing_exp_claim() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"u1"}"#);
        let token = format!("h.{}.s", payload);

        assert!(matches!(decode_expiry(&token), Err(AuthFailure::MalformedCredential(_))));
        assert!(is_expired(&token, Duration::ZERO));
    }

    #[test]
    fn test_padded_payload_is_tolerated() {
        let payload = format!("{}==", URL_SAFE_NO_PAD.encode(br#"{"exp":4102444800}"#));
        let token = format!("h.{}.s", payload);

        let expiry = decode_expiry(&token).unwrap();
        assert_eq!(expiry.timestamp(), 4_102_444_800);
    }
}
