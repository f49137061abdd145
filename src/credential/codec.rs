//! Bearer credential decoding.
//!
//! Access credentials are JWT-shaped strings:
//! ```text
//! base64url(header).base64url(payload).signature
//! ```
//! Only the payload is read. The signature is never checked here; the
//! backend is the authority on whether a credential is genuine.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Number of dot-separated segments in a well-formed credential.
const SEGMENT_COUNT: usize = 3;

/// Claim keys accepted as the credential subject, in priority order.
const SUBJECT_KEYS: [&str; 4] = ["sub", "id", "_id", "userId"];

/// Errors produced while decoding a credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The credential string was empty.
    #[error("Credential is empty")]
    Empty,

    /// The credential did not split into header, payload and signature.
    #[error("Expected 3 segments, found {0}")]
    SegmentCount(usize),

    /// The payload segment is not valid base64url.
    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    /// The payload is not a JSON object.
    #[error("Invalid JSON payload: {0}")]
    Json(String),

    /// The payload has no usable `exp` claim.
    #[error("Payload has no numeric `exp` claim")]
    MissingExpiry,

    /// The `exp` claim is not a representable point in time.
    #[error("Expiry claim out of range: {0}")]
    ExpiryOutOfRange(String),
}

/// Claims carried in a credential payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claims {
    /// User identifier. Empty if the payload names none.
    pub subject: String,
    /// Application role (e.g. "recruiter", "candidate"). Empty if absent.
    pub role: String,
    /// Expiry as milliseconds since the Unix epoch.
    pub expires_at_ms: i64,
    /// Issue time as milliseconds since the Unix epoch, when present.
    pub issued_at_ms: Option<i64>,
    /// Every other claim, untouched.
    pub extra: Map<String, Value>,
}

impl Claims {
    fn from_map(mut map: Map<String, Value>) -> Result<Self, DecodeError> {
        let exp = map.remove("exp").ok_or(DecodeError::MissingExpiry)?;
        let expires_at_ms = match exp {
            Value::Number(ref n) => seconds_to_ms(n)
                .ok_or_else(|| DecodeError::ExpiryOutOfRange(n.to_string()))?,
            _ => return Err(DecodeError::MissingExpiry),
        };
        let issued_at_ms = match map.remove("iat") {
            Some(Value::Number(n)) => seconds_to_ms(&n),
            _ => None,
        };

        let subject = SUBJECT_KEYS
            .iter()
            .find_map(|key| match map.get(*key) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default();
        for key in SUBJECT_KEYS {
            map.remove(key);
        }

        let role = match map.remove("role") {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };

        Ok(Self {
            subject,
            role,
            expires_at_ms,
            issued_at_ms,
            extra: map,
        })
    }
}

/// JWT time claims are seconds; fractional seconds are allowed.
///
/// `None` unless the result is a timestamp `chrono` can represent.
fn seconds_to_ms(n: &serde_json::Number) -> Option<i64> {
    let ms = match n.as_i64() {
        Some(secs) => secs.checked_mul(1000)?,
        None => {
            let ms = n.as_f64()? * 1000.0;
            if !ms.is_finite() || ms.abs() >= i64::MAX as f64 {
                return None;
            }
            ms as i64
        }
    };
    Utc.timestamp_millis_opt(ms).single().map(|_| ms)
}

/// Decode a raw bearer credential into its claims.
///
/// Tolerates a leading `Bearer ` prefix and a padded payload segment.
pub fn decode(raw: &str) -> Result<Claims, DecodeError> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }

    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() != SEGMENT_COUNT {
        return Err(DecodeError::SegmentCount(segments.len()));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1].trim_end_matches('='))
        .map_err(|e| DecodeError::Base64(e.to_string()))?;

    match serde_json::from_slice::<Value>(&payload) {
        Ok(Value::Object(map)) => Claims::from_map(map),
        Ok(other) => Err(DecodeError::Json(format!(
            "expected an object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(DecodeError::Json(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub(crate) fn encode_for_test(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_decode_standard_claims() {
        let token = encode_for_test(&json!({
            "sub": "user-42",
            "role": "recruiter",
            "exp": 1_700_000_600,
            "iat": 1_700_000_000,
            "email": "a@b.test"
        }));

        let claims = decode(&token).unwrap();
        assert_eq!(claims.subject, "user-42");
        assert_eq!(claims.role, "recruiter");
        assert_eq!(claims.expires_at_ms, 1_700_000_600_000);
        assert_eq!(claims.issued_at_ms, Some(1_700_000_000_000));
        assert_eq!(claims.extra.get("email"), Some(&json!("a@b.test")));
    }

    #[test]
    fn test_decode_subject_aliases() {
        let token = encode_for_test(&json!({ "id": "abc", "exp": 10 }));
        assert_eq!(decode(&token).unwrap().subject, "abc");

        let token = encode_for_test(&json!({ "_id": 7, "exp": 10 }));
        assert_eq!(decode(&token).unwrap().subject, "7");

        // `sub` wins when several are present
        let token = encode_for_test(&json!({ "sub": "s", "id": "i", "exp": 10 }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.subject, "s");
        assert!(!claims.extra.contains_key("id"));
    }

    #[test]
    fn test_decode_missing_role_is_empty() {
        let token = encode_for_test(&json!({ "sub": "u", "exp": 10 }));
        assert_eq!(decode(&token).unwrap().role, "");
    }

    #[test]
    fn test_decode_bearer_prefix_and_padding() {
        let token = encode_for_test(&json!({ "sub": "u", "exp": 10 }));
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        parts[1].push_str("==");
        let padded = format!("Bearer {}", parts.join("."));
        assert_eq!(decode(&padded).unwrap().subject, "u");
    }

    #[test]
    fn test_decode_fractional_exp() {
        let token = encode_for_test(&json!({ "exp": 12.5 }));
        assert_eq!(decode(&token).unwrap().expires_at_ms, 12_500);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode(""), Err(DecodeError::Empty));
        assert_eq!(decode("   "), Err(DecodeError::Empty));
        assert_eq!(decode("not-a-valid-token"), Err(DecodeError::SegmentCount(1)));
        assert_eq!(decode("a.b.c.d"), Err(DecodeError::SegmentCount(4)));
        assert!(matches!(decode("a.!!!.c"), Err(DecodeError::Base64(_))));

        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("plain text"));
        assert!(matches!(decode(&not_json), Err(DecodeError::Json(_))));

        let array = format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(matches!(decode(&array), Err(DecodeError::Json(_))));

        let no_exp = encode_for_test(&json!({ "sub": "u" }));
        assert_eq!(decode(&no_exp), Err(DecodeError::MissingExpiry));

        let string_exp = encode_for_test(&json!({ "exp": "soon" }));
        assert_eq!(decode(&string_exp), Err(DecodeError::MissingExpiry));
    }

    #[test]
    fn test_decode_rejects_unrepresentable_expiry() {
        for exp in [json!(-1e300), json!(1e300), json!(i64::MAX), json!(i64::MIN), json!(u64::MAX)] {
            let token = encode_for_test(&json!({ "sub": "u", "exp": exp }));
            assert!(
                matches!(decode(&token), Err(DecodeError::ExpiryOutOfRange(_))),
                "exp {exp} should be rejected"
            );
        }

        // An absurd `iat` is dropped rather than failing the credential.
        let token = encode_for_test(&json!({ "exp": 10, "iat": 1e300 }));
        assert_eq!(decode(&token).unwrap().issued_at_ms, None);
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(input in ".*") {
            let _ = decode(&input);
        }

        #[test]
        fn prop_decoded_expiry_is_representable(exp in proptest::num::f64::ANY) {
            let token = encode_for_test(&json!({ "sub": "u", "exp": exp }));
            if let Ok(claims) = decode(&token) {
                prop_assert!(Utc.timestamp_millis_opt(claims.expires_at_ms).single().is_some());
            }
        }

        #[test]
        fn prop_decode_recovers_claims(
            sub in "[a-zA-Z0-9_-]{1,32}",
            role in "[a-z]{0,12}",
            exp in 0i64..4_000_000_000,
        ) {
            let token = encode_for_test(&json!({ "sub": sub, "role": role, "exp": exp }));
            let claims = decode(&token).unwrap();
            prop_assert_eq!(claims.subject, sub);
            prop_assert_eq!(claims.role, role);
            prop_assert_eq!(claims.expires_at_ms, exp * 1000);
        }
    }
}
