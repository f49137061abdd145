//! Access credentials.
//!
//! An [`AccessCredential`] pairs the raw bearer string with the claims
//! decoded from it by [`codec::decode`]. Credentials are immutable and
//! shared as `Arc<AccessCredential>`; renewal replaces the whole value.

pub mod codec;

pub use codec::{Claims, DecodeError, decode};

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// A decoded, immutable access credential.
#[derive(Clone, PartialEq)]
pub struct AccessCredential {
    raw: String,
    claims: Claims,
}

impl AccessCredential {
    /// Decode `raw` into a credential.
    pub fn parse(raw: impl Into<String>) -> Result<Self, DecodeError> {
        let raw = raw.into();
        let claims = decode(&raw)?;
        let raw = raw.trim().trim_start_matches("Bearer ").trim().to_string();
        Ok(Self { raw, claims })
    }

    /// The raw bearer token.
    pub fn token(&self) -> &str {
        &self.raw
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.raw)
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn subject(&self) -> &str {
        &self.claims.subject
    }

    pub fn role(&self) -> &str {
        &self.claims.role
    }

    /// Expiry as milliseconds since the Unix epoch.
    pub fn expires_at_ms(&self) -> i64 {
        self.claims.expires_at_ms
    }

    /// Expiry as a UTC timestamp, if representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.claims.expires_at_ms).single()
    }

    /// Whether the credential has reached its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.claims.expires_at_ms <= now_ms()
    }

    /// Time left before expiry, `Duration::ZERO` once expired.
    pub fn time_until_expiry(&self) -> Duration {
        let remaining = self.claims.expires_at_ms.saturating_sub(now_ms());
        if remaining > 0 {
            Duration::from_millis(remaining as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("subject", &self.claims.subject)
            .field("role", &self.claims.role)
            .field("expires_at_ms", &self.claims.expires_at_ms)
            .finish_non_exhaustive()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
pub(crate) fn token_expiring_in(subject: &str, secs: i64) -> String {
    let exp = Utc::now().timestamp() + secs;
    codec::encode_for_test(&serde_json::json!({
        "sub": subject,
        "role": "recruiter",
        "exp": exp,
    }))
}
