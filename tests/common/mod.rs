#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use recruit_session::{Config, SessionManager};
use wiremock::MockServer;

/// Mint a JWT-shaped token for `subject` expiring `ttl_secs` from now.
pub fn token(subject: &str, ttl_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::json!({
        "sub": subject,
        "role": "recruiter",
        "exp": chrono::Utc::now().timestamp() + ttl_secs,
    });
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{payload}.signature")
}

pub fn token_body(token: &str) -> serde_json::Value {
    serde_json::json!({ "accessToken": token })
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Default configuration pointed at `server`.
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config
}

pub fn session_for(config: Config) -> Arc<SessionManager> {
    Arc::new(SessionManager::from_config(config))
}
