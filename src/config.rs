use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which configuration settings are overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Check whether a setting key (e.g. "api.base_url") is overridden by an env var.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Get the env var name that overrides the given setting key.
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str)
    }

    /// Get all overrides as a map of setting key -> env var name.
    pub fn all(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Paths of the identity endpoints, relative to `api.base_url`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_login_path")]
    pub login: String,
    #[serde(default = "default_refresh_path")]
    pub refresh: String,
    #[serde(default = "default_logout_path")]
    pub logout: String,
    #[serde(default = "default_user_path")]
    pub user: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: default_login_path(),
            refresh: default_refresh_path(),
            logout: default_logout_path(),
            user: default_user_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Lead time before expiry at which the proactive renewal fires.
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,
    /// Period of the liveness check.
    #[serde(default = "default_liveness_interval_secs")]
    pub liveness_interval_secs: u64,
    /// Bound on a single renewal call.
    #[serde(default = "default_renewal_timeout_secs")]
    pub renewal_timeout_secs: u64,
    /// Bound on how long a queued caller waits for the in-flight renewal.
    #[serde(default = "default_waiter_timeout_secs")]
    pub waiter_timeout_secs: u64,
    /// Statuses that mean "credential rejected, renew and retry".
    #[serde(default = "default_auth_rejected_statuses")]
    pub auth_rejected_statuses: Vec<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            safety_margin_secs: default_safety_margin_secs(),
            liveness_interval_secs: default_liveness_interval_secs(),
            renewal_timeout_secs: default_renewal_timeout_secs(),
            waiter_timeout_secs: default_waiter_timeout_secs(),
            auth_rejected_statuses: default_auth_rejected_statuses(),
        }
    }
}

impl SessionConfig {
    pub fn safety_margin(&self) -> Duration {
        Duration::from_secs(self.safety_margin_secs)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_interval_secs.max(1))
    }

    pub fn renewal_timeout(&self) -> Duration {
        Duration::from_secs(self.renewal_timeout_secs)
    }

    /// Never shorter than the renewal timeout, so a queued caller cannot give
    /// up on a renewal that may still succeed.
    pub fn waiter_timeout(&self) -> Duration {
        Duration::from_secs(self.waiter_timeout_secs.max(self.renewal_timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}
const fn default_connect_timeout_secs() -> u64 {
    10
}
const fn default_request_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("recruit-session/{}", env!("CARGO_PKG_VERSION"))
}
fn default_login_path() -> String {
    "/login".to_string()
}
fn default_refresh_path() -> String {
    "/refresh-token".to_string()
}
fn default_logout_path() -> String {
    "/logout".to_string()
}
fn default_user_path() -> String {
    "/user".to_string()
}
const fn default_safety_margin_secs() -> u64 {
    120
}
const fn default_liveness_interval_secs() -> u64 {
    300
}
const fn default_renewal_timeout_secs() -> u64 {
    15
}
const fn default_waiter_timeout_secs() -> u64 {
    30
}
fn default_auth_rejected_statuses() -> Vec<u16> {
    vec![401]
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. Any setting prefixed with `RECRUIT_` takes precedence over
    /// the file value and is tracked in `env_overrides`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Save the current (file-level) configuration to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `RECRUIT_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                        ov.record($key, $env);
                    }
                }
            };
        }

        // -- API --
        env_str!("api.base_url", "RECRUIT_API_BASE_URL", self.api.base_url);
        env_parse!(
            "api.connect_timeout_secs",
            "RECRUIT_API_CONNECT_TIMEOUT_SECS",
            self.api.connect_timeout_secs
        );
        env_parse!(
            "api.request_timeout_secs",
            "RECRUIT_API_REQUEST_TIMEOUT_SECS",
            self.api.request_timeout_secs
        );
        env_str!("api.user_agent", "RECRUIT_API_USER_AGENT", self.api.user_agent);

        // -- Endpoints --
        env_str!("endpoints.login", "RECRUIT_ENDPOINT_LOGIN", self.endpoints.login);
        env_str!("endpoints.refresh", "RECRUIT_ENDPOINT_REFRESH", self.endpoints.refresh);
        env_str!("endpoints.logout", "RECRUIT_ENDPOINT_LOGOUT", self.endpoints.logout);
        env_str!("endpoints.user", "RECRUIT_ENDPOINT_USER", self.endpoints.user);

        // -- Session --
        env_parse!(
            "session.safety_margin_secs",
            "RECRUIT_SESSION_SAFETY_MARGIN_SECS",
            self.session.safety_margin_secs
        );
        env_parse!(
            "session.liveness_interval_secs",
            "RECRUIT_SESSION_LIVENESS_INTERVAL_SECS",
            self.session.liveness_interval_secs
        );
        env_parse!(
            "session.renewal_timeout_secs",
            "RECRUIT_SESSION_RENEWAL_TIMEOUT_SECS",
            self.session.renewal_timeout_secs
        );
        env_parse!(
            "session.waiter_timeout_secs",
            "RECRUIT_SESSION_WAITER_TIMEOUT_SECS",
            self.session.waiter_timeout_secs
        );
        if let Ok(val) = std::env::var("RECRUIT_SESSION_AUTH_REJECTED_STATUSES") {
            let statuses: Vec<u16> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if !statuses.is_empty() {
                self.session.auth_rejected_statuses = statuses;
                ov.record(
                    "session.auth_rejected_statuses",
                    "RECRUIT_SESSION_AUTH_REJECTED_STATUSES",
                );
            }
        }

        // -- Logging --
        env_str!("logging.level", "RECRUIT_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "RECRUIT_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}
