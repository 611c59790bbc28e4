use std::time::Duration;

use serde_json::{Map, Value};

/// Remote setting holding the inactivity timeout in seconds.
pub const TIMEOUT_SETTING: &str = "app.timeout.seconds";
/// Remote setting holding the auto-refresh interval in seconds.
pub const REFRESH_SETTING: &str = "app.refresh.seconds";

pub const DEFAULT_REFRESH_SECS: u64 = 10;
pub const MIN_REFRESH_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub http_timeout: Duration,
    pub auto_refresh: bool,
    pub warning_seconds: i64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let server_url = normalize_base_url(&env_required("QUEUEDESK_SERVER_URL")?);

        let username = std::env::var("QUEUEDESK_USERNAME").ok();
        let password = std::env::var("QUEUEDESK_PASSWORD").ok();

        let http_timeout: u64 = env_or("QUEUEDESK_HTTP_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid QUEUEDESK_HTTP_TIMEOUT_SECS: {e}"))?;

        let auto_refresh = match env_or("QUEUEDESK_AUTO_REFRESH", "true").as_str() {
            "false" | "0" | "off" => false,
            _ => true,
        };

        let warning_seconds: i64 = env_or("QUEUEDESK_WARNING_SECONDS", "60")
            .parse()
            .map_err(|e| format!("Invalid QUEUEDESK_WARNING_SECONDS: {e}"))?;

        let log_level = env_or("QUEUEDESK_LOG_LEVEL", "info");

        Ok(Config {
            server_url,
            username,
            password,
            http_timeout: Duration::from_secs(http_timeout),
            auto_refresh,
            warning_seconds,
            log_level,
        })
    }
}

/// Settings served by the collaborator, read once when a session is built.
///
/// Numeric values that are missing or unparsable fall back to safe defaults:
/// the inactivity timer is disabled and the refresh interval is the default.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub timeout_secs: i64,
    pub refresh_interval: Duration,
    raw: Map<String, Value>,
}

impl SessionSettings {
    pub fn from_remote(raw: Map<String, Value>) -> Self {
        let timeout_secs = raw.get(TIMEOUT_SETTING).and_then(parse_number).unwrap_or(0);

        let refresh_secs = raw
            .get(REFRESH_SETTING)
            .and_then(parse_number)
            .map(|secs| secs.max(0) as u64)
            .unwrap_or(DEFAULT_REFRESH_SECS);

        Self {
            timeout_secs,
            refresh_interval: clamp_refresh(Duration::from_secs(refresh_secs)),
            raw,
        }
    }

    /// Defaults used when the collaborator could not be asked.
    pub fn fallback() -> Self {
        Self::from_remote(Map::new())
    }

    /// Raw value of any other setting, rendered as text.
    pub fn setting(&self, name: &str) -> Option<String> {
        match self.raw.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Never poll faster than the configured minimum.
pub fn clamp_refresh(interval: Duration) -> Duration {
    interval.max(Duration::from_secs(MIN_REFRESH_SECS))
}

fn parse_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
