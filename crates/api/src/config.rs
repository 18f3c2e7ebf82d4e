//! Application configuration loaded from environment variables.

use saga::booking_flow::DEFAULT_HOLD_TTL_MINUTES;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for one JSON object per line, anything else for text
/// - `HOLD_TTL_MINUTES`: slot hold lifetime (default: `15`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub json_logs: bool,
    pub hold_ttl_minutes: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            json_logs: lookup("LOG_FORMAT")
                .map(|f| f.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.json_logs),
            hold_ttl_minutes: lookup("HOLD_TTL_MINUTES")
                .and_then(|m| m.trim().parse().ok())
                .filter(|m: &i64| *m > 0)
                .unwrap_or(defaults.hold_ttl_minutes),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// How long a slot hold lives before the slot authority frees it.
    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.hold_ttl_minutes)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            json_logs: false,
            hold_ttl_minutes: DEFAULT_HOLD_TTL_MINUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
        assert_eq!(config.hold_ttl(), chrono::Duration::minutes(15));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("HOLD_TTL_MINUTES", "5"),
            ("LOG_FORMAT", "JSON"),
        ]));
        assert_eq!(config.port, 8081);
        assert!(config.json_logs);
        assert_eq!(config.hold_ttl_minutes, 5);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = Config::from_lookup(lookup(&[("PORT", "http"), ("HOLD_TTL_MINUTES", "-1")]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.hold_ttl_minutes, 15);
    }
}
