use crate::state::{DEFAULT_GRACE_PERIOD, DEFAULT_JUDGE_DEADLINE};
use std::time::Duration;

/// Server settings read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    /// Late-submission window after the draw timer
    pub grace_period: Duration,
    /// Hard limit on one judging call, including retries inside the provider
    pub judge_deadline: Duration,
    /// JSON array of prompts
    pub prompts_path: String,
    /// Frontend assets served at `/`
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            grace_period: DEFAULT_GRACE_PERIOD,
            judge_deadline: DEFAULT_JUDGE_DEADLINE,
            prompts_path: "prompts.json".to_string(),
            static_dir: "static".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            port: var("PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            grace_period: var("GRACE_PERIOD_MS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.grace_period),
            judge_deadline: var("JUDGE_DEADLINE")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.judge_deadline),
            prompts_path: var("PROMPTS_FILE").unwrap_or(defaults.prompts_path),
            static_dir: var("STATIC_DIR").unwrap_or(defaults.static_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 5] = [
        "PORT",
        "GRACE_PERIOD_MS",
        "JUDGE_DEADLINE",
        "PROMPTS_FILE",
        "STATIC_DIR",
    ];

    fn clear_env() {
        for key in VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        assert_eq!(ServerConfig::from_env(), ServerConfig::default());
    }

    #[test]
    #[serial]
    fn test_reads_env() {
        clear_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("GRACE_PERIOD_MS", "250");
        std::env::set_var("JUDGE_DEADLINE", "15");
        std::env::set_var("PROMPTS_FILE", " /srv/prompts.json ");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(config.grace_period, Duration::from_millis(250));
        assert_eq!(config.judge_deadline, Duration::from_secs(15));
        assert_eq!(config.prompts_path, "/srv/prompts.json");
        assert_eq!(config.static_dir, "static");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_or_garbage_falls_back() {
        clear_env();
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("STATIC_DIR", "   ");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 3001);
        assert_eq!(config.static_dir, "static");
        clear_env();
    }
}
