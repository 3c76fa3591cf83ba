//! Configuration for the dashboard cache layer.
//!
//! Values come from environment variables, optionally seeded from a `.env`
//! file. Every setting has a default, so an empty environment is valid.

use crate::error::{ConfigError, ConfigResult};
use std::env;
use std::time::Duration;

/// Configuration for the cache and deduplicator.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// TTL used by `CachedLoader` when a handler does not pass its own (default: 300s)
    pub cache_default_ttl: Duration,

    /// How long an in-flight request may be joined before it is considered stale (default: 30s)
    pub dedup_max_in_flight: Duration,

    /// Interval for the optional expiry sweeper (default: 60s)
    pub dedup_sweep_interval: Duration,

    /// Whether concurrent loads for the same key are collapsed (default: true)
    pub dedup_enabled: bool,

    /// Log level (default: "error")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `CACHE_DEFAULT_TTL_SECS`: default cache TTL in seconds (default: 300)
    /// - `DEDUP_MAX_IN_FLIGHT_MS`: in-flight limit in milliseconds (default: 30000)
    /// - `DEDUP_SWEEP_INTERVAL_SECS`: sweeper interval in seconds (default: 60)
    /// - `DEDUP_ENABLED`: `true`/`false` (also `1`/`0`, `yes`/`no`) (default: true)
    /// - `LOG_LEVEL`: Logging level (default: "error")
    pub fn from_env() -> ConfigResult<Self> {
        // A missing .env file is fine; a malformed one is not.
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(ConfigError::DotenvError(e.to_string()));
            }
        }

        let cache_default_ttl =
            Duration::from_secs(Self::parse_env_u64("CACHE_DEFAULT_TTL_SECS", 300)?);
        let dedup_max_in_flight =
            Duration::from_millis(Self::parse_env_u64("DEDUP_MAX_IN_FLIGHT_MS", 30_000)?);
        let dedup_sweep_interval =
            Duration::from_secs(Self::parse_env_u64("DEDUP_SWEEP_INTERVAL_SECS", 60)?);

        let dedup_enabled = Self::parse_env_bool("DEDUP_ENABLED", true)?;

        Self::require_non_zero("DEDUP_MAX_IN_FLIGHT_MS", dedup_max_in_flight)?;
        Self::require_non_zero("DEDUP_SWEEP_INTERVAL_SECS", dedup_sweep_interval)?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "error".to_string());

        Ok(Config {
            cache_default_ttl,
            dedup_max_in_flight,
            dedup_sweep_interval,
            dedup_enabled,
            log_level,
        })
    }

    /// Parse an environment variable as u64 with a default value.
    fn parse_env_u64(var_name: &str, default: u64) -> ConfigResult<u64> {
        match env::var(var_name) {
            Ok(val) => val.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as a boolean flag with a default value.
    fn parse_env_bool(var_name: &str, default: bool) -> ConfigResult<bool> {
        match env::var(var_name) {
            Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    var: var_name.to_string(),
                    reason: format!("Must be true or false, got: {}", val),
                }),
            },
            Err(_) => Ok(default),
        }
    }

    fn require_non_zero(var_name: &str, value: Duration) -> ConfigResult<()> {
        if value.is_zero() {
            return Err(ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: "Must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_default_ttl: Duration::from_secs(300),
            dedup_max_in_flight: Duration::from_secs(30),
            dedup_sweep_interval: Duration::from_secs(60),
            dedup_enabled: true,
            log_level: "error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 5] = [
        "CACHE_DEFAULT_TTL_SECS",
        "DEDUP_MAX_IN_FLIGHT_MS",
        "DEDUP_SWEEP_INTERVAL_SECS",
        "DEDUP_ENABLED",
        "LOG_LEVEL",
    ];

    // Helper to set and unset env vars for testing
    struct EnvGuard {
        vars: Vec<String>,
    }

    impl EnvGuard {
        fn new() -> Self {
            for var in VARS {
                env::remove_var(var);
            }
            EnvGuard { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            env::set_var(key, value);
            self.vars.push(key.to_string());
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for var in &self.vars {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache_default_ttl, Duration::from_secs(300));
        assert_eq!(config.dedup_max_in_flight, Duration::from_secs(30));
        assert_eq!(config.dedup_sweep_interval, Duration::from_secs(60));
        assert!(config.dedup_enabled);
        assert_eq!(config.log_level, "error");
    }

    #[test]
    #[serial]
    fn test_config_from_empty_env_uses_defaults() {
        let _guard = EnvGuard::new();

        let config = Config::from_env().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    #[serial]
    fn test_config_from_env_valid() {
        let mut guard = EnvGuard::new();
        guard.set("CACHE_DEFAULT_TTL_SECS", "60");
        guard.set("DEDUP_MAX_IN_FLIGHT_MS", "1500");
        guard.set("DEDUP_SWEEP_INTERVAL_SECS", "5");
        guard.set("DEDUP_ENABLED", "false");
        guard.set("LOG_LEVEL", "debug");

        let config = Config::from_env().unwrap();
        assert_eq!(config.cache_default_ttl, Duration::from_secs(60));
        assert_eq!(config.dedup_max_in_flight, Duration::from_millis(1500));
        assert_eq!(config.dedup_sweep_interval, Duration::from_secs(5));
        assert!(!config.dedup_enabled);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_in_flight_limit() {
        let mut guard = EnvGuard::new();
        guard.set("DEDUP_MAX_IN_FLIGHT_MS", "0");

        match Config::from_env() {
            Err(ConfigError::InvalidValue { var, .. }) => {
                assert_eq!(var, "DEDUP_MAX_IN_FLIGHT_MS");
            }
            other => panic!("Expected InvalidValue error, got: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_config_rejects_zero_sweep_interval() {
        let mut guard = EnvGuard::new();
        guard.set("DEDUP_SWEEP_INTERVAL_SECS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref var, .. }) if var == "DEDUP_SWEEP_INTERVAL_SECS"
        ));
    }

    #[test]
    #[serial]
    fn test_parse_env_u64() {
        let mut guard = EnvGuard::new();
        guard.set("TEST_U64", " 42 ");

        let result = Config::parse_env_u64("TEST_U64", 10);
        assert_eq!(result.unwrap(), 42);

        let result = Config::parse_env_u64("NONEXISTENT", 10);
        assert_eq!(result.unwrap(), 10);
    }

    #[test]
    #[serial]
    fn test_parse_env_u64_invalid() {
        let mut guard = EnvGuard::new();
        guard.set("CACHE_DEFAULT_TTL_SECS", "-5");

        let result = Config::from_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_parse_env_bool() {
        let mut guard = EnvGuard::new();
        guard.set("DEDUP_ENABLED", " No ");
        assert!(!Config::parse_env_bool("DEDUP_ENABLED", true).unwrap());

        guard.set("DEDUP_ENABLED", "1");
        assert!(Config::parse_env_bool("DEDUP_ENABLED", false).unwrap());

        assert!(Config::parse_env_bool("NONEXISTENT", true).unwrap());
    }

    #[test]
    #[serial]
    fn test_config_rejects_invalid_dedup_flag() {
        let mut guard = EnvGuard::new();
        guard.set("DEDUP_ENABLED", "maybe");

        match Config::from_env() {
            Err(ConfigError::InvalidValue { var, .. }) => assert_eq!(var, "DEDUP_ENABLED"),
            other => panic!("Expected InvalidValue error, got: {:?}", other),
        }
    }
}
