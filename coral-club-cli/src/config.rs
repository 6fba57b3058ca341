use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use coral_club_core::merge::{StateKeys, DEFAULT_REV_KEY, DEFAULT_STATE_KEY};
use coral_club_core::models::{
    DEFAULT_TENT_COUNT, HOLD_MINUTES, MAX_HOLD_MINUTES, MAX_TENT_COUNT,
};
use coral_club_core::sync::ReplicaConfig;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    fn default(value: T) -> Self {
        Self::new(value, ConfigSource::Default)
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Base URL of coralclub-server
    pub server_url: ConfigValue<String>,
    /// Key holding the shared state document
    pub state_key: ConfigValue<String>,
    /// Key holding the revision counter
    pub rev_key: ConfigValue<String>,
    /// How often `watch` polls the revision counter
    pub poll_interval_ms: ConfigValue<u64>,
    /// How often `watch` sweeps expired holds
    pub sweep_interval_secs: ConfigValue<u64>,
    /// How long a reservation hold lasts
    pub hold_minutes: ConfigValue<i64>,
    /// Tent count used when seeding an empty store
    pub seed_count: ConfigValue<u32>,
    /// Admin PIN, so admin commands need no --pin
    #[serde(skip_serializing)]
    pub admin_pin: Option<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    server_url: Option<String>,
    state_key: Option<String>,
    rev_key: Option<String>,
    poll_interval_ms: Option<u64>,
    sweep_interval_secs: Option<u64>,
    hold_minutes: Option<i64>,
    seed_count: Option<u32>,
    admin_pin: Option<String>,
}

fn from_file<T>(target: &mut ConfigValue<T>, value: Option<T>) {
    if let Some(v) = value {
        *target = ConfigValue::new(v, ConfigSource::File);
    }
}

fn from_env<T: std::str::FromStr>(
    target: &mut ConfigValue<T>,
    name: &'static str,
) -> Result<(), ConfigError> {
    if let Ok(raw) = std::env::var(name) {
        let value = raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name, raw.clone()))?;
        *target = ConfigValue::new(value, ConfigSource::Environment);
    }
    Ok(())
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self {
            server_url: ConfigValue::default("http://localhost:8080".to_string()),
            state_key: ConfigValue::default(DEFAULT_STATE_KEY.to_string()),
            rev_key: ConfigValue::default(DEFAULT_REV_KEY.to_string()),
            poll_interval_ms: ConfigValue::default(1500),
            sweep_interval_secs: ConfigValue::default(10),
            hold_minutes: ConfigValue::default(HOLD_MINUTES),
            seed_count: ConfigValue::default(DEFAULT_TENT_COUNT),
            admin_pin: None,
            config_file: None,
        };

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config.config_file = Some(path.clone());
            from_file(&mut config.server_url, file.server_url);
            from_file(&mut config.state_key, file.state_key);
            from_file(&mut config.rev_key, file.rev_key);
            from_file(&mut config.poll_interval_ms, file.poll_interval_ms);
            from_file(&mut config.sweep_interval_secs, file.sweep_interval_secs);
            from_file(&mut config.hold_minutes, file.hold_minutes);
            from_file(&mut config.seed_count, file.seed_count);
            config.admin_pin = file.admin_pin;
        }

        // Apply environment variable overrides
        from_env(&mut config.server_url, "CORAL_SERVER_URL")?;
        from_env(&mut config.state_key, "CORAL_STATE_KEY")?;
        from_env(&mut config.rev_key, "CORAL_REV_KEY")?;
        from_env(&mut config.poll_interval_ms, "CORAL_POLL_INTERVAL_MS")?;
        from_env(&mut config.sweep_interval_secs, "CORAL_SWEEP_INTERVAL_SECS")?;
        from_env(&mut config.hold_minutes, "CORAL_HOLD_MINUTES")?;
        from_env(&mut config.seed_count, "CORAL_SEED_COUNT")?;
        if let Ok(pin) = std::env::var("CORAL_ADMIN_PIN") {
            config.admin_pin = Some(pin);
        }

        if !(1..=MAX_HOLD_MINUTES).contains(&config.hold_minutes.value) {
            return Err(ConfigError::InvalidValue(
                "hold_minutes",
                config.hold_minutes.value.to_string(),
            ));
        }
        if !(1..=MAX_TENT_COUNT).contains(&config.seed_count.value) {
            return Err(ConfigError::InvalidValue(
                "seed_count",
                config.seed_count.value.to_string(),
            ));
        }

        Ok(config)
    }

    pub fn state_keys(&self) -> StateKeys {
        StateKeys::new(self.state_key.value.clone(), self.rev_key.value.clone())
    }

    pub fn replica_config(&self) -> ReplicaConfig {
        ReplicaConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.value.max(100)),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.value.max(1)),
            seed_count: self.seed_count.value,
        }
    }

    pub fn hold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.hold_minutes.value)
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/coral/
    /// - macOS: ~/Library/Application Support/coral/
    /// - Windows: %APPDATA%/coral/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coral")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(name, value) => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.state_key.value, "coralclub:state");
        assert_eq!(config.state_key.source, ConfigSource::Default);
        assert_eq!(config.poll_interval_ms.value, 1500);
        assert_eq!(config.hold_minutes.value, 15);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "state_key: club2:state").unwrap();
        writeln!(file, "rev_key: club2:rev").unwrap();
        writeln!(file, "hold_minutes: 30").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.state_key.value, "club2:state");
        assert_eq!(config.state_key.source, ConfigSource::File);
        assert_eq!(config.hold_minutes.value, 30);
        assert_eq!(config.hold(), chrono::Duration::minutes(30));
        assert_eq!(config.config_file, Some(config_path));

        let keys = config.state_keys();
        assert_eq!(keys.state, "club2:state");
        assert_eq!(keys.rev, "club2:rev");
    }

    #[test]
    fn test_partial_file_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "poll_interval_ms: 500").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.poll_interval_ms.source, ConfigSource::File);
        assert_eq!(config.sweep_interval_secs.source, ConfigSource::Default);

        let replica = config.replica_config();
        assert_eq!(replica.poll_interval, Duration::from_millis(500));
        assert_eq!(replica.sweep_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_non_positive_hold_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "hold_minutes: 0").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(err.to_string().contains("hold_minutes"));
    }

    #[test]
    fn test_oversized_hold_and_seed_rejected() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        std::fs::write(&config_path, "hold_minutes: 9223372036854775807\n").unwrap();
        let err = Config::load(Some(config_path.clone())).unwrap_err();
        assert!(err.to_string().contains("hold_minutes"));

        std::fs::write(&config_path, "seed_count: 4000000000\n").unwrap();
        let err = Config::load(Some(config_path.clone())).unwrap_err();
        assert!(err.to_string().contains("seed_count"));

        std::fs::write(&config_path, "hold_minutes: 1440\nseed_count: 500\n").unwrap();
        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.hold(), chrono::Duration::days(1));
        assert_eq!(config.replica_config().seed_count, 500);
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "server_url: http://fromfile:8080").unwrap();

        std::env::set_var("CORAL_SERVER_URL", "http://fromenv:8080");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.server_url.value, "http://fromenv:8080");
        assert_eq!(config.server_url.source, ConfigSource::Environment);

        std::env::remove_var("CORAL_SERVER_URL");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
