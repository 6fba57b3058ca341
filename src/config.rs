use serde::Deserialize;
use std::path::PathBuf;

/// Proxy server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to listen on
    pub bind: String,
    /// Base URL of the upstream key-value REST service
    pub kv_url: Option<String>,
    /// Bearer token for the upstream service
    pub kv_token: Option<String>,
    /// Timeout for each upstream request
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            kv_url: None,
            kv_token: None,
            request_timeout_secs: 10,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| env_var("CORALCLUB_CONFIG").map(PathBuf::from))
            .unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            config = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;
            tracing::info!("Config file: {}", path.display());
        }

        if let Some(bind) = env_var("CORALCLUB_BIND") {
            config.bind = bind;
        }
        // The hosted KV service's own variable names are honoured too.
        if let Some(url) = env_var("CORALCLUB_KV_URL").or_else(|| env_var("KV_REST_API_URL")) {
            config.kv_url = Some(url);
        }
        if let Some(token) =
            env_var("CORALCLUB_KV_TOKEN").or_else(|| env_var("KV_REST_API_TOKEN"))
        {
            config.kv_token = Some(token);
        }

        Ok(config)
    }

    /// Default config file path: ~/.config/coralclub/config.yaml
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coralclub")
            .join("config.yaml")
    }

    /// Upstream URL and token, both required to serve requests.
    pub fn upstream(&self) -> Result<(String, String), ConfigError> {
        let url = self
            .kv_url
            .clone()
            .ok_or(ConfigError::Missing("kv_url (CORALCLUB_KV_URL)"))?;
        let token = self
            .kv_token
            .clone()
            .ok_or(ConfigError::Missing("kv_token (CORALCLUB_KV_TOKEN)"))?;
        Ok((url, token))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    Missing(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    e
                )
            }
            ConfigError::Missing(what) => write!(f, "Missing required setting: {}", what),
        }
    }
}

impl std::error::Error for ConfigError {}
