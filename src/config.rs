use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DfsError, DfsResult};

/// Default bridge base URI, overridden once at construction by `STORJ_BRIDGE`.
const DEFAULT_BRIDGE_URI: &str = "https://api.storj.io";

/// Bound on concurrent shard workers within a single upload/download (§5).
const DEFAULT_CONCURRENCY: usize = 6;
const DEFAULT_TRANSFER_RETRIES: usize = 3;
const DEFAULT_CONTRACT_RETRIES: usize = 24;

/// Configuration for the storage engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bridge: BridgeConfig,
    pub upload: UploadConfig,
    pub blacklist_folder: PathBuf,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub base_uri: String,
    pub auth: BridgeAuth,
}

/// The bridge accepts exactly one authentication mode per request signer (§4.1/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeAuth {
    KeyPair { secret: String, public: String },
    Basic { email: String, password: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum number of shard workers in flight at once (C in §5).
    pub concurrency: usize,
    /// Retry budget for an individual shard transfer (§4.7), exponential backoff.
    pub transfer_retries: usize,
    /// Retry budget for contract acquisition per shard (§4.6 step 6), no backoff.
    pub contract_retries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub structured: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            transfer_retries: DEFAULT_TRANSFER_RETRIES,
            contract_retries: DEFAULT_CONTRACT_RETRIES,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: true,
            log_file: None,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_uri: DEFAULT_BRIDGE_URI.to_string(),
            auth: BridgeAuth::Basic {
                email: String::new(),
                password: String::new(),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            upload: UploadConfig::default(),
            blacklist_folder: std::env::temp_dir().join("bridgefs-blacklist"),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults. The `STORJ_BRIDGE`
    /// environment variable, when set, overrides `bridge.base_uri` exactly once at
    /// construction time; it is never consulted again afterward.
    pub fn load_or_default(config_path: Option<PathBuf>) -> DfsResult<Self> {
        let mut config = if let Some(path) = config_path {
            if path.exists() {
                let config_str = std::fs::read_to_string(&path)?;
                let config: Config = toml::from_str(&config_str)
                    .map_err(|e| DfsError::Config(format!("config parse error: {}", e)))?;
                tracing::info!("loaded configuration from {:?}", path);
                config
            } else {
                tracing::info!("config path {:?} does not exist, using defaults", path);
                Config::default()
            }
        } else {
            tracing::info!("using default configuration");
            Config::default()
        };

        if let Ok(bridge_uri) = std::env::var("STORJ_BRIDGE") {
            tracing::info!("overriding bridge base_uri from STORJ_BRIDGE");
            config.bridge.base_uri = bridge_uri;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate construction-time invariants: the bridge must be configured with
    /// exactly one authentication mode.
    pub fn validate(&self) -> DfsResult<()> {
        match &self.bridge.auth {
            BridgeAuth::KeyPair { secret, public } => {
                if secret.is_empty() || public.is_empty() {
                    return Err(DfsError::Config(
                        "keypair auth requires both secret and public keys".into(),
                    ));
                }
            }
            BridgeAuth::Basic { email, password } => {
                if email.is_empty() || password.is_empty() {
                    return Err(DfsError::Config(
                        "basic auth requires both email and password".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, config_path: &PathBuf) -> DfsResult<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| DfsError::Config(format!("config serialize error: {}", e)))?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(config_path, config_str)?;
        tracing::info!("configuration saved to {:?}", config_path);
        Ok(())
    }

    /// Upper bound on the time a single HTTP request to the bridge may take.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_validation_with_empty_basic_auth() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn keypair_auth_validates_when_both_fields_present() {
        let mut config = Config::default();
        config.bridge.auth = BridgeAuth::KeyPair {
            secret: "deadbeef".into(),
            public: "cafebabe".into(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn basic_auth_rejects_missing_password() {
        let mut config = Config::default();
        config.bridge.auth = BridgeAuth::Basic {
            email: "user@example.com".into(),
            password: String::new(),
        };
        assert!(config.validate().is_err());
    }
}
