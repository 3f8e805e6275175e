use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Default multicast group shared by controllers and workers.
pub const DEFAULT_MULTICAST_ADDR: &str = "224.0.0.1:11049";
pub const DEFAULT_DATA_SHARDS: u8 = 3;
pub const DEFAULT_PARITY_SHARDS: u8 = 6;
/// Largest datagram the codec will emit.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 65_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Reads a TOML config from `path`, falling back to defaults when the file does not exist.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Settings shared by every shard transport endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Shared secret the AEAD key is derived from
    pub passphrase: String,
    pub multicast_addr: SocketAddr,
    pub data_shards: u8,
    pub parity_shards: u8,
    pub max_datagram_size: usize,
}

impl TransportConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_or_default(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.passphrase.is_empty() {
            return Err(ConfigError::Invalid("passphrase must not be empty".into()));
        }
        if self.data_shards == 0 || self.parity_shards == 0 {
            return Err(ConfigError::Invalid("data and parity shard counts must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            passphrase: String::new(),
            multicast_addr: SocketAddr::from(([224, 0, 0, 1], 11049)),
            data_shards: DEFAULT_DATA_SHARDS,
            parity_shards: DEFAULT_PARITY_SHARDS,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
        }
    }
}
