use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use network::config::{load_or_default, ConfigError, TransportConfig};

/// Settings of one mining process. The passphrase is not part of it; it
/// arrives over IPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Rounds spent on each algorithm before rotating
    pub rounds_per_algo: u32,
    /// Hash attempts per round
    pub nonce_window: u32,
    /// A job older than this without a replacement is abandoned
    pub job_timeout_secs: u64,
    pub hashrate_log_secs: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self { rounds_per_algo: 1, nonce_window: 1, job_timeout_secs: 6 * 60, hashrate_log_secs: 10 }
    }
}

impl MinerConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn hashrate_log_interval(&self) -> Duration {
        Duration::from_secs(self.hashrate_log_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub transport: TransportConfig,
    pub miner: MinerConfig,
    /// Number of mining processes to spawn
    pub workers: usize,
    /// Path of the `castnet-miner` executable; defaults to the one next to the supervisor
    pub miner_path: Option<PathBuf>,
    /// Silence after which the active controller is dropped
    pub staleness_secs: u64,
    pub watchdog_interval_secs: u64,
    /// How long a child gets to acknowledge Stop before it is killed
    pub stop_grace_ms: u64,
    /// How long a child gets to acknowledge any other request
    pub ack_timeout_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            miner: MinerConfig::default(),
            workers: num_cpus::get(),
            miner_path: None,
            staleness_secs: 3,
            watchdog_interval_secs: 1,
            stop_grace_ms: 2_000,
            ack_timeout_ms: 5_000,
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from file if it exists, otherwise use defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_or_default(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transport.validate()?;
        if self.workers == 0 {
            return Err(ConfigError::Invalid("at least one worker is required".into()));
        }
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid("ack_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs.max(1))
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.staleness(), Duration::from_secs(3));
        assert_eq!(config.miner.job_timeout(), Duration::from_secs(360));
        assert_eq!(config.ack_timeout(), Duration::from_secs(5));
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_load_nested_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 2\n[transport]\npassphrase = \"p9pass\"\n[miner]\nrounds_per_algo = 4").unwrap();
        let config = SupervisorConfig::load(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.transport.passphrase, "p9pass");
        assert_eq!(config.miner.rounds_per_algo, 4);
        assert_eq!(config.miner.nonce_window, 1);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SupervisorConfig {
            workers: 0,
            transport: TransportConfig { passphrase: "x".into(), ..Default::default() },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
