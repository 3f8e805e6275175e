use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use consensus_core::Algorithm;
use network::config::{load_or_default, ConfigError, TransportConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub transport: TransportConfig,
    /// Coinbase payout addresses; one is drawn at random per template
    pub payout_addresses: Vec<String>,
    /// Addresses advertised to the workers; empty means discover a routable one
    pub listener_ips: Vec<IpAddr>,
    pub p2p_port: u16,
    pub rpc_port: u16,
    /// Port solutions are received on
    pub submit_port: u16,
    /// Algorithm the template generator is asked for
    pub template_algorithm: Algorithm,
    pub rebroadcast_interval_ms: u64,
    /// Minimum age of a job before a mempool change replaces it
    pub mempool_grace_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            payout_addresses: Vec::new(),
            listener_ips: Vec::new(),
            p2p_port: 11047,
            rpc_port: 11048,
            submit_port: 11050,
            template_algorithm: Algorithm::Sha256d,
            rebroadcast_interval_ms: 1_000,
            mempool_grace_secs: 60,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from file if it exists, otherwise use defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_or_default(path)
    }

    /// The controller refuses to start without somewhere to pay and a node
    /// the workers could reach.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transport.validate()?;
        if self.payout_addresses.is_empty() {
            return Err(ConfigError::Invalid("no payout addresses configured".into()));
        }
        if self.p2p_port == 0 {
            return Err(ConfigError::Invalid("p2p listener is required".into()));
        }
        if self.rpc_port == 0 {
            return Err(ConfigError::Invalid("rpc listener is required".into()));
        }
        Ok(())
    }

    pub fn submit_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.submit_port)
    }

    pub fn rebroadcast_interval(&self) -> Duration {
        Duration::from_millis(self.rebroadcast_interval_ms.max(1))
    }

    pub fn mempool_grace(&self) -> Duration {
        Duration::from_secs(self.mempool_grace_secs)
    }
}
