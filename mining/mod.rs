//! Mining side of castnet
//!
//! A supervisor follows one controller on the multicast group and drives a
//! pool of mining processes over their stdin/stdout. Each mining process
//! hashes the current job on a search thread and multicasts solutions back
//! to the controller's submit addresses.
//!
//! ## Module Organization
//!
//! - [`counter`]: algorithm rotation
//! - [`job`]: a Job prepared for hashing (extra nonce, nonce advance)
//! - [`worker`]: the search thread and its command queue
//! - [`service`]: IPC endpoint of a mining process
//! - [`client`]: supervisor side of the IPC link
//! - [`supervisor`]: controller selection, fan-out and the staleness watchdog

pub mod client;
pub mod config;
pub mod counter;
pub mod errors;
pub mod job;
pub mod service;
pub mod supervisor;
pub mod worker;

#[cfg(test)]
mod tests;

pub use client::{ChildMiner, MinerControl};
pub use config::{MinerConfig, SupervisorConfig};
pub use counter::AlgorithmCounter;
pub use errors::{IpcError, MiningError, MiningResult};
pub use job::MiningJob;
pub use service::MinerService;
pub use supervisor::{ActiveSender, Supervisor};
pub use worker::{Command, FoundBlock, MinerWorker, RunState, WorkerStats};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{ChildMiner, MinerControl};
    pub use crate::config::{MinerConfig, SupervisorConfig};
    pub use crate::errors::{MiningError, MiningResult};
    pub use crate::service::MinerService;
    pub use crate::supervisor::Supervisor;
}
