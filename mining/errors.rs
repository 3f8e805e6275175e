use thiserror::Error;

pub use network::ipc::IpcError;

#[derive(Error, Debug)]
pub enum MiningError {
    #[error("Invalid job: {0}")]
    InvalidJob(#[from] network::ContainerError),

    #[error("Consensus error: {0}")]
    Consensus(#[from] consensus_core::ConsensusError),

    #[error("Transport error: {0}")]
    Transport(#[from] network::TransportError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Config error: {0}")]
    Config(#[from] network::config::ConfigError),

    #[error("No passphrase received yet")]
    NoPassphrase,

    #[error("Search thread has stopped")]
    WorkerGone,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MiningResult<T> = Result<T, MiningError>;
