//! Chain collaborators the controller consumes as black boxes

use std::time::SystemTime;

use async_trait::async_trait;
use consensus_core::{Algorithm, Block, Hash};
use network::protowire::Bitses;
use thiserror::Error;

/// Tip of the best chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestSnapshot {
    pub hash: Hash,
    pub height: i32,
}

/// Candidate block plus the target of every algorithm at its height.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub block: Block,
    pub height: i32,
    pub bitses: Bitses,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessBlockError {
    #[error("block rejected: {0}")]
    RuleViolation(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TemplateError(pub String);

/// Events published by the chain.
#[derive(Debug, Clone)]
pub enum ChainNotification {
    BlockAccepted(Hash),
    BlockConnected(Hash),
    BlockDisconnected(Hash),
}

#[async_trait]
pub trait ChainState: Send + Sync {
    async fn best_snapshot(&self) -> BestSnapshot;

    /// Validates and connects `block`. `Ok(true)` means it was kept as an orphan.
    async fn process_block(&self, block: Block) -> Result<bool, ProcessBlockError>;

    /// Timestamp of the main chain block at `height`, when known.
    async fn block_time(&self, _height: i32) -> Option<u32> {
        None
    }
}

#[async_trait]
pub trait TemplateGenerator: Send + Sync {
    async fn new_block_template(&self, payout: &str, algorithm: Algorithm) -> Result<BlockTemplate, TemplateError>;

    /// When the transaction source last changed.
    fn last_updated(&self) -> SystemTime;
}
