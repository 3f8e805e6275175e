use consensus_core::Hash;
use network::config::ConfigError;
use network::{ContainerError, TransportError};
use thiserror::Error;

use crate::chain::TemplateError;

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("No block template: {0}")]
    Template(#[from] TemplateError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] TransportError),

    #[error("Container error: {0}")]
    Container(#[from] ContainerError),

    #[error("Stale submission: block builds on {block_prev}, tip is {tip}")]
    StaleSubmission { block_prev: Hash, tip: Hash },

    #[error("Block rejected: {0}")]
    RuleViolation(String),

    #[error("Unexpected error processing block: {0}")]
    UnexpectedProcessing(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type ControllerResult<T> = Result<T, ControllerError>;
