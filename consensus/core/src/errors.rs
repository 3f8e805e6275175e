use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Invalid coinbase transaction")]
    InvalidCoinbaseTransaction,

    #[error("Empty transaction list")]
    EmptyTransactionList,

    #[error("Coinbase script length {len} outside [{min}, {max}]")]
    CoinbaseScriptLength { len: usize, min: usize, max: usize },

    #[error("Unknown block version {0}")]
    UnknownAlgorithm(i32),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
