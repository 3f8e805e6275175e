use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// Payload could not be turned into shards (size ceiling, FEC parameters).
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The reassembled ciphertext did not authenticate under the shared key.
    #[error("Authentication failed")]
    Authentication,

    #[error("Reconstruction failed: {0}")]
    Reconstruction(String),

    #[error("Malformed shard: {0}")]
    MalformedShard(&'static str),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ContainerError {
    #[error("Container shorter than its header")]
    Truncated,

    #[error("Unexpected magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("Field {0} overruns the container")]
    FieldOverrun(usize),

    #[error("Missing field {0}")]
    MissingField(usize),

    #[error("Field {index} is malformed: {reason}")]
    MalformedField { index: usize, reason: String },

    #[error("Container has {0} fields, more than a u16 can count")]
    TooManyFields(usize),
}
