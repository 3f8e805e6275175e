//! Chain primitives shared by the controller and the mining processes.
//!
//! Only what work distribution needs lives here: the block header and its
//! 80-byte proof-of-work serialization, a compact transaction model, merkle
//! roots, compact targets and the table of rotating hash algorithms.

pub mod algorithm;
pub mod block;
pub mod coinbase;
pub mod constants;
pub mod errors;
pub mod header;
pub mod merkle;
pub mod pow;
pub mod tx;

pub use algorithm::Algorithm;
pub use block::Block;
pub use crypto_hashes::Hash;
pub use errors::ConsensusError;
pub use header::Header;
pub use pow::Target;
pub use tx::{OutPoint, Transaction, TxIn, TxOut};

/// Seconds since the unix epoch, truncated to the header's 32-bit field.
pub fn unix_now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}
