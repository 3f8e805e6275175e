use borsh::{BorshDeserialize, BorshSerialize};
use crypto_hashes::{double_sha256, Hash};
use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::constants::HEADER_SIZE;
use crate::pow::Target;

/// Block header. The version doubles as the proof-of-work algorithm selector.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub version: i32,
    pub prev_block: Hash,
    pub merkle_root: Hash,
    /// Seconds since the unix epoch
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl Header {
    pub fn new(version: i32, prev_block: Hash, merkle_root: Hash, timestamp: u32, bits: u32) -> Self {
        Self { version, prev_block, merkle_root, timestamp, bits, nonce: 0 }
    }

    /// Fixed 80-byte little-endian layout hashed for both the block id and proof of work.
    pub fn serialize_pow(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Block identifier: double SHA-256 of the serialized header.
    pub fn block_hash(&self) -> Hash {
        Hash::from(double_sha256(&self.serialize_pow()))
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        Algorithm::from_version(self.version)
    }

    /// Proof-of-work hash under the algorithm selected by the version.
    pub fn pow_hash(&self) -> Option<Hash> {
        self.algorithm().map(|algo| algo.hash(&self.serialize_pow()))
    }

    pub fn target(&self) -> Target {
        Target::from_bits(self.bits)
    }

    /// True when the header's proof-of-work hash is at or below its own target.
    pub fn meets_target(&self) -> bool {
        self.pow_hash().map(|hash| self.target().is_met_by(&hash)).unwrap_or(false)
    }
}
