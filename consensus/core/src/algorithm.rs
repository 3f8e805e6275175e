//! Rotating proof-of-work algorithms.
//!
//! The header version selects which hash function is applied to the
//! serialized header. Every Job carries a target per version and the miners
//! cycle through all of them.

use std::fmt;
use std::str::FromStr;

use crypto_hashes::{blake2b_256, blake3_256, keccak_256, sha256d, sha3_256, Hash};
use serde::{Deserialize, Serialize};

use crate::errors::ConsensusError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sha256d,
    Blake2b,
    Blake3,
    Keccak,
    Sha3,
}

impl Algorithm {
    /// All algorithms, in block version order.
    pub const ALL: [Algorithm; 5] = [Algorithm::Sha256d, Algorithm::Blake2b, Algorithm::Blake3, Algorithm::Keccak, Algorithm::Sha3];

    /// Header version that selects this algorithm.
    pub fn version(self) -> i32 {
        match self {
            Algorithm::Sha256d => 2,
            Algorithm::Blake2b => 3,
            Algorithm::Blake3 => 4,
            Algorithm::Keccak => 5,
            Algorithm::Sha3 => 6,
        }
    }

    pub fn from_version(version: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.version() == version)
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha256d => "sha256d",
            Algorithm::Blake2b => "blake2b",
            Algorithm::Blake3 => "blake3",
            Algorithm::Keccak => "keccak",
            Algorithm::Sha3 => "sha3",
        }
    }

    /// Applies the algorithm to serialized header bytes.
    pub fn hash(self, data: &[u8]) -> Hash {
        match self {
            Algorithm::Sha256d => sha256d(data),
            Algorithm::Blake2b => blake2b_256(data),
            Algorithm::Blake3 => blake3_256(data),
            Algorithm::Keccak => keccak_256(data),
            Algorithm::Sha3 => sha3_256(data),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ConsensusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(algo) = Self::ALL.into_iter().find(|a| a.name().eq_ignore_ascii_case(s)) {
            return Ok(algo);
        }
        s.parse::<i32>()
            .ok()
            .and_then(Self::from_version)
            .ok_or_else(|| ConsensusError::SerializationError(format!("unknown algorithm '{s}'")))
    }
}

/// Display name for a header version, `"unknown"` for versions outside the table.
pub fn name_for_version(version: i32) -> &'static str {
    Algorithm::from_version(version).map(Algorithm::name).unwrap_or("unknown")
}
