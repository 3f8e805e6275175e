//! Proof-of-work hash functions.
//!
//! Every function maps an arbitrary serialized header to a 32-byte digest. Which
//! function a header is mined with is decided by its version field; the table
//! lives in `consensus_core::algorithm`.

use crate::{double_sha256, Hash};
use sha3::Digest;
use tiny_keccak::{Hasher as _, Keccak};

/// SHA256(SHA256(data))
pub fn sha256d(data: &[u8]) -> Hash {
    Hash::from(double_sha256(data))
}

/// BLAKE2b with a 32-byte output
pub fn blake2b_256(data: &[u8]) -> Hash {
    let digest = blake2b_simd::Params::new().hash_length(32).hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_bytes());
    Hash::from(out)
}

/// BLAKE3 default 32-byte output
pub fn blake3_256(data: &[u8]) -> Hash {
    Hash::from(*blake3::hash(data).as_bytes())
}

/// Original (pre-NIST) Keccak-256
pub fn keccak_256(data: &[u8]) -> Hash {
    let mut keccak = Keccak::v256();
    let mut out = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut out);
    Hash::from(out)
}

/// NIST SHA3-256
pub fn sha3_256(data: &[u8]) -> Hash {
    let digest = sha3::Sha3_256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash::from(out)
}
