use crypto_hashes::{double_sha256, Hash};

/// Represents a Merkle tree for transaction hashes
#[derive(Clone, Debug)]
pub struct MerkleTree {
    /// Nodes at each level of the tree (leaves at level 0)
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Creates a new Merkle tree from a list of transaction hashes
    pub fn from_hashes(hashes: Vec<Hash>) -> Self {
        if hashes.is_empty() {
            return Self { levels: vec![] };
        }

        let mut levels = vec![hashes];
        loop {
            let current = match levels.last() {
                Some(level) if level.len() > 1 => level,
                _ => break,
            };
            let next: Vec<Hash> = current
                .chunks(2)
                .map(|chunk| {
                    let left = chunk[0];
                    let right = chunk.get(1).copied().unwrap_or(left);
                    Self::hash_pair(&left, &right)
                })
                .collect();
            levels.push(next);
        }

        Self { levels }
    }

    /// Returns the Merkle root hash
    pub fn root(&self) -> Hash {
        self.levels.last().and_then(|level| level.first().copied()).unwrap_or_default()
    }

    /// Hashes two nodes together to create their parent
    fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        let mut combined = [0u8; 64];
        combined[..32].copy_from_slice(left.as_bytes());
        combined[32..].copy_from_slice(right.as_bytes());
        Hash::from(double_sha256(&combined))
    }
}

/// Merkle root over transaction ids, odd levels duplicating their last node.
pub fn calc_merkle_root<'a>(txs: impl IntoIterator<Item = &'a crate::tx::Transaction>) -> Hash {
    MerkleTree::from_hashes(txs.into_iter().map(|tx| tx.id()).collect()).root()
}
