use borsh::{BorshDeserialize, BorshSerialize};
use crypto_hashes::Hash;
use serde::{Deserialize, Serialize};

use crate::errors::{ConsensusError, ConsensusResult};
use crate::header::Header;
use crate::merkle::calc_merkle_root;
use crate::tx::Transaction;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    pub fn hash(&self) -> Hash {
        self.header.block_hash()
    }

    pub fn prev_hash(&self) -> Hash {
        self.header.prev_block
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    /// Merkle root of the current transaction list.
    pub fn calc_merkle_root(&self) -> Hash {
        calc_merkle_root(&self.transactions)
    }

    /// Recomputes the header's merkle root after the transaction list changed.
    pub fn update_merkle_root(&mut self) {
        self.header.merkle_root = self.calc_merkle_root();
    }

    pub fn to_bytes(&self) -> ConsensusResult<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ConsensusResult<Self> {
        let block: Block = borsh::from_slice(bytes).map_err(|e| ConsensusError::SerializationError(e.to_string()))?;
        if block.transactions.is_empty() {
            return Err(ConsensusError::EmptyTransactionList);
        }
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{OutPoint, TxIn, TxOut};

    fn block() -> Block {
        let coinbase = Transaction::new(
            1,
            vec![TxIn { previous_output: OutPoint::null(), signature_script: vec![0x01, 0x07], sequence: u32::MAX }],
            vec![TxOut { value: 50, script_pubkey: vec![0xaa] }],
            0,
        );
        let mut block = Block::new(Header::new(2, Hash::from_bytes([9; 32]), Hash::zeroed(), 1_700_000_000, 0x207fffff), vec![coinbase]);
        block.update_merkle_root();
        block
    }

    #[test]
    fn test_block_round_trip() {
        let b = block();
        let decoded = Block::from_bytes(&b.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, b);
        assert_eq!(decoded.hash(), b.hash());
        assert_eq!(decoded.prev_hash(), Hash::from_bytes([9; 32]));
    }

    #[test]
    fn test_rejects_garbage_and_empty() {
        assert!(Block::from_bytes(&[1, 2, 3]).is_err());
        let empty = Block::new(Header::default(), vec![]);
        assert!(matches!(Block::from_bytes(&empty.to_bytes().unwrap()), Err(ConsensusError::EmptyTransactionList)));
    }

    #[test]
    fn test_merkle_root_follows_coinbase() {
        let mut b = block();
        let root = b.header.merkle_root;
        assert!(b.coinbase().is_some());
        b.transactions[0].inputs[0].signature_script.push(0xff);
        b.update_merkle_root();
        assert_ne!(b.header.merkle_root, root);
    }
}
