use borsh::{BorshDeserialize, BorshSerialize};
use crypto_hashes::{double_sha256, Hash};
use serde::{Deserialize, Serialize};

use crate::constants::COINBASE_OUTPOINT_INDEX;
use crate::errors::{ConsensusError, ConsensusResult};

/// Reference to an output of a previous transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }

    /// The outpoint spent by a coinbase input.
    pub fn null() -> Self {
        Self { txid: Hash::zeroed(), index: COINBASE_OUTPOINT_INDEX }
    }

    pub fn is_null(&self) -> bool {
        self.index == COINBASE_OUTPOINT_INDEX && self.txid == Hash::zeroed()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TxIn {
    pub previous_output: OutPoint,
    pub signature_script: Vec<u8>,
    pub sequence: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TxOut {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

/// Represents a transaction as it travels inside Jobs and Solutions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(version: i32, inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        Self { version, inputs, outputs, lock_time }
    }

    /// Chain wire encoding.
    pub fn to_bytes(&self) -> ConsensusResult<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ConsensusResult<Self> {
        borsh::from_slice(bytes).map_err(|e| ConsensusError::SerializationError(e.to_string()))
    }

    /// Transaction id: double SHA-256 of the wire encoding.
    pub fn id(&self) -> Hash {
        // Serializing an in-memory value into a Vec cannot fail.
        let bytes = borsh::to_vec(self).unwrap_or_default();
        Hash::from(double_sha256(&bytes))
    }

    /// A coinbase has exactly one input spending the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend() -> Transaction {
        Transaction::new(
            1,
            vec![TxIn { previous_output: OutPoint::new(Hash::from_bytes([3; 32]), 0), signature_script: vec![1, 2], sequence: 0 }],
            vec![TxOut { value: 5_000, script_pubkey: vec![0x76, 0xa9] }],
            0,
        )
    }

    #[test]
    fn test_wire_round_trip() {
        let tx = spend();
        let bytes = tx.to_bytes().unwrap();
        assert_eq!(Transaction::from_bytes(&bytes).unwrap(), tx);
        assert!(Transaction::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_id_tracks_contents() {
        let a = spend();
        let mut b = spend();
        b.outputs[0].value += 1;
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), spend().id());
    }

    #[test]
    fn test_is_coinbase() {
        assert!(!spend().is_coinbase());
        let mut cb = spend();
        cb.inputs[0].previous_output = OutPoint::null();
        assert!(cb.is_coinbase());
    }
}
