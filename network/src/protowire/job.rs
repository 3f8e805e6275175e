use std::fmt;

use consensus_core::algorithm::name_for_version;
use consensus_core::{unix_now, Block, Hash, Header, Target, Transaction};

use super::advertisement::{AdvertisedFields, Advertisement};
use super::container::Container;
use super::fields::{
    decode_bitses, decode_hash, decode_i32, decode_transaction, encode_bitses, encode_hash, encode_i32, encode_transaction,
    Bitses,
};
use super::MessageKind;
use crate::errors::ContainerError;

pub const HEIGHT_FIELD: usize = 4;
pub const PREV_HASH_FIELD: usize = 5;
pub const BITSES_FIELD: usize = 6;
/// Transactions fill every field from here on, coinbase first.
pub const FIRST_TX_FIELD: usize = 7;

/// Mineable work as the controller builds it and the miners load it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Job {
    pub advertisement: Advertisement,
    pub height: i32,
    pub prev_block_hash: Hash,
    pub bitses: Bitses,
    pub transactions: Vec<Transaction>,
}

impl Job {
    pub fn to_container(&self) -> Result<JobContainer, ContainerError> {
        let mut fields = self.advertisement.fields()?;
        fields.push(encode_i32(self.height));
        fields.push(encode_hash(&self.prev_block_hash));
        fields.push(encode_bitses(&self.bitses).map_err(|reason| ContainerError::MalformedField { index: BITSES_FIELD, reason })?);
        for (i, tx) in self.transactions.iter().enumerate() {
            let index = FIRST_TX_FIELD + i;
            fields.push(encode_transaction(tx).map_err(|reason| ContainerError::MalformedField { index, reason })?);
        }
        Ok(JobContainer(Container::create(fields, MessageKind::Job.magic())?))
    }

    /// Algorithm versions with a target, ascending.
    pub fn algorithms(&self) -> Vec<i32> {
        self.bitses.keys().copied().collect()
    }

    /// Unsolved block for `version`, or `None` when the job carries no target for it.
    pub fn block_for_algorithm(&self, version: i32) -> Option<Block> {
        let bits = *self.bitses.get(&version)?;
        let mut block = Block::new(
            Header::new(version, self.prev_block_hash, Hash::zeroed(), unix_now(), bits),
            self.transactions.clone(),
        );
        block.update_merkle_root();
        Some(block)
    }
}

/// Received Job, decoded field by field on demand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobContainer(Container);

impl JobContainer {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ContainerError> {
        Container::from_bytes(data, MessageKind::Job.magic()).map(Self)
    }

    pub fn try_height(&self) -> Result<i32, ContainerError> {
        self.0.decode_field(HEIGHT_FIELD, decode_i32)
    }

    pub fn try_prev_block_hash(&self) -> Result<Hash, ContainerError> {
        self.0.decode_field(PREV_HASH_FIELD, decode_hash)
    }

    pub fn try_bitses(&self) -> Result<Bitses, ContainerError> {
        self.0.decode_field(BITSES_FIELD, decode_bitses)
    }

    pub fn try_transactions(&self) -> Result<Vec<Transaction>, ContainerError> {
        (FIRST_TX_FIELD..self.0.count()).map(|i| self.0.decode_field(i, decode_transaction)).collect()
    }

    pub fn height(&self) -> i32 {
        self.try_height().unwrap_or_default()
    }

    pub fn prev_block_hash(&self) -> Hash {
        self.try_prev_block_hash().unwrap_or_default()
    }

    pub fn bitses(&self) -> Bitses {
        self.try_bitses().unwrap_or_default()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.try_transactions().unwrap_or_default()
    }

    pub fn tx_count(&self) -> usize {
        self.0.count().saturating_sub(FIRST_TX_FIELD)
    }

    /// Checks the field count and that every field decodes.
    pub fn validate(&self) -> Result<(), ContainerError> {
        self.to_job().map(|_| ())
    }

    pub fn to_job(&self) -> Result<Job, ContainerError> {
        if self.0.count() <= FIRST_TX_FIELD {
            return Err(ContainerError::MissingField(FIRST_TX_FIELD));
        }
        Ok(Job {
            advertisement: self.try_advertisement()?,
            height: self.try_height()?,
            prev_block_hash: self.try_prev_block_hash()?,
            bitses: self.try_bitses()?,
            transactions: self.try_transactions()?,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}

impl AdvertisedFields for JobContainer {
    fn container(&self) -> &Container {
        &self.0
    }
}

impl fmt::Display for JobContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type '{}' elements: {}", MessageKind::Job, self.0.count())?;
        let ips: Vec<String> = self.ips().iter().map(ToString::to_string).collect();
        writeln!(f, "ips: {}", ips.join(" "))?;
        writeln!(f, "p2p port: {}", self.p2p_port())?;
        writeln!(f, "rpc port: {}", self.rpc_port())?;
        writeln!(f, "submit port: {}", self.submit_port())?;
        writeln!(f, "height: {}", self.height())?;
        writeln!(f, "previous block hash: {}", self.prev_block_hash())?;
        writeln!(f, "difficulty targets:")?;
        for (version, bits) in self.bitses() {
            let mut target = [0u8; 32];
            Target::from_bits(bits).as_u256().to_big_endian(&mut target);
            writeln!(f, "  version {:3} {:<10} {}", version, name_for_version(version), hex::encode(target))?;
        }
        write!(f, "transactions: {}", self.tx_count())
    }
}
