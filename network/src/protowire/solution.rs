use consensus_core::Block;

use super::container::Container;
use super::fields::{decode_block, encode_block};
use super::MessageKind;
use crate::errors::ContainerError;

pub const BLOCK_FIELD: usize = 0;

/// A solved block on its way back to the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolutionContainer(Container);

impl SolutionContainer {
    pub fn new(block: &Block) -> Result<Self, ContainerError> {
        let encoded = encode_block(block).map_err(|reason| ContainerError::MalformedField { index: BLOCK_FIELD, reason })?;
        Container::create([encoded], MessageKind::Solution.magic()).map(Self)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ContainerError> {
        Container::from_bytes(data, MessageKind::Solution.magic()).map(Self)
    }

    pub fn try_block(&self) -> Result<Block, ContainerError> {
        self.0.decode_field(BLOCK_FIELD, decode_block)
    }

    pub fn block(&self) -> Block {
        self.try_block().unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0.into_bytes()
    }
}
