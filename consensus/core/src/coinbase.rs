//! Coinbase script construction and extra-nonce rolling.
//!
//! The coinbase signature script is `push(height) push(extra_nonce) push(flags)`.
//! Miners change the extra nonce to get a fresh merkle root, and with it a
//! fresh nonce space, for the same template.

use crate::block::Block;
use crate::constants::{COINBASE_FLAGS, MAX_COINBASE_SCRIPT_LEN, MIN_COINBASE_SCRIPT_LEN};
use crate::errors::{ConsensusError, ConsensusResult};

const OP_0: u8 = 0x00;
const OP_PUSHDATA1: u8 = 0x4c;
const MAX_DIRECT_PUSH: usize = 75;

/// Minimal little-endian script-number encoding of a non-negative value.
fn script_num(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    while value > 0 {
        out.push((value & 0xff) as u8);
        value >>= 8;
    }
    // a set high bit would read back as negative
    if out.last().is_some_and(|b| b & 0x80 != 0) {
        out.push(0);
    }
    out
}

fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        0 => script.push(OP_0),
        n if n <= MAX_DIRECT_PUSH => script.push(n as u8),
        n => {
            script.push(OP_PUSHDATA1);
            script.push(n as u8);
        }
    }
    script.extend_from_slice(data);
}

/// Builds the signature script for a coinbase at `height` carrying `extra_nonce`.
pub fn standard_coinbase_script(height: i32, extra_nonce: u64) -> ConsensusResult<Vec<u8>> {
    let mut script = Vec::with_capacity(32);
    push_data(&mut script, &script_num(height.max(0) as u64));
    push_data(&mut script, &script_num(extra_nonce));
    push_data(&mut script, COINBASE_FLAGS);

    if !(MIN_COINBASE_SCRIPT_LEN..=MAX_COINBASE_SCRIPT_LEN).contains(&script.len()) {
        return Err(ConsensusError::CoinbaseScriptLength {
            len: script.len(),
            min: MIN_COINBASE_SCRIPT_LEN,
            max: MAX_COINBASE_SCRIPT_LEN,
        });
    }
    Ok(script)
}

/// Rewrites the coinbase script of `block` with a new extra nonce and
/// recomputes the merkle root.
pub fn update_extra_nonce(block: &mut Block, height: i32, extra_nonce: u64) -> ConsensusResult<()> {
    let script = standard_coinbase_script(height, extra_nonce)?;
    let input = block
        .transactions
        .first_mut()
        .filter(|tx| tx.is_coinbase())
        .and_then(|tx| tx.inputs.first_mut())
        .ok_or(ConsensusError::InvalidCoinbaseTransaction)?;
    input.signature_script = script;
    block.update_merkle_root();
    Ok(())
}
