/// Serialized size of a block header.
pub const HEADER_SIZE: usize = 80;

/// Smallest signature script a coinbase input may carry.
pub const MIN_COINBASE_SCRIPT_LEN: usize = 2;

/// Largest signature script a coinbase input may carry.
pub const MAX_COINBASE_SCRIPT_LEN: usize = 100;

/// Tag appended to every coinbase script built by this node.
pub const COINBASE_FLAGS: &[u8] = b"/castnet/";

/// Output index used by the null outpoint of a coinbase input.
pub const COINBASE_OUTPOINT_INDEX: u32 = u32::MAX;

/// Sequence number stamped on coinbase inputs.
pub const MAX_TX_IN_SEQUENCE_NUM: u32 = u32::MAX;
