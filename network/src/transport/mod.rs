//! Shard transport: AEAD-sealed, erasure-coded messages over UDP multicast.

pub mod cipher;
pub mod connection;
pub mod fec;
pub mod reassembler;
pub mod shard;

/// Four-byte type marker carried in clear by every shard.
pub type Magic = [u8; 4];

pub use connection::{Connection, DatagramSink, Inbound};
pub use reassembler::Reassembler;
pub use shard::{Shard, ShardCodec};
