//! Network crate - encrypted, erasure-coded multicast transport for work
//! distribution, the positional message containers carried over it, and the
//! framed IPC codec spoken between a supervisor and its mining processes.

pub mod config;
pub mod errors;
pub mod ipc;
pub mod protowire;
pub mod transport;

pub use config::TransportConfig;
pub use errors::{ContainerError, TransportError};
pub use protowire::{Message, MessageKind};
pub use transport::{Connection, DatagramSink, Inbound, ShardCodec};
