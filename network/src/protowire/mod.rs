//! Positional message containers and the table mapping type markers to decoders.
//!
//! Schemas are fixed per kind:
//! - Job (`work`): 0 ips, 1 p2p port, 2 rpc port, 3 submit port, 4 height,
//!   5 previous block hash, 6 difficulty map, 7.. transactions
//! - Pause (`paus`): fields 0-3 of a Job
//! - Solution (`solv`): 0 block
//!
//! A new field means a new kind, never a change to an existing schema.

pub mod advertisement;
pub mod container;
pub mod fields;
pub mod job;
pub mod pause;
pub mod solution;

use std::fmt;

pub use advertisement::{AdvertisedFields, Advertisement};
pub use container::Container;
pub use fields::Bitses;
pub use job::{Job, JobContainer};
pub use pause::PauseContainer;
pub use solution::SolutionContainer;

use crate::errors::ContainerError;
use crate::transport::Magic;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Job,
    Pause,
    Solution,
}

type Decoder = fn(Vec<u8>) -> Result<Message, ContainerError>;

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [MessageKind::Job, MessageKind::Pause, MessageKind::Solution];

    pub const fn magic(self) -> Magic {
        match self {
            MessageKind::Job => *b"work",
            MessageKind::Pause => *b"paus",
            MessageKind::Solution => *b"solv",
        }
    }

    pub fn from_magic(magic: &Magic) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.magic() == *magic)
    }

    fn decoder(self) -> Decoder {
        match self {
            MessageKind::Job => |data| JobContainer::from_bytes(data).map(Message::Job),
            MessageKind::Pause => |data| PauseContainer::from_bytes(data).map(Message::Pause),
            MessageKind::Solution => |data| SolutionContainer::from_bytes(data).map(Message::Solution),
        }
    }

    pub fn decode(self, data: Vec<u8>) -> Result<Message, ContainerError> {
        (self.decoder())(data)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.magic()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Job(JobContainer),
    Pause(PauseContainer),
    Solution(SolutionContainer),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Job(_) => MessageKind::Job,
            Message::Pause(_) => MessageKind::Pause,
            Message::Solution(_) => MessageKind::Solution,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Message::Job(c) => c.as_bytes(),
            Message::Pause(c) => c.as_bytes(),
            Message::Solution(c) => c.as_bytes(),
        }
    }
}
