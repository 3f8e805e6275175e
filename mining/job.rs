//! The job a mining process is currently working on.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use consensus_core::coinbase::update_extra_nonce;
use consensus_core::{unix_now, Block, Header, Target};
use network::protowire::{Bitses, Job};

use crate::errors::MiningResult;

/// A Job prepared for hashing: one candidate block whose header version and
/// bits are switched per algorithm round.
#[derive(Clone, Debug)]
pub struct MiningJob {
    pub height: i32,
    pub bitses: Bitses,
    pub block: Block,
    pub extra_nonce: u64,
    /// Where solutions for this job go
    pub submit_addresses: Vec<SocketAddr>,
    /// Start of the abandon timeout
    pub(crate) received: Instant,
}

impl MiningJob {
    /// Stamps `extra_nonce` into the coinbase, recomputes the merkle root and
    /// starts the nonce search at `start_nonce`.
    pub fn new(job: Job, extra_nonce: u64, start_nonce: u32) -> MiningResult<Self> {
        let mut block = Block::new(Header::new(0, job.prev_block_hash, Default::default(), unix_now(), 0), job.transactions);
        update_extra_nonce(&mut block, job.height, extra_nonce)?;
        block.header.nonce = start_nonce;

        Ok(Self {
            height: job.height,
            bitses: job.bitses,
            block,
            extra_nonce,
            submit_addresses: job.advertisement.submit_addresses(),
            received: Instant::now(),
        })
    }

    /// Fresh random extra nonce and starting nonce.
    pub fn randomized(job: Job) -> MiningResult<Self> {
        Self::new(job, rand::random(), rand::random())
    }

    pub fn algorithms(&self) -> Vec<i32> {
        self.bitses.keys().copied().collect()
    }

    /// Switches the candidate header to `version`. Returns the target for it,
    /// or `None` when the job has no target for that version.
    pub fn select_algorithm(&mut self, version: i32) -> Option<Target> {
        let bits = *self.bitses.get(&version)?;
        self.block.header.version = version;
        self.block.header.bits = bits;
        Some(Target::from_bits(bits))
    }

    /// Moves to the next nonce. On wrap-around the timestamp is bumped so the
    /// header space stays fresh.
    pub fn advance_nonce(&mut self) {
        let header = &mut self.block.header;
        header.nonce = header.nonce.wrapping_add(1);
        if header.nonce == 0 {
            header.timestamp = header.timestamp.saturating_add(1).max(unix_now());
        }
    }

    pub fn age(&self) -> Duration {
        self.received.elapsed()
    }
}
