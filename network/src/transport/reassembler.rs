use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

use super::shard::{GroupNonce, Shard};

/// How long partial sets and decoded nonces are remembered without new traffic.
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct Pending {
    shards: Vec<Shard>,
    first_seen: Instant,
}

#[derive(Debug)]
struct Decoded {
    payload: Vec<u8>,
    last_seen: Instant,
    round: HashSet<u16>,
}

/// A shard set that reached its reconstruction threshold.
#[derive(Debug)]
pub struct ReadySet {
    pub shards: Vec<Shard>,
    pub first_seen: Instant,
}

#[derive(Debug)]
pub enum Assembly {
    Incomplete,
    Ready(ReadySet),
    /// A full threshold of an already decoded set arrived again; carries the
    /// payload decoded the first time.
    Repeated(Vec<u8>),
}

/// Collects shards per group nonce until enough arrived to attempt reconstruction.
///
/// Owned by a single listener task, so it needs no locking.
#[derive(Debug)]
pub struct Reassembler {
    pending: HashMap<GroupNonce, Pending>,
    decoded: HashMap<GroupNonce, Decoded>,
    expiry: Duration,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY)
    }
}

impl Reassembler {
    pub fn new(expiry: Duration) -> Self {
        Self { pending: HashMap::new(), decoded: HashMap::new(), expiry }
    }

    /// Adds a shard. Once a set reaches the threshold carried in its headers
    /// it is handed out and no longer pending. Shards of decoded sets are
    /// never reconstructed again; each resent round of them is reported once.
    pub fn insert(&mut self, shard: Shard, now: Instant) -> Assembly {
        self.prune(now);
        let nonce = shard.nonce;
        let threshold = shard.header.data_shards as usize;

        if let Some(decoded) = self.decoded.get_mut(&nonce) {
            decoded.last_seen = now;
            // an index seen twice starts the next round
            if !decoded.round.insert(shard.header.index) {
                decoded.round.clear();
                decoded.round.insert(shard.header.index);
            }
            if decoded.round.len() == threshold {
                return Assembly::Repeated(decoded.payload.clone());
            }
            return Assembly::Incomplete;
        }

        let entry = self.pending.entry(nonce).or_insert_with(|| Pending { shards: Vec::new(), first_seen: now });
        if entry.shards.iter().any(|s| s.header.index == shard.header.index) {
            return Assembly::Incomplete;
        }
        entry.shards.push(shard);

        if entry.shards.len() >= threshold {
            if let Some(p) = self.pending.remove(&nonce) {
                return Assembly::Ready(ReadySet { shards: p.shards, first_seen: p.first_seen });
            }
        }
        Assembly::Incomplete
    }

    /// Records a successful decode. Partial sets that started no later than
    /// this one are dropped as superseded.
    pub fn mark_decoded(&mut self, set: &ReadySet, payload: Vec<u8>, now: Instant) {
        let Some(first) = set.shards.first() else { return };
        let round = set.shards.iter().map(|s| s.header.index).collect();
        self.decoded.insert(first.nonce, Decoded { payload, last_seen: now, round });
        self.pending.retain(|_, p| p.first_seen > set.first_seen);
    }

    /// Puts back a set that reached the threshold but failed to reconstruct,
    /// so further shards can still complete it.
    pub fn restore(&mut self, set: ReadySet) {
        if let Some(nonce) = set.shards.first().map(|s| s.nonce) {
            self.pending.insert(nonce, Pending { shards: set.shards, first_seen: set.first_seen });
        }
    }

    /// Forgets a set that failed authentication.
    pub fn reject(&mut self, nonce: GroupNonce) {
        self.pending.remove(&nonce);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn prune(&mut self, now: Instant) {
        let expiry = self.expiry;
        self.pending.retain(|_, p| now.duration_since(p.first_seen) < expiry);
        self.decoded.retain(|_, d| now.duration_since(d.last_seen) < expiry);
    }
}
