//! Shard wire format and the codec that produces and opens shard sets.
//!
//! Every datagram is `[nonce:12][magic:4][index:u16 | data:u8 | parity:u8 | ciphertext_len:u32][fragment]`,
//! integers big-endian. The payload is sealed once and the ciphertext is
//! erasure coded, so any `data` shards of one nonce are enough to open it.

use rand::RngCore;

use super::cipher::{ShardCipher, NONCE_SIZE, TAG_SIZE};
use super::fec;
use super::Magic;
use crate::config::TransportConfig;
use crate::errors::TransportError;

pub type GroupNonce = [u8; NONCE_SIZE];

pub const MAGIC_SIZE: usize = 4;
pub const SHARD_HEADER_SIZE: usize = 8;
/// Bytes in front of every fragment.
pub const SHARD_OVERHEAD: usize = NONCE_SIZE + MAGIC_SIZE + SHARD_HEADER_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardHeader {
    pub index: u16,
    pub data_shards: u8,
    pub parity_shards: u8,
    pub ciphertext_len: u32,
}

impl ShardHeader {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.index.to_be_bytes());
        out.push(self.data_shards);
        out.push(self.parity_shards);
        out.extend_from_slice(&self.ciphertext_len.to_be_bytes());
    }

    fn read(bytes: &[u8]) -> Self {
        Self {
            index: u16::from_be_bytes([bytes[0], bytes[1]]),
            data_shards: bytes[2],
            parity_shards: bytes[3],
            ciphertext_len: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    fn same_set(&self, other: &ShardHeader) -> bool {
        self.data_shards == other.data_shards
            && self.parity_shards == other.parity_shards
            && self.ciphertext_len == other.ciphertext_len
    }
}

/// One received datagram, split into its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shard {
    pub nonce: GroupNonce,
    pub magic: Magic,
    pub header: ShardHeader,
    pub fragment: Vec<u8>,
}

impl Shard {
    pub fn parse(datagram: &[u8]) -> Result<Self, TransportError> {
        if datagram.len() <= SHARD_OVERHEAD {
            return Err(TransportError::MalformedShard("datagram shorter than shard header"));
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&datagram[..NONCE_SIZE]);
        let magic = peek_magic(datagram).ok_or(TransportError::MalformedShard("missing magic"))?;
        let header = ShardHeader::read(&datagram[NONCE_SIZE + MAGIC_SIZE..SHARD_OVERHEAD]);

        if header.data_shards == 0 || header.parity_shards == 0 {
            return Err(TransportError::MalformedShard("zero shard count"));
        }
        if header.index as usize >= header.data_shards as usize + header.parity_shards as usize {
            return Err(TransportError::MalformedShard("shard index out of range"));
        }
        let fragment_len = datagram.len() - SHARD_OVERHEAD;
        if header.ciphertext_len as usize > header.data_shards as usize * fragment_len {
            return Err(TransportError::MalformedShard("ciphertext length exceeds the data fragments"));
        }
        Ok(Self { nonce, magic, header, fragment: datagram[SHARD_OVERHEAD..].to_vec() })
    }
}

/// Reads the type marker without touching the rest of the datagram.
pub fn peek_magic(datagram: &[u8]) -> Option<Magic> {
    datagram.get(NONCE_SIZE..NONCE_SIZE + MAGIC_SIZE)?.try_into().ok()
}

/// Seals payloads into shard sets and opens reassembled sets.
#[derive(Clone, Debug)]
pub struct ShardCodec {
    cipher: ShardCipher,
    data_shards: u8,
    parity_shards: u8,
    max_datagram_size: usize,
}

impl ShardCodec {
    pub fn new(passphrase: &str, data_shards: u8, parity_shards: u8, max_datagram_size: usize) -> Result<Self, TransportError> {
        if data_shards == 0 || parity_shards == 0 {
            return Err(TransportError::Encoding("data and parity shard counts must be non-zero".into()));
        }
        if max_datagram_size <= SHARD_OVERHEAD + 2 {
            return Err(TransportError::Encoding(format!("max datagram size {max_datagram_size} too small")));
        }
        Ok(Self { cipher: ShardCipher::from_passphrase(passphrase)?, data_shards, parity_shards, max_datagram_size })
    }

    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        Self::new(&config.passphrase, config.data_shards, config.parity_shards, config.max_datagram_size)
    }

    pub fn data_shards(&self) -> u8 {
        self.data_shards
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards as usize + self.parity_shards as usize
    }

    /// Largest payload whose shards still fit in one datagram each.
    pub fn max_payload(&self) -> usize {
        let fragment = (self.max_datagram_size - SHARD_OVERHEAD) & !1;
        (fragment * self.data_shards as usize).saturating_sub(TAG_SIZE).min(u32::MAX as usize - TAG_SIZE)
    }

    /// Seals `payload` under a fresh group nonce and returns one datagram per shard.
    pub fn create_shards(&self, payload: &[u8], magic: Magic) -> Result<Vec<Vec<u8>>, TransportError> {
        if payload.len() > self.max_payload() {
            return Err(TransportError::Encoding(format!(
                "payload of {} bytes exceeds the {} byte ceiling",
                payload.len(),
                self.max_payload()
            )));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self.cipher.seal(&nonce, payload)?;
        let fragments = fec::encode(&ciphertext, self.data_shards as usize, self.parity_shards as usize)?;

        let shards = fragments
            .into_iter()
            .enumerate()
            .map(|(index, fragment)| {
                let header = ShardHeader {
                    index: index as u16,
                    data_shards: self.data_shards,
                    parity_shards: self.parity_shards,
                    ciphertext_len: ciphertext.len() as u32,
                };
                let mut datagram = Vec::with_capacity(SHARD_OVERHEAD + fragment.len());
                datagram.extend_from_slice(&nonce);
                datagram.extend_from_slice(&magic);
                header.write(&mut datagram);
                datagram.extend_from_slice(&fragment);
                datagram
            })
            .collect();
        Ok(shards)
    }

    /// Reconstructs and authenticates the payload carried by `shards`, which
    /// must share one nonce and one set of FEC parameters.
    pub fn open(&self, shards: &[Shard]) -> Result<Vec<u8>, TransportError> {
        let first = shards.first().ok_or(TransportError::Reconstruction("no shards".into()))?;
        if shards.iter().any(|s| s.nonce != first.nonce || !s.header.same_set(&first.header)) {
            return Err(TransportError::MalformedShard("mixed shard sets"));
        }

        let header = first.header;
        if header.ciphertext_len as usize > self.max_payload() + TAG_SIZE {
            return Err(TransportError::MalformedShard("ciphertext length above the payload ceiling"));
        }
        let fragments: Vec<(usize, &[u8])> = shards.iter().map(|s| (s.header.index as usize, s.fragment.as_slice())).collect();
        let ciphertext = fec::reconstruct(
            &fragments,
            header.data_shards as usize,
            header.parity_shards as usize,
            header.ciphertext_len as usize,
        )?;
        self.cipher.open(&first.nonce, &ciphertext)
    }
}
