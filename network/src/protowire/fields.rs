//! Encoders and decoders for individual container fields.
//!
//! Integers are fixed-width big-endian. Decoders are strict: they reject
//! short, long or inconsistent input and leave the zero-value fallback to
//! the typed container accessors.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use consensus_core::{Block, Hash, Transaction};

pub type FieldResult<T> = Result<T, String>;

/// Compact target per algorithm version, ordered by version.
pub type Bitses = BTreeMap<i32, u32>;

pub fn encode_u16(value: u16) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn decode_u16(bytes: &[u8]) -> FieldResult<u16> {
    let raw: [u8; 2] = bytes.try_into().map_err(|_| format!("expected 2 bytes, got {}", bytes.len()))?;
    Ok(u16::from_be_bytes(raw))
}

pub fn encode_i32(value: i32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn decode_i32(bytes: &[u8]) -> FieldResult<i32> {
    let raw: [u8; 4] = bytes.try_into().map_err(|_| format!("expected 4 bytes, got {}", bytes.len()))?;
    Ok(i32::from_be_bytes(raw))
}

pub fn encode_hash(hash: &Hash) -> Vec<u8> {
    hash.as_bytes().to_vec()
}

pub fn decode_hash(bytes: &[u8]) -> FieldResult<Hash> {
    Hash::try_from_slice(bytes).map_err(|_| format!("expected 32 bytes, got {}", bytes.len()))
}

/// `count:u8` then `(len:u8, address bytes)` per address.
pub fn encode_ips(ips: &[IpAddr]) -> FieldResult<Vec<u8>> {
    let count = u8::try_from(ips.len()).map_err(|_| format!("{} addresses do not fit one field", ips.len()))?;
    let mut out = vec![count];
    for ip in ips {
        match ip {
            IpAddr::V4(v4) => {
                out.push(4);
                out.extend_from_slice(&v4.octets());
            }
            IpAddr::V6(v6) => {
                out.push(16);
                out.extend_from_slice(&v6.octets());
            }
        }
    }
    Ok(out)
}

pub fn decode_ips(bytes: &[u8]) -> FieldResult<Vec<IpAddr>> {
    let (&count, mut rest) = bytes.split_first().ok_or("empty address list")?;
    let mut ips = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (&len, tail) = rest.split_first().ok_or("address list truncated")?;
        let len = len as usize;
        if tail.len() < len {
            return Err("address list truncated".into());
        }
        let (raw, tail) = tail.split_at(len);
        let ip = match len {
            4 => IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(raw).map_err(|e| e.to_string())?)),
            16 => IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(raw).map_err(|e| e.to_string())?)),
            other => return Err(format!("address length {other}")),
        };
        ips.push(ip);
        rest = tail;
    }
    if !rest.is_empty() {
        return Err("trailing bytes after address list".into());
    }
    Ok(ips)
}

/// `count:u8` then `(version:i32, bits:u32)` per algorithm.
pub fn encode_bitses(bitses: &Bitses) -> FieldResult<Vec<u8>> {
    let count = u8::try_from(bitses.len()).map_err(|_| format!("{} targets do not fit one field", bitses.len()))?;
    let mut out = Vec::with_capacity(1 + bitses.len() * 8);
    out.push(count);
    for (version, bits) in bitses {
        out.extend_from_slice(&version.to_be_bytes());
        out.extend_from_slice(&bits.to_be_bytes());
    }
    Ok(out)
}

pub fn decode_bitses(bytes: &[u8]) -> FieldResult<Bitses> {
    let (&count, rest) = bytes.split_first().ok_or("empty difficulty map")?;
    if rest.len() != count as usize * 8 {
        return Err(format!("difficulty map declares {} entries over {} bytes", count, rest.len()));
    }
    Ok(rest
        .chunks_exact(8)
        .map(|c| (i32::from_be_bytes([c[0], c[1], c[2], c[3]]), u32::from_be_bytes([c[4], c[5], c[6], c[7]])))
        .collect())
}

pub fn encode_transaction(tx: &Transaction) -> FieldResult<Vec<u8>> {
    tx.to_bytes().map_err(|e| e.to_string())
}

pub fn decode_transaction(bytes: &[u8]) -> FieldResult<Transaction> {
    Transaction::from_bytes(bytes).map_err(|e| e.to_string())
}

pub fn encode_block(block: &Block) -> FieldResult<Vec<u8>> {
    block.to_bytes().map_err(|e| e.to_string())
}

pub fn decode_block(bytes: &[u8]) -> FieldResult<Block> {
    Block::from_bytes(bytes).map_err(|e| e.to_string())
}
