//! Compact difficulty targets.

use crypto_hashes::Hash;
use primitive_types::U256;

/// Target represents the difficulty threshold for valid blocks
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Target(U256);

impl Target {
    pub fn new(value: U256) -> Self {
        Target(value)
    }

    /// Expands compact bits: `[1 byte exponent][3 bytes mantissa]`.
    ///
    /// The sign bit of the mantissa is ignored and exponents past 32 bytes
    /// saturate to the maximum target instead of overflowing the shift.
    pub fn from_bits(bits: u32) -> Self {
        let size = (bits >> 24) as usize;
        let word = bits & 0x007f_ffff;

        let value = if size <= 3 {
            U256::from(word >> (8 * (3 - size)))
        } else if size > 32 {
            U256::MAX
        } else {
            let shifted = U256::from(word).checked_mul(U256::one() << (8 * (size - 3)));
            shifted.unwrap_or(U256::MAX)
        };

        Target(value)
    }

    /// Compresses the target back into compact bits.
    pub fn to_bits(&self) -> u32 {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);

        let size = bytes.iter().position(|&b| b != 0).map(|i| 32 - i).unwrap_or(0);
        if size == 0 {
            return 0;
        }

        let offset = 32 - size;
        let mut word = u32::from_be_bytes([
            0,
            bytes[offset],
            *bytes.get(offset + 1).unwrap_or(&0),
            *bytes.get(offset + 2).unwrap_or(&0),
        ]);
        if size < 3 {
            word >>= 8 * (3 - size);
        }
        let mut size = size as u32;
        // keep the mantissa positive
        if word & 0x0080_0000 != 0 {
            word >>= 8;
            size += 1;
        }
        (size << 24) | word
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    /// A hash meets the target when, read as a big-endian integer, it is not above it.
    pub fn is_met_by(&self, hash: &Hash) -> bool {
        U256::from_big_endian(hash.as_bytes()) <= self.0
    }
}

impl From<U256> for Target {
    fn from(value: U256) -> Self {
        Target(value)
    }
}

impl From<Target> for U256 {
    fn from(target: Target) -> Self {
        target.0
    }
}
