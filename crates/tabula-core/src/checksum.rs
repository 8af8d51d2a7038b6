//! Deterministic state checksums
//!
//! Server and client compare checksums instead of whole states when
//! diagnosing a divergence. The digest is an FNV-1a pass over the bincode
//! encoding, finished with a splitmix64 avalanche, so both sides compute the
//! same value for equal states.

use crate::error::{Error, Result};
use serde::Serialize;

/// Seed used when callers don't supply one
pub const DEFAULT_CHECKSUM_SEED: u64 = 0xcbf2_9ce4_8422_2325;

const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash raw bytes with a seed
pub fn checksum_bytes(bytes: &[u8], seed: u64) -> u64 {
    let mut h = seed;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    mix(h ^ bytes.len() as u64)
}

/// Checksum any serializable value
///
/// # Example
///
/// ```
/// use tabula_core::checksum::{checksum, DEFAULT_CHECKSUM_SEED};
///
/// let a = checksum(&vec![1u32, 2, 3], DEFAULT_CHECKSUM_SEED).unwrap();
/// let b = checksum(&vec![1u32, 2, 3], DEFAULT_CHECKSUM_SEED).unwrap();
/// let c = checksum(&vec![3u32, 2, 1], DEFAULT_CHECKSUM_SEED).unwrap();
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
pub fn checksum<T: Serialize + ?Sized>(value: &T, seed: u64) -> Result<u64> {
    let bytes = bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(checksum_bytes(&bytes, seed))
}

fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_deterministic() {
        assert_eq!(checksum_bytes(b"hello", 1), checksum_bytes(b"hello", 1));
        assert_ne!(checksum_bytes(b"hello", 1), checksum_bytes(b"hello", 2));
        assert_ne!(checksum_bytes(b"hello", 1), checksum_bytes(b"hellp", 1));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(checksum_bytes(&[], 7), checksum_bytes(&[], 7));
        assert_ne!(checksum_bytes(&[], 7), checksum_bytes(&[0], 7));
    }
}
