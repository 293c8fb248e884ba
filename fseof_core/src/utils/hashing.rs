//! Utility functions for getting hashes

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a hash of a string, identical across runs and platforms
pub(crate) fn stable_hash(s: &str) -> u64 {
    s.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

pub(crate) fn hash_as_hex_string(s: &str) -> String {
    format!("{:x}", stable_hash(s))
}
