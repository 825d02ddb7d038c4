//! Branch-free population count over 64-bit words.
//!
//! Used to score similarity between slice presence bitmaps without touching
//! the accumulator planes.

const M1: u64 = 0x5555_5555_5555_5555; // 0101...
const M2: u64 = 0x3333_3333_3333_3333; // 00110011...
const M4: u64 = 0x0f0f_0f0f_0f0f_0f0f; // 4 zeros, 4 ones...
const H01: u64 = 0x0101_0101_0101_0101; // sum of 256^0, 256^1, ...

/// Count set bits in `word`.
///
/// Twelve arithmetic operations, one multiply. Result is always in `[0, 64]`.
#[inline]
pub fn popcount(word: u64) -> u32 {
    let mut x = word;
    x = x.wrapping_sub((x >> 1) & M1); // count of each 2 bits
    x = (x & M2) + ((x >> 2) & M2); // count of each 4 bits
    x = (x + (x >> 4)) & M4; // count of each 8 bits
    (x.wrapping_mul(H01) >> 56) as u32
}

/// Number of differing bits between two equal-length bit arrays.
///
/// Words beyond the shorter slice are ignored.
pub fn hamming_distance(a: &[u64], b: &[u64]) -> u32 {
    a.iter().zip(b).map(|(&wa, &wb)| popcount(wa ^ wb)).sum()
}
