//! Region keys: activation bit-vectors identifying polyhedral cells.
//!
//! One bit per ReLU unit across all layers, in a fixed global unit
//! ordering. Two points belong to the same cell iff their keys are equal.
//! Keys are hashable and totally ordered so that iteration over a set of
//! regions is deterministic.

use serde::{Deserialize, Serialize};

const BITS_PER_WORD: usize = 64;

/// Activation bit-vector for one cell, backed by u64 words.
///
/// Bit `i` is 1 iff the i-th ReLU unit is active (pre-activation strictly
/// positive) for points inside the cell. Unused high bits of the last word
/// are always zero, so derived equality and hashing are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    num_bits: usize,
    words: Vec<u64>,
}

impl RegionKey {
    /// All-inactive key with `num_bits` units.
    pub fn zeros(num_bits: usize) -> Self {
        let num_words = num_bits.div_ceil(BITS_PER_WORD);
        Self {
            num_bits,
            words: vec![0; num_words],
        }
    }

    /// Build a key from per-unit activation flags.
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let bits: Vec<bool> = bits.into_iter().collect();
        let mut key = Self::zeros(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            if b {
                key.set(i, true);
            }
        }
        key
    }

    /// Number of units.
    #[inline]
    pub fn len(&self) -> usize {
        self.num_bits
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / BITS_PER_WORD, index % BITS_PER_WORD)
    }

    /// Whether unit `index` is active.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.num_bits, "unit {index} out of range");
        let (w, b) = Self::word_and_bit(index);
        (self.words[w] >> b) & 1 == 1
    }

    /// Set unit `index` in place.
    #[inline]
    pub fn set(&mut self, index: usize, active: bool) {
        assert!(index < self.num_bits, "unit {index} out of range");
        let (w, b) = Self::word_and_bit(index);
        if active {
            self.words[w] |= 1 << b;
        } else {
            self.words[w] &= !(1 << b);
        }
    }

    /// The candidate neighbor key differing from `self` only at `index`.
    ///
    /// Pure bit arithmetic; implies nothing about geometric feasibility.
    #[must_use]
    pub fn flip(&self, index: usize) -> Self {
        assert!(index < self.num_bits, "unit {index} out of range");
        let mut out = self.clone();
        let (w, b) = Self::word_and_bit(index);
        out.words[w] ^= 1 << b;
        out
    }

    /// Number of active units.
    pub fn ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of differing bits between two keys of equal length.
    pub fn hamming(&self, other: &Self) -> usize {
        assert_eq!(self.num_bits, other.num_bits, "key length mismatch");
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum()
    }

    /// Indices at which two keys of equal length differ, ascending.
    pub fn diff_indices(&self, other: &Self) -> Vec<usize> {
        assert_eq!(self.num_bits, other.num_bits, "key length mismatch");
        let mut out = Vec::new();
        for (wi, (a, b)) in self.words.iter().zip(&other.words).enumerate() {
            let mut diff = a ^ b;
            while diff != 0 {
                let bit = diff.trailing_zeros() as usize;
                out.push(wi * BITS_PER_WORD + bit);
                diff &= diff - 1;
            }
        }
        out
    }

    /// Iterate activation flags in unit order.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.num_bits).map(move |i| self.get(i))
    }
}

impl std::fmt::Display for RegionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.num_bits {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn flip_is_involutive_and_local() {
        let key = RegionKey::from_bits([true, false, true, true, false]);
        let flipped = key.flip(1);
        assert!(flipped.get(1));
        assert_eq!(flipped.hamming(&key), 1);
        assert_eq!(flipped.flip(1), key);
        assert_eq!(key.diff_indices(&flipped), vec![1]);
    }

    #[test]
    fn keys_across_word_boundary() {
        let mut key = RegionKey::zeros(130);
        key.set(63, true);
        key.set(64, true);
        key.set(129, true);
        assert_eq!(key.ones(), 3);
        assert_eq!(key.diff_indices(&RegionKey::zeros(130)), vec![63, 64, 129]);
    }

    #[test]
    fn distinct_keys_hash_distinctly() {
        let mut seen = HashSet::new();
        let base = RegionKey::zeros(70);
        for i in 0..70 {
            assert!(seen.insert(base.flip(i)));
        }
        assert!(!seen.contains(&base));
    }

    #[test]
    fn display_matches_bits() {
        let key = RegionKey::from_bits([true, false, false, true]);
        assert_eq!(key.to_string(), "1001");
    }

    proptest! {
        #[test]
        fn hamming_agrees_with_diff_indices(
            bits_a in proptest::collection::vec(any::<bool>(), 1..200),
            flips in proptest::collection::vec(0usize..200, 0..8),
        ) {
            let a = RegionKey::from_bits(bits_a.iter().copied());
            let mut b = a.clone();
            for f in flips {
                let idx = f % a.len();
                b = b.flip(idx);
            }
            prop_assert_eq!(a.hamming(&b), a.diff_indices(&b).len());
            prop_assert_eq!(a.hamming(&b) == 0, a == b);
        }

        #[test]
        fn ordering_is_total_and_consistent(
            bits_a in proptest::collection::vec(any::<bool>(), 1..100),
            idx in 0usize..100,
        ) {
            let a = RegionKey::from_bits(bits_a.iter().copied());
            let b = a.flip(idx % a.len());
            prop_assert_ne!(a.cmp(&b), std::cmp::Ordering::Equal);
            prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
        }
    }
}
