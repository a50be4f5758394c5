//! Fixed-size bit masks as stored per node.

use crate::cursor::ByteCursor;
use crate::error::DecodeResult;

/// Bit set of `size` bits, stored as little-endian 64-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMask {
    words: Vec<u64>,
    size: usize,
}

impl NodeMask {
    /// All-off mask. `size` must be a multiple of 64.
    #[must_use]
    pub fn new(size: usize) -> Self {
        debug_assert_eq!(size % 64, 0);
        Self {
            words: vec![0; size / 64],
            size,
        }
    }

    pub fn read(cursor: &mut ByteCursor<'_>, size: usize) -> DecodeResult<Self> {
        let words = (0..size / 64)
            .map(|_| cursor.read_u64())
            .collect::<DecodeResult<_>>()?;
        Ok(Self { words, size })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// On-disk size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.size / 8
    }

    #[must_use]
    pub fn is_on(&self, n: usize) -> bool {
        self.words[n >> 6] & (1 << (n & 63)) != 0
    }

    pub fn set(&mut self, n: usize, on: bool) {
        let bit = 1 << (n & 63);
        if on {
            self.words[n >> 6] |= bit;
        } else {
            self.words[n >> 6] &= !bit;
        }
    }

    #[must_use]
    pub fn count_on(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn count_off(&self) -> usize {
        self.size - self.count_on()
    }

    /// Indices of set bits, ascending.
    pub fn iter_on(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * 64 + bit)
            })
        })
    }

    /// Bits as values: `1.0` where set, `0.0` elsewhere.
    #[must_use]
    pub fn to_values(&self) -> Vec<f64> {
        (0..self.size)
            .map(|n| if self.is_on(n) { 1.0 } else { 0.0 })
            .collect()
    }

    /// Raw words, for writing fixtures.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn reads_words_little_endian() {
        let mut bytes = vec![0u8; 64];
        bytes[0] = 0b101;
        bytes[8] = 0x80;
        let mut cursor = ByteCursor::new(&bytes);
        let mask = NodeMask::read(&mut cursor, 512).unwrap();
        assert!(mask.is_on(0));
        assert!(!mask.is_on(1));
        assert!(mask.is_on(2));
        assert!(mask.is_on(71));
        assert_eq!(mask.count_on(), 3);
        assert_eq!(mask.count_off(), 509);
        assert_eq!(mask.iter_on().collect::<Vec<_>>(), [0, 2, 71]);
        assert_eq!(cursor.remaining(), 0);
    }

    proptest! {
        #[test]
        fn iter_on_matches_set_bits(bits in proptest::collection::btree_set(0usize..4096, 0..64)) {
            let mut mask = NodeMask::new(4096);
            for &b in &bits {
                mask.set(b, true);
            }
            prop_assert_eq!(mask.count_on(), bits.len());
            prop_assert_eq!(mask.iter_on().collect::<Vec<_>>(), bits.into_iter().collect::<Vec<_>>());
        }
    }
}
