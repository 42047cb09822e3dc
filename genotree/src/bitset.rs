use std::fmt::{Display, Formatter};

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-width set of bits, packed into 64-bit words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Bitset {
    words: Box<[u64]>,
    len: usize,
}

impl Bitset {
    /// Creates a bitset of `len` bits, all of them cleared.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let word_num = (len + WORD_BITS - 1) / WORD_BITS;

        Self {
            words: vec![0; word_num].into_boxed_slice(),
            len,
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Panics
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn set(&mut self, index: usize) {
        assert!(index < self.len, "bit {} out of {}", index, self.len);
        self.words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        index < self.len && self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// Returns `true` if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    #[inline]
    #[must_use]
    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|word| word.count_ones()).sum()
    }

    /// Number of bits set in both `self` and `other`.
    ///
    /// Bitsets of different widths are compared over their common prefix.
    #[inline]
    #[must_use]
    pub fn population_count_and(&self, other: &Bitset) -> u32 {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones())
            .sum()
    }

    /// Iterates over the indices of set bits, in increasing order.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let mut rest = word;
                std::iter::from_fn(move || {
                    if rest == 0 {
                        return None;
                    }
                    let bit = rest.trailing_zeros() as usize;
                    rest &= rest - 1;
                    Some(word_index * WORD_BITS + bit)
                })
            })
    }
}

impl AsRef<Bitset> for Bitset {
    fn as_ref(&self) -> &Bitset {
        self
    }
}

impl Display for Bitset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for index in 0..self.len {
            write!(f, "{}", if self.get(index) { '1' } else { '0' })?;
        }
        Ok(())
    }
}
