use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Longest k-mer whose 2-bit code fits in a `u64` with room to spare.
pub const MAX_KMER_SIZE: usize = 31;
const BASE_NUM: usize = 4;
const ZERO_SNAP_EPSILON: f64 = 1e-15;

/// Error returned for a k-mer size outside of `1..=31`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InvalidKmerSize(pub usize);

impl Display for InvalidKmerSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid k-mer size {}: must be between 1 and {}",
            self.0, MAX_KMER_SIZE
        )
    }
}

impl Error for InvalidKmerSize {}

/// Window length of k-mer profiles.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct KmerSize(usize);

impl KmerSize {
    /// # Panics
    /// Panics if `k` is not in `1..=31`.
    #[must_use]
    pub const fn new(k: usize) -> Self {
        assert!(k > 0 && k <= MAX_KMER_SIZE);

        Self(k)
    }

    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    #[must_use]
    const fn mask(&self) -> u64 {
        (1 << (2 * self.0)) - 1
    }
}

impl TryFrom<usize> for KmerSize {
    type Error = InvalidKmerSize;

    fn try_from(k: usize) -> Result<Self, Self::Error> {
        if k == 0 || k > MAX_KMER_SIZE {
            Err(InvalidKmerSize(k))
        } else {
            Ok(Self(k))
        }
    }
}

impl Display for KmerSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[inline]
#[must_use]
fn base_code(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

#[inline]
#[must_use]
const fn complement_code(code: usize) -> usize {
    3 - code
}

/// Strand-folded k-mer counts of one sequence, with the probability of every
/// observed k-mer under the sequence's own base composition.
#[derive(Debug, Clone, PartialEq)]
pub struct KmerProfile {
    kmer_size: KmerSize,
    counts: HashMap<u64, u64>,
    probabilities: HashMap<u64, f64>,
    composition: [u64; BASE_NUM],
    total: u64,
}

impl KmerProfile {
    /// Counts every window of `bases` on both strands.
    ///
    /// Windows containing anything but `ACGT` (in either case) are skipped.
    /// With `normalize`, the probabilities are scaled to unit length.
    ///
    /// # Examples
    /// ```
    /// use genotree::kmer::{KmerProfile, KmerSize};
    ///
    /// let profile = KmerProfile::from_sequence(b"AACNAC", KmerSize::new(2), false);
    /// // AA, AC, AC and their reverse complements TT, GT, GT
    /// assert_eq!(profile.total(), 6);
    /// assert_eq!(profile.distinct(), 4);
    /// ```
    #[must_use]
    pub fn from_sequence(bases: &[u8], kmer_size: KmerSize, normalize: bool) -> Self {
        let k = kmer_size.get();
        let mask = kmer_size.mask();
        let reverse_shift = 2 * (k - 1);

        let mut counts: HashMap<u64, u64> = HashMap::new();
        let mut composition = [0; BASE_NUM];
        let mut window = [0; BASE_NUM];
        let mut forward = 0u64;
        let mut reverse = 0u64;
        let mut run_len = 0;

        for (i, &base) in bases.iter().enumerate() {
            let code = match base_code(base) {
                Some(code) => code,
                None => {
                    run_len = 0;
                    window = [0; BASE_NUM];
                    continue;
                }
            };

            forward = ((forward << 2) | code as u64) & mask;
            reverse = (reverse >> 2) | ((complement_code(code) as u64) << reverse_shift);
            window[code] += 1;
            run_len += 1;

            if run_len > k {
                if let Some(dropped) = base_code(bases[i - k]) {
                    window[dropped] -= 1;
                }
            }
            if run_len >= k {
                *counts.entry(forward).or_insert(0) += 1;
                *counts.entry(reverse).or_insert(0) += 1;
                for (code, &num) in window.iter().enumerate() {
                    composition[code] += num;
                    composition[complement_code(code)] += num;
                }
            }
        }

        let total = counts.values().sum();
        let probabilities = Self::probabilities(&counts, &composition, kmer_size, normalize);

        Self {
            kmer_size,
            counts,
            probabilities,
            composition,
            total,
        }
    }

    fn probabilities(
        counts: &HashMap<u64, u64>,
        composition: &[u64; BASE_NUM],
        kmer_size: KmerSize,
        normalize: bool,
    ) -> HashMap<u64, f64> {
        let composition_sum: u64 = composition.iter().sum();
        if composition_sum == 0 {
            return HashMap::new();
        }
        let frequencies = composition.map(|num| num as f64 / composition_sum as f64);

        let mut probabilities: HashMap<u64, f64> = counts
            .keys()
            .map(|&code| {
                let probability = (0..kmer_size.get())
                    .map(|position| frequencies[((code >> (2 * position)) & 0b11) as usize])
                    .product::<f64>();
                (code, probability)
            })
            .collect();

        if normalize {
            let length = probabilities
                .values()
                .map(|probability| probability * probability)
                .sum::<f64>()
                .sqrt();
            if length > 0.0 {
                probabilities
                    .values_mut()
                    .for_each(|probability| *probability /= length);
            }
        }

        probabilities
    }

    #[must_use]
    pub fn kmer_size(&self) -> KmerSize {
        self.kmer_size
    }

    #[must_use]
    pub fn count(&self, code: u64) -> u64 {
        self.counts.get(&code).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn probability(&self, code: u64) -> f64 {
        self.probabilities.get(&code).copied().unwrap_or(0.0)
    }

    /// Sum of all k-mer counts, both strands included.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct k-mer codes observed.
    #[must_use]
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// A/C/G/T tallies over both strands of every counted window.
    #[must_use]
    pub fn composition(&self) -> [u64; BASE_NUM] {
        self.composition
    }

    pub fn codes(&self) -> impl Iterator<Item = u64> + '_ {
        self.counts.keys().copied()
    }

    /// D2 dissimilarity of two profiles, in `[0, 1]`.
    ///
    /// # Panics
    /// Panics if the profiles were built with different k-mer sizes.
    #[must_use]
    pub fn d2_distance(&self, other: &KmerProfile) -> f64 {
        assert_eq!(
            self.kmer_size, other.kmer_size,
            "Comparing profiles of different k-mer sizes"
        );

        let total_x = self.total as f64;
        let total_y = other.total as f64;
        let mut cross = 0.0;
        let mut self_x = 0.0;
        let mut self_y = 0.0;

        let only_in_other = other
            .codes()
            .filter(|code| !self.counts.contains_key(code));
        for code in self.codes().chain(only_in_other) {
            let centered_x = self.count(code) as f64 - total_x * self.probability(code);
            let centered_y = other.count(code) as f64 - total_y * other.probability(code);

            let mut denominator = (centered_x * centered_x + centered_y * centered_y).sqrt();
            if denominator == 0.0 {
                denominator = 1.0;
            }

            cross += centered_x * centered_y / denominator;
            self_x += centered_x * centered_x / denominator;
            self_y += centered_y * centered_y / denominator;
        }

        let denominator = self_x.sqrt() * self_y.sqrt();
        if denominator == 0.0 {
            return 0.0;
        }

        let distance = 0.5 * (1.0 - cross / denominator);
        if distance.abs() < ZERO_SNAP_EPSILON || !distance.is_finite() {
            0.0
        } else {
            distance
        }
    }
}
