use std::ops::AddAssign;

use crate::bitset::Bitset;

/// Pairwise popcount sums of one or more workers.
///
/// `dot` holds the upper triangle (diagonal included) of the sample-by-sample
/// matrix of shared allele bits. In the ignore-missing mode `pair_norm[i][j]`
/// holds the bits of sample `i` over the sites where sample `j` is called as
/// well; otherwise the plain per-sample `norm` is used for every pair.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PairwiseAccumulator {
    sample_num: usize,
    ignore_missing: bool,
    dot: Vec<u64>,
    pair_norm: Vec<u64>,
    norm: Vec<u64>,
    site_num: usize,
}

impl PairwiseAccumulator {
    #[must_use]
    pub fn new(sample_num: usize, ignore_missing: bool) -> Self {
        let pair_norm = if ignore_missing {
            vec![0; sample_num * sample_num]
        } else {
            Vec::new()
        };

        Self {
            sample_num,
            ignore_missing,
            dot: vec![0; sample_num * sample_num],
            pair_norm,
            norm: vec![0; sample_num],
            site_num: 0,
        }
    }

    #[must_use]
    pub fn sample_num(&self) -> usize {
        self.sample_num
    }

    #[must_use]
    pub fn ignore_missing(&self) -> bool {
        self.ignore_missing
    }

    /// Number of sites added.
    #[must_use]
    pub fn site_num(&self) -> usize {
        self.site_num
    }

    /// Adds one site: the encoded genotype of every sample.
    ///
    /// # Panics
    /// Panics if `site` does not have one entry per sample.
    pub fn add_site<B: AsRef<Bitset>>(&mut self, site: &[B]) {
        assert_eq!(site.len(), self.sample_num);
        let n = self.sample_num;

        let ones: Vec<u64> = site
            .iter()
            .map(|bits| u64::from(bits.as_ref().count_ones()))
            .collect();

        for i in 0..n {
            self.norm[i] += ones[i];
            if ones[i] == 0 {
                continue;
            }

            self.dot[i * n + i] += ones[i];
            if self.ignore_missing {
                self.pair_norm[i * n + i] += ones[i];
            }

            let bits_i = site[i].as_ref();
            for j in (i + 1)..n {
                if ones[j] == 0 {
                    continue;
                }

                self.dot[i * n + j] += u64::from(bits_i.population_count_and(site[j].as_ref()));
                if self.ignore_missing {
                    self.pair_norm[i * n + j] += ones[i];
                    self.pair_norm[j * n + i] += ones[j];
                }
            }
        }

        self.site_num += 1;
    }

    /// Shared bits of samples `i` and `j`, in any order.
    #[must_use]
    pub fn dot(&self, i: usize, j: usize) -> u64 {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        self.dot[i * self.sample_num + j]
    }

    /// Called bits of sample `i` over all sites.
    #[must_use]
    pub fn norm(&self, i: usize) -> u64 {
        self.norm[i]
    }

    /// Called bits of sample `i` as seen from the pair `(i, j)`.
    #[must_use]
    pub fn pair_norm(&self, i: usize, j: usize) -> u64 {
        if self.ignore_missing {
            self.pair_norm[i * self.sample_num + j]
        } else {
            self.norm[i]
        }
    }
}

impl AddAssign<&PairwiseAccumulator> for PairwiseAccumulator {
    fn add_assign(&mut self, rhs: &PairwiseAccumulator) {
        assert_eq!(self.sample_num, rhs.sample_num);
        assert_eq!(self.ignore_missing, rhs.ignore_missing);

        let sums = [
            (&mut self.dot, &rhs.dot),
            (&mut self.pair_norm, &rhs.pair_norm),
            (&mut self.norm, &rhs.norm),
        ];
        for (target, source) in sums {
            target
                .iter_mut()
                .zip(source.iter())
                .for_each(|(target, source)| *target += source);
        }
        self.site_num += rhs.site_num;
    }
}
