use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use itertools::Itertools;
use log::warn;

use crate::bitset::Bitset;

pub(crate) const GENOTYPE_FIELD: &str = "GT";
const UNPHASED_SEPARATOR: char = '/';
const PHASED_SEPARATOR: char = '|';

/// Ploidy and allele cardinality; together they fix the width of an encoded
/// genotype.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct GenotypeLayout {
    ploidy: usize,
    alleles: usize,
}

impl GenotypeLayout {
    /// # Panics
    /// Panics if `ploidy` or `alleles` is zero.
    #[must_use]
    pub const fn new(ploidy: usize, alleles: usize) -> Self {
        assert!(ploidy > 0);
        assert!(alleles > 0);

        Self { ploidy, alleles }
    }

    #[must_use]
    pub const fn ploidy(&self) -> usize {
        self.ploidy
    }

    #[must_use]
    pub const fn alleles(&self) -> usize {
        self.alleles
    }

    /// Number of bits of one encoded genotype.
    #[must_use]
    pub const fn bit_len(&self) -> usize {
        self.ploidy * self.alleles
    }
}

impl Display for GenotypeLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ploidy {}, {} alleles", self.ploidy, self.alleles)
    }
}

/// Which calls take part in the comparison.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum HeterozygosityFilter {
    /// Every call is used.
    #[default]
    All,
    /// Heterozygous calls are treated as missing.
    IgnoreHeterozygous,
    /// Homozygous calls are treated as missing.
    OnlyHeterozygous,
}

/// A parsed `GT` value such as `0/1`, `1|0` or `./.`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Genotype {
    alleles: Vec<Option<usize>>,
    phased: bool,
}

impl Genotype {
    /// Parses a genotype. Tokens that are not allele indices (e.g. `.`) are
    /// kept as missing alleles.
    ///
    /// # Examples
    /// ```
    /// use genotree::vcf::genotype::Genotype;
    ///
    /// let genotype = Genotype::parse("1/.");
    /// assert_eq!(genotype.ploidy(), 2);
    /// assert_eq!(genotype.called().collect::<Vec<_>>(), [1]);
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let phased = text.contains(PHASED_SEPARATOR);
        let alleles = text
            .split(|ch| ch == UNPHASED_SEPARATOR || ch == PHASED_SEPARATOR)
            .map(|token| token.trim().parse::<usize>().ok())
            .collect();

        Self { alleles, phased }
    }

    /// Number of allele slots, called or not.
    #[must_use]
    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    #[must_use]
    pub fn is_phased(&self) -> bool {
        self.phased
    }

    /// Whether the text of this genotype tells its ploidy: it has a separator
    /// or at least one called allele. A lone `.` does not.
    #[must_use]
    pub fn has_known_ploidy(&self) -> bool {
        self.alleles.len() > 1 || self.alleles.iter().any(Option::is_some)
    }

    /// Called allele indices, in slot order.
    pub fn called(&self) -> impl Iterator<Item = usize> + '_ {
        self.alleles.iter().flatten().copied()
    }

    /// Whether any called allele does not fit in `layout`.
    #[must_use]
    pub fn exceeds(&self, layout: GenotypeLayout) -> bool {
        self.called().any(|allele| allele >= layout.alleles())
    }

    #[must_use]
    pub fn is_heterozygous(&self) -> bool {
        self.called().unique().count() >= 2
    }

    #[must_use]
    pub fn is_homozygous(&self) -> bool {
        self.called().unique().count() == 1
    }

    /// One-hot encoding: bit `slot * alleles + allele` per called allele.
    ///
    /// Alleles outside the layout are skipped. Alleles of unphased genotypes
    /// are sorted into the leading slots, so `0/1` and `1/0` are equal.
    #[must_use]
    pub fn encode(&self, layout: GenotypeLayout) -> Bitset {
        let mut bits = Bitset::new(layout.bit_len());
        let valid = self.called().filter(|&allele| allele < layout.alleles());

        if self.phased {
            for (slot, allele) in self.alleles.iter().enumerate().take(layout.ploidy()) {
                if let Some(allele) = allele.filter(|&allele| allele < layout.alleles()) {
                    bits.set(slot * layout.alleles() + allele);
                }
            }
        } else {
            for (slot, allele) in valid.sorted().enumerate().take(layout.ploidy()) {
                bits.set(slot * layout.alleles() + allele);
            }
        }

        bits
    }

    /// Called alleles of an encoded genotype, in slot order.
    #[must_use]
    pub fn decode(bits: &Bitset, layout: GenotypeLayout) -> Vec<usize> {
        bits.ones().map(|index| index % layout.alleles()).collect()
    }
}

/// Shared memo of genotype text to its encoding.
///
/// Genotype strings repeat heavily across samples and records, so every
/// distinct text is encoded once per run. Filtered-out and missing calls
/// map to the all-zero bitset.
#[derive(Debug)]
pub struct GenotypeCache {
    layout: GenotypeLayout,
    filter: HeterozygosityFilter,
    entries: RwLock<HashMap<String, Arc<Bitset>>>,
    missing: Arc<Bitset>,
    exceeding_num: AtomicUsize,
}

impl GenotypeCache {
    #[must_use]
    pub fn new(layout: GenotypeLayout, filter: HeterozygosityFilter) -> Self {
        Self {
            layout,
            filter,
            entries: RwLock::new(HashMap::new()),
            missing: Arc::new(Bitset::new(layout.bit_len())),
            exceeding_num: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn layout(&self) -> GenotypeLayout {
        self.layout
    }

    /// The all-zero encoding.
    #[must_use]
    pub fn missing(&self) -> Arc<Bitset> {
        self.missing.clone()
    }

    /// Returns the encoding of `text`, computing it on first use.
    pub fn encode(&self, text: &str) -> Arc<Bitset> {
        {
            let entries = self
                .entries
                .read()
                .expect("Could not acquire genotype cache lock");
            if let Some(bits) = entries.get(text) {
                return bits.clone();
            }
        }

        let (bits, exceeds) = self.compute(text);
        let mut entries = self
            .entries
            .write()
            .expect("Could not acquire genotype cache lock");
        match entries.entry(text.to_owned()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                if exceeds {
                    self.note_exceeding(text);
                }
                entry.insert(bits).clone()
            }
        }
    }

    /// Number of distinct genotype texts whose alleles did not all fit in
    /// the layout. The extra alleles were dropped from their encodings.
    #[must_use]
    pub fn exceeding_num(&self) -> usize {
        self.exceeding_num.load(Ordering::Relaxed)
    }

    fn note_exceeding(&self, text: &str) {
        if self.exceeding_num.fetch_add(1, Ordering::Relaxed) == 0 {
            warn!(
                "Genotype `{}` has alleles beyond the {} of the layout; they are read as missing. \
                 Set the allele count explicitly to keep them",
                text,
                self.layout.alleles()
            );
        }
    }

    /// Number of distinct genotype texts seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .expect("Could not acquire genotype cache lock")
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn compute(&self, text: &str) -> (Arc<Bitset>, bool) {
        let genotype = Genotype::parse(text);
        let keep = match self.filter {
            HeterozygosityFilter::All => true,
            HeterozygosityFilter::IgnoreHeterozygous => !genotype.is_heterozygous(),
            HeterozygosityFilter::OnlyHeterozygous => genotype.is_heterozygous(),
        };

        if !keep {
            return (self.missing(), false);
        }

        let bits = genotype.encode(self.layout);
        let bits = if bits.is_zero() {
            self.missing()
        } else {
            Arc::new(bits)
        };
        (bits, genotype.exceeds(self.layout))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use itertools::Itertools;

    use crate::vcf::genotype::{Genotype, GenotypeCache, GenotypeLayout, HeterozygosityFilter};

    const DIPLOID_BIALLELIC: GenotypeLayout = GenotypeLayout::new(2, 2);

    #[test]
    fn test_parse() {
        let genotype = Genotype::parse("0|2");

        assert!(genotype.is_phased());
        assert_eq!(genotype.ploidy(), 2);
        assert_eq!(genotype.called().collect_vec(), [0, 2]);
        assert!(genotype.is_heterozygous());
        assert!(!genotype.is_homozygous());
    }

    #[test]
    fn test_parse_missing() {
        let genotype = Genotype::parse("./.");

        assert_eq!(genotype.ploidy(), 2);
        assert_eq!(genotype.called().count(), 0);
        assert!(!genotype.is_heterozygous());
        assert!(!genotype.is_homozygous());
        assert!(genotype.has_known_ploidy());
        assert!(!Genotype::parse(".").has_known_ploidy());
        assert!(Genotype::parse("1").has_known_ploidy());
    }

    #[test]
    fn test_encode_diploid() {
        assert_eq!(Genotype::parse("0/0").encode(DIPLOID_BIALLELIC).to_string(), "1010");
        assert_eq!(Genotype::parse("0/1").encode(DIPLOID_BIALLELIC).to_string(), "1001");
        assert_eq!(Genotype::parse("1/1").encode(DIPLOID_BIALLELIC).to_string(), "0101");
        assert_eq!(Genotype::parse("./.").encode(DIPLOID_BIALLELIC).to_string(), "0000");
    }

    #[test]
    fn test_encode_unphased_ignores_order() {
        assert_eq!(
            Genotype::parse("1/0").encode(DIPLOID_BIALLELIC),
            Genotype::parse("0/1").encode(DIPLOID_BIALLELIC)
        );
        assert_ne!(
            Genotype::parse("1|0").encode(DIPLOID_BIALLELIC),
            Genotype::parse("0|1").encode(DIPLOID_BIALLELIC)
        );
    }

    #[test]
    fn test_encode_skips_invalid_alleles() {
        let layout = GenotypeLayout::new(2, 2);

        assert_eq!(Genotype::parse("0/5").encode(layout).count_ones(), 1);
        assert_eq!(Genotype::parse("x/1").encode(layout).count_ones(), 1);
        assert_eq!(Genotype::parse("-1/1").encode(layout).count_ones(), 1);
        assert_eq!(Genotype::parse("0/1/1").encode(layout).count_ones(), 2);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let layout = GenotypeLayout::new(3, 4);
        for text in ["0/0/0", "0/1/2", "3/1/1", "2|0|3", "./1/.", "3/3/3"] {
            let genotype = Genotype::parse(text);
            let decoded = Genotype::decode(&genotype.encode(layout), layout);

            assert_eq!(
                decoded.into_iter().sorted().collect_vec(),
                genotype.called().sorted().collect_vec(),
                "genotype {}",
                text
            );
        }
    }

    #[test]
    fn test_cache_reuses_entries() {
        let cache = GenotypeCache::new(DIPLOID_BIALLELIC, HeterozygosityFilter::All);
        let first = cache.encode("0/1");
        let second = cache.encode("0/1");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.encode("./."), &cache.missing()));
    }

    #[test]
    fn test_cache_filters() {
        let ignore_het =
            GenotypeCache::new(DIPLOID_BIALLELIC, HeterozygosityFilter::IgnoreHeterozygous);
        assert!(ignore_het.encode("0/1").is_zero());
        assert!(!ignore_het.encode("1/1").is_zero());

        let only_het = GenotypeCache::new(DIPLOID_BIALLELIC, HeterozygosityFilter::OnlyHeterozygous);
        assert!(!only_het.encode("0/1").is_zero());
        assert!(only_het.encode("1/1").is_zero());
        assert!(only_het.encode("0/0").is_zero());
    }

    #[test_log::test]
    fn test_cache_counts_alleles_beyond_layout() {
        let cache = GenotypeCache::new(DIPLOID_BIALLELIC, HeterozygosityFilter::All);

        assert!(cache.encode("2/2").is_zero());
        assert!(cache.encode("2/2").is_zero());
        assert_eq!(cache.encode("0/2").to_string(), "1000");
        assert!(!cache.encode("0/1").is_zero());

        assert_eq!(cache.exceeding_num(), 2);
        assert!(Genotype::parse("1|3").exceeds(GenotypeLayout::new(2, 3)));
        assert!(!Genotype::parse("./2").exceeds(GenotypeLayout::new(2, 3)));
    }

    #[test]
    fn test_cache_concurrent_population() {
        let cache = Arc::new(GenotypeCache::new(
            GenotypeLayout::new(2, 3),
            HeterozygosityFilter::All,
        ));
        let texts = ["0/0", "0/1", "1/2", "2/2", "./."];

        let handles = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || {
                    texts
                        .iter()
                        .map(|text| cache.encode(text).to_string())
                        .collect_vec()
                })
            })
            .collect_vec();
        let results = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect_vec();

        assert!(results.iter().all_equal());
        assert_eq!(cache.len(), texts.len());
    }
}
