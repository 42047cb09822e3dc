use std::fmt::{Display, Formatter};

use log::{debug, warn};

use crate::clade::Clade;
use crate::distance::DistanceMatrix;
use crate::progress::{DummyProgressNotifier, ProgressNotifier};

const MERGED_SENTINEL: f64 = -1.0;
const INVALID_DISTANCE_REPLACEMENT: f64 = 1.0;

/// Rule for the distance between a merged cluster and any other cluster.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum Linkage {
    /// Size-weighted mean of the merged clusters' distances (UPGMA).
    #[default]
    Average,
    /// Largest of the merged clusters' distances.
    Complete,
    /// Smallest of the merged clusters' distances.
    Single,
}

impl Linkage {
    pub const VALUES: [Linkage; 3] = [Linkage::Average, Linkage::Complete, Linkage::Single];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Linkage::Average => "average",
            Linkage::Complete => "complete",
            Linkage::Single => "single",
        }
    }

    /// Distance from the union of clusters A and B (of sizes `size_a` and
    /// `size_b`) to a third cluster, given the distances `distance_a` and
    /// `distance_b` from A and B to it.
    #[must_use]
    pub fn combine(&self, distance_a: f64, size_a: usize, distance_b: f64, size_b: usize) -> f64 {
        match self {
            Linkage::Average => {
                (distance_a * size_a as f64 + distance_b * size_b as f64)
                    / (size_a + size_b) as f64
            }
            Linkage::Complete => distance_a.max(distance_b),
            Linkage::Single => distance_a.min(distance_b),
        }
    }
}

impl Display for Linkage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One merge of the clustering, in the order they happened.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Merge {
    /// Matrix index of the cluster that keeps its row (the smaller one).
    pub survivor: usize,
    /// Matrix index of the cluster whose row is retired.
    pub merged: usize,
    /// Linkage distance at which the clusters were joined.
    pub distance: f64,
    /// Height of the new internal node, half the distance.
    pub height: f64,
    /// Number of leaves of the new cluster.
    pub size: usize,
}

/// Result of a clustering: the tree and its merge history.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterTree {
    root: Clade,
    merges: Vec<Merge>,
}

impl ClusterTree {
    #[must_use]
    pub fn root(&self) -> &Clade {
        &self.root
    }

    #[must_use]
    pub fn into_root(self) -> Clade {
        self.root
    }

    #[must_use]
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Matrix indices of the leaves in tree order.
    #[must_use]
    pub fn leaf_order(&self) -> Vec<usize> {
        self.root.leaf_order()
    }
}

#[derive(Debug)]
pub struct ClusteringOptions {
    linkage: Linkage,
    progress_notifier: Box<dyn ProgressNotifier>,
}

impl ClusteringOptions {
    pub fn builder() -> ClusteringOptionsBuilder {
        ClusteringOptionsBuilder::new()
    }

    #[must_use]
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub struct ClusteringOptionsBuilder {
    linkage: Linkage,
    progress_notifier: Box<dyn ProgressNotifier>,
}

impl ClusteringOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            linkage: Linkage::default(),
            progress_notifier: Box::new(DummyProgressNotifier),
        }
    }

    pub fn linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn progress_notifier(mut self, progress_notifier: Box<dyn ProgressNotifier>) -> Self {
        self.progress_notifier = progress_notifier;
        self
    }

    #[must_use]
    pub fn build(self) -> ClusteringOptions {
        ClusteringOptions {
            linkage: self.linkage,
            progress_notifier: self.progress_notifier,
        }
    }
}

impl Default for ClusteringOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Agglomerative clustering of a distance matrix.
///
/// Every iteration joins the pair with the smallest distance in the strict
/// lower triangle, scanned row by row; the first such pair found wins ties.
/// The joined cluster keeps the smaller index. Its node sits at half the
/// join distance and the edges to both children make up the difference
/// from their own heights. Of the two children, the one with more leaves
/// comes second (the smaller index comes first on a tie).
///
/// Only the lower triangle of `matrix` is read. NaN entries are treated as
/// 1 and negative entries as 0. Returns `None` for an empty matrix.
#[must_use]
pub fn cluster(matrix: &DistanceMatrix, options: &ClusteringOptions) -> Option<ClusterTree> {
    let n = matrix.len();
    if n == 0 {
        return None;
    }

    let mut state = ClusteringState::new(matrix);
    let linkage = options.linkage;
    let mut merges = Vec::with_capacity(n - 1);

    options.progress_notifier.set_iter_num((n - 1) as u64);
    for _ in 1..n {
        let (row, column, distance) = match state.closest_pair() {
            Some(pair) => pair,
            None => break,
        };

        let merge = state.merge(row, column, distance, linkage);
        debug!(
            "Joined {} and {} at distance {} ({} leaves)",
            merge.survivor, merge.merged, merge.distance, merge.size
        );
        merges.push(merge);
        options.progress_notifier.inc_iter();
    }

    let root = state.clades[0].take()?;
    Some(ClusterTree { root, merges })
}

struct ClusteringState {
    n: usize,
    distances: Vec<f64>,
    clades: Vec<Option<Clade>>,
    sizes: Vec<usize>,
    heights: Vec<f64>,
    active: Vec<bool>,
}

impl ClusteringState {
    fn new(matrix: &DistanceMatrix) -> Self {
        let n = matrix.len();
        let mut distances = vec![0.0; n * n];
        let mut invalid_num = 0;

        for row in 1..n {
            for column in 0..row {
                let mut value = matrix.get(row, column);
                if value.is_nan() {
                    invalid_num += 1;
                    value = INVALID_DISTANCE_REPLACEMENT;
                } else if value < 0.0 {
                    invalid_num += 1;
                    value = 0.0;
                }
                distances[row * n + column] = value;
                distances[column * n + row] = value;
            }
        }
        if invalid_num > 0 {
            warn!(
                "Replaced {} NaN or negative distances before clustering",
                invalid_num
            );
        }

        let clades = matrix
            .labels()
            .iter()
            .enumerate()
            .map(|(index, label)| Some(Clade::new_leaf(index, label.as_str())))
            .collect();

        Self {
            n,
            distances,
            clades,
            sizes: vec![1; n],
            heights: vec![0.0; n],
            active: vec![true; n],
        }
    }

    #[inline]
    fn distance(&self, i: usize, j: usize) -> f64 {
        self.distances[i * self.n + j]
    }

    #[inline]
    fn set_distance(&mut self, i: usize, j: usize, value: f64) {
        self.distances[i * self.n + j] = value;
        self.distances[j * self.n + i] = value;
    }

    /// `(row, column, distance)` of the closest active pair, `row > column`.
    fn closest_pair(&self) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, usize, f64)> = None;

        for row in (1..self.n).filter(|&row| self.active[row]) {
            for column in (0..row).filter(|&column| self.active[column]) {
                let distance = self.distance(row, column);
                if distance < 0.0 {
                    continue;
                }
                if best.map_or(true, |(_, _, best_distance)| distance < best_distance) {
                    best = Some((row, column, distance));
                }
            }
        }

        best
    }

    fn merge(&mut self, row: usize, column: usize, distance: f64, linkage: Linkage) -> Merge {
        let height = distance / 2.0;

        let mut survivor = self.clades[column]
            .take()
            .expect("Active cluster without a clade");
        let mut merged = self.clades[row]
            .take()
            .expect("Active cluster without a clade");
        survivor.set_branch_length(height - self.heights[column]);
        merged.set_branch_length(height - self.heights[row]);

        let children = if self.sizes[column] > self.sizes[row] {
            vec![merged, survivor]
        } else {
            vec![survivor, merged]
        };
        self.clades[column] = Some(Clade::new_node(children));

        for other in 0..self.n {
            if other == row || other == column || !self.active[other] {
                continue;
            }

            let combined = linkage.combine(
                self.distance(column, other),
                self.sizes[column],
                self.distance(row, other),
                self.sizes[row],
            );
            self.set_distance(column, other, combined);
        }
        for other in 0..self.n {
            self.set_distance(row, other, MERGED_SENTINEL);
        }

        self.sizes[column] += self.sizes[row];
        self.heights[column] = height;
        self.active[row] = false;

        Merge {
            survivor: column,
            merged: row,
            distance,
            height,
            size: self.sizes[column],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use approx::assert_relative_eq;
    use itertools::Itertools;

    use crate::clade::Clade;
    use crate::cluster::{cluster, ClusteringOptions, Linkage};
    use crate::distance::DistanceMatrix;
    use crate::progress::{ByteNum, ProgressNotifier};

    fn four_leaves() -> DistanceMatrix {
        DistanceMatrix::from_rows(
            vec!["A".to_owned(), "B".to_owned(), "C".to_owned(), "D".to_owned()],
            &[
                vec![0.0, 1.0, 4.0, 9.0],
                vec![1.0, 0.0, 5.0, 10.0],
                vec![4.0, 5.0, 0.0, 2.0],
                vec![9.0, 10.0, 2.0, 0.0],
            ],
        )
    }

    fn options(linkage: Linkage) -> ClusteringOptions {
        ClusteringOptions::builder().linkage(linkage).build()
    }

    /// Newick-like text with children sorted, equal for isomorphic trees.
    fn canonical(clade: &Clade) -> String {
        if clade.is_leaf() {
            return format!("{}:{:.6}", clade.label().unwrap(), clade.branch_length());
        }

        let children = clade.children().iter().map(canonical).sorted().join(",");
        format!("({}):{:.6}", children, clade.branch_length())
    }

    #[test]
    fn test_linkage_combine() {
        assert_relative_eq!(Linkage::Average.combine(4.0, 1, 5.0, 3), 4.75);
        assert_eq!(Linkage::Complete.combine(4.0, 1, 5.0, 3), 5.0);
        assert_eq!(Linkage::Single.combine(4.0, 1, 5.0, 3), 4.0);
        assert_eq!(Linkage::default(), Linkage::Average);
        assert_eq!(Linkage::Single.to_string(), "single");
    }

    #[test]
    fn test_single_linkage() {
        let tree = cluster(&four_leaves(), &options(Linkage::Single)).unwrap();
        let merges = tree.merges();

        assert_eq!(merges.len(), 3);
        assert_eq!((merges[0].survivor, merges[0].merged), (0, 1));
        assert_eq!(merges[0].distance, 1.0);
        assert_eq!((merges[1].survivor, merges[1].merged), (2, 3));
        assert_eq!(merges[1].distance, 2.0);
        assert_eq!((merges[2].survivor, merges[2].merged), (0, 2));
        assert_eq!(merges[2].distance, 4.0);
        assert_eq!(merges[2].size, 4);
    }

    #[test]
    fn test_complete_linkage() {
        let tree = cluster(&four_leaves(), &options(Linkage::Complete)).unwrap();
        let merges = tree.merges();

        assert_eq!((merges[1].survivor, merges[1].merged), (2, 3));
        assert_eq!(merges[2].distance, 10.0);
    }

    #[test]
    fn test_average_linkage() {
        let tree = cluster(&four_leaves(), &options(Linkage::Average)).unwrap();

        assert_eq!(tree.merges()[2].distance, 7.0);
        assert_eq!(tree.merges()[2].height, 3.5);
    }

    #[test]
    fn test_branch_lengths() {
        let tree = cluster(&four_leaves(), &options(Linkage::Single)).unwrap();
        let root = tree.root();
        let ab = &root.children()[0];
        let cd = &root.children()[1];

        assert_eq!(root.size(), 4);
        assert_eq!(ab.branch_length(), 1.5);
        assert_eq!(cd.branch_length(), 1.0);
        assert_eq!(ab.children()[0].label(), Some("A"));
        assert_eq!(ab.children()[0].branch_length(), 0.5);
        assert_eq!(cd.children()[1].label(), Some("D"));
        assert_eq!(cd.children()[1].branch_length(), 1.0);
        assert_eq!(tree.leaf_order(), [0, 1, 2, 3]);
    }

    #[test]
    fn test_larger_cluster_goes_second() {
        let matrix = DistanceMatrix::from_rows(
            vec!["A".to_owned(), "B".to_owned(), "C".to_owned()],
            &[
                vec![0.0, 5.0, 6.0],
                vec![5.0, 0.0, 1.0],
                vec![6.0, 1.0, 0.0],
            ],
        );
        let tree = cluster(&matrix, &options(Linkage::Average)).unwrap();

        // {B, C} survives at index 1, A at index 0 is the column and has
        // fewer leaves
        assert_eq!(tree.leaf_order(), [0, 1, 2]);
        assert!(tree.root().children()[0].is_leaf());
        assert_eq!(tree.root().children()[1].size(), 2);
    }

    #[test]
    fn test_ties_resolved_in_scan_order() {
        let matrix = DistanceMatrix::from_rows(
            vec!["A".to_owned(), "B".to_owned(), "C".to_owned()],
            &[
                vec![0.0, 2.0, 2.0],
                vec![2.0, 0.0, 2.0],
                vec![2.0, 2.0, 0.0],
            ],
        );
        let tree = cluster(&matrix, &options(Linkage::Average)).unwrap();

        assert_eq!(
            (tree.merges()[0].survivor, tree.merges()[0].merged),
            (0, 1)
        );
    }

    #[test]
    fn test_permutation_invariance() {
        let matrix = DistanceMatrix::from_rows(
            (0..5).map(|i| format!("L{}", i)).collect_vec(),
            &[
                vec![0.0, 0.3, 0.7, 0.9, 0.55],
                vec![0.3, 0.0, 0.65, 0.85, 0.6],
                vec![0.7, 0.65, 0.0, 0.2, 0.8],
                vec![0.9, 0.85, 0.2, 0.0, 0.95],
                vec![0.55, 0.6, 0.8, 0.95, 0.0],
            ],
        );

        for linkage in Linkage::VALUES {
            let expected = canonical(cluster(&matrix, &options(linkage)).unwrap().root());
            for order in (0..5).permutations(5).step_by(7) {
                let permuted = matrix.permuted(&order);
                let tree = cluster(&permuted, &options(linkage)).unwrap();

                assert_eq!(canonical(tree.root()), expected, "{} {:?}", linkage, order);
            }
        }
    }

    #[test]
    fn test_monotone_heights() {
        let matrix = DistanceMatrix::from_rows(
            (0..4).map(|i| format!("L{}", i)).collect_vec(),
            &[
                vec![0.0, 0.1, 0.5, 0.6],
                vec![0.1, 0.0, 0.4, 0.7],
                vec![0.5, 0.4, 0.0, 0.3],
                vec![0.6, 0.7, 0.3, 0.0],
            ],
        );

        for linkage in Linkage::VALUES {
            let tree = cluster(&matrix, &options(linkage)).unwrap();
            assert!(tree
                .merges()
                .iter()
                .tuple_windows()
                .all(|(a, b)| a.height <= b.height));
        }
    }

    #[test_log::test]
    fn test_sanitizes_invalid_distances() {
        let matrix = DistanceMatrix::from_rows(
            vec!["A".to_owned(), "B".to_owned(), "C".to_owned()],
            &[
                vec![0.0, f64::NAN, -3.0],
                vec![f64::NAN, 0.0, 0.5],
                vec![-3.0, 0.5, 0.0],
            ],
        );
        let tree = cluster(&matrix, &options(Linkage::Single)).unwrap();

        assert_eq!(tree.merges()[0].distance, 0.0);
        assert_eq!(
            (tree.merges()[0].survivor, tree.merges()[0].merged),
            (0, 2)
        );
        assert_eq!(tree.merges()[1].distance, 0.5);
    }

    #[test]
    fn test_degenerate_sizes() {
        let empty = DistanceMatrix::new(Vec::<String>::new());
        assert!(cluster(&empty, &ClusteringOptions::default()).is_none());

        let single = DistanceMatrix::new(vec!["only".to_owned()]);
        let tree = cluster(&single, &ClusteringOptions::default()).unwrap();
        assert!(tree.root().is_leaf());
        assert!(tree.merges().is_empty());
        assert_eq!(tree.leaf_order(), [0]);
    }

    #[derive(Debug, Default)]
    struct IterationCounter {
        total: AtomicU64,
        done: AtomicU64,
    }

    impl ProgressNotifier for IterationCounter {
        fn processed_bytes(&self, _bytes: ByteNum) {}

        fn set_iter_num(&self, num_iter: u64) {
            self.total.store(num_iter, Ordering::Relaxed);
        }

        fn inc_iter(&self) {
            self.done.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_progress_notifier() {
        let counter: &'static IterationCounter = Box::leak(Box::new(IterationCounter::default()));
        let options = ClusteringOptions::builder()
            .progress_notifier(Box::new(counter))
            .build();

        cluster(&four_leaves(), &options).unwrap();

        assert_eq!(counter.total.load(Ordering::Relaxed), 3);
        assert_eq!(counter.done.load(Ordering::Relaxed), 3);
    }
}
