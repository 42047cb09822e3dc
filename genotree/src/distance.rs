use itertools::Itertools;
use log::debug;
use rayon::prelude::{IntoParallelIterator, ParallelIterator};

use crate::kmer::KmerProfile;
use crate::pipeline::accumulator::PairwiseAccumulator;

/// Labelled square matrix of pairwise distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    labels: Vec<String>,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Creates a zero matrix with one row per label.
    #[must_use]
    pub fn new<T: Into<Vec<String>>>(labels: T) -> Self {
        let labels = labels.into();
        let values = vec![0.0; labels.len() * labels.len()];

        Self { labels, values }
    }

    /// Creates a matrix from its rows.
    ///
    /// # Panics
    /// Panics if the rows do not form a square matrix with one row per label.
    #[must_use]
    pub fn from_rows<T: Into<Vec<String>>>(labels: T, rows: &[Vec<f64>]) -> Self {
        let labels = labels.into();
        assert_eq!(labels.len(), rows.len(), "Label and row number mismatch");
        assert!(
            rows.iter().all(|row| row.len() == labels.len()),
            "Distance matrix is not square"
        );

        Self {
            labels,
            values: rows.concat(),
        }
    }

    /// Cosine distance of every sample pair of an accumulator.
    #[must_use]
    pub fn from_accumulator<T: Into<Vec<String>>>(
        labels: T,
        accumulator: &PairwiseAccumulator,
    ) -> Self {
        let mut matrix = Self::new(labels);
        assert_eq!(matrix.len(), accumulator.sample_num());

        for (i, j) in (0..matrix.len()).tuple_combinations() {
            let distance = cosine_distance(
                accumulator.dot(i, j),
                accumulator.pair_norm(i, j),
                accumulator.pair_norm(j, i),
            );
            matrix.set_symmetric(i, j, distance);
        }

        matrix
    }

    /// D2 distance of every pair of profiles, computed in parallel.
    #[must_use]
    pub fn from_profiles<T: Into<Vec<String>>>(labels: T, profiles: &[KmerProfile]) -> Self {
        let mut matrix = Self::new(labels);
        assert_eq!(matrix.len(), profiles.len());
        let n = matrix.len();

        let distances: Vec<(usize, usize, f64)> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                ((i + 1)..n).map(move |j| (i, j, profiles[i].d2_distance(&profiles[j])))
            })
            .collect();
        debug!("Computed {} D2 distances", distances.len());

        for (i, j, distance) in distances {
            matrix.set_symmetric(i, j, distance);
        }

        matrix
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.len() + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let n = self.len();
        self.values[i * n + j] = value;
    }

    pub fn set_symmetric(&mut self, i: usize, j: usize, value: f64) {
        self.set(i, j, value);
        self.set(j, i, value);
    }

    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.len();
        &self.values[i * n..(i + 1) * n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // `max(1)` keeps `chunks` happy for an empty matrix
        self.values.chunks(self.len().max(1))
    }

    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        (0..self.len())
            .tuple_combinations()
            .all(|(i, j)| self.get(i, j) == self.get(j, i))
    }

    /// Copy of this matrix with rows, columns and labels reordered so that
    /// row `k` of the result is row `order[k]` of this one.
    ///
    /// # Panics
    /// Panics if `order` is not a permutation of the row indices.
    #[must_use]
    pub fn permuted(&self, order: &[usize]) -> Self {
        assert_eq!(order.len(), self.len());
        assert!(order.iter().copied().sorted().eq(0..self.len()));

        let labels = order.iter().map(|&i| self.labels[i].clone()).collect_vec();
        let rows = order
            .iter()
            .map(|&i| order.iter().map(|&j| self.get(i, j)).collect_vec())
            .collect_vec();

        Self::from_rows(labels, &rows)
    }
}

/// `1 - dot / (sqrt(norm_i) * sqrt(norm_j))`, with degenerate cases (either
/// norm zero, non-finite result) mapped to 0 and negative results floored
/// at 0.
///
/// # Examples
/// ```
/// use genotree::distance::cosine_distance;
///
/// assert_eq!(cosine_distance(3, 4, 4), 0.25);
/// assert_eq!(cosine_distance(0, 0, 7), 0.0);
/// ```
#[must_use]
pub fn cosine_distance(dot: u64, norm_i: u64, norm_j: u64) -> f64 {
    if norm_i == 0 || norm_j == 0 {
        return 0.0;
    }

    let distance = 1.0 - dot as f64 / ((norm_i as f64).sqrt() * (norm_j as f64).sqrt());
    if !distance.is_finite() || distance < 0.0 {
        0.0
    } else {
        distance
    }
}
