//! Streaming genotype and k-mer distance matrices, agglomerative clustering
//! and Newick trees.
//!
//! A run reads VCF or FASTA/FASTQ input through the [`pipeline`], which
//! yields a [`distance::DistanceMatrix`]. [`cluster::cluster`] turns the
//! matrix into a tree of [`clade::Clade`]s that [`newick`] serializes.

pub mod bitset;
pub mod clade;
pub mod cluster;
pub mod distance;
pub mod fasta;
pub mod input;
pub mod kmer;
pub mod matrix_file;
pub mod newick;
pub mod pipeline;
pub mod progress;
mod stats;
pub mod vcf;

#[doc(hidden)]
pub mod _internal_test_data;
