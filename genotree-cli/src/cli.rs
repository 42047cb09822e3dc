use std::path::PathBuf;

use clap::{Args, Parser, PossibleValue, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use genotree::cluster::Linkage;
use genotree::kmer::KmerSize;
use genotree::pipeline::PipelineParamsBuilder;
use lazy_static::lazy_static;

use crate::opts::{input_stream, InputStream};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Don't display a progress bar/spinner
    #[clap(long, global = true, value_parser)]
    pub no_progress: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug)]
pub struct LinkageCli {
    pub inner: Linkage,
}

impl LinkageCli {
    #[must_use]
    pub fn new(inner: Linkage) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn variants() -> Vec<Self> {
        Linkage::VALUES
            .iter()
            .map(|&inner| LinkageCli::new(inner))
            .collect()
    }
}

lazy_static! {
    static ref LINKAGE_CLI_VARIANTS: Vec<LinkageCli> = LinkageCli::variants();
}

impl ValueEnum for LinkageCli {
    fn value_variants<'a>() -> &'a [Self] {
        &LINKAGE_CLI_VARIANTS
    }

    fn to_possible_value<'a>(&self) -> Option<PossibleValue<'a>> {
        let value = PossibleValue::new(self.inner.name());
        Some(value)
    }
}

impl From<&LinkageCli> for Linkage {
    fn from(linkage: &LinkageCli) -> Self {
        linkage.inner
    }
}

fn kmer_size(value: &str) -> Result<KmerSize, String> {
    let size: usize = value.parse().map_err(|_| format!("`{}` is not a number", value))?;
    KmerSize::try_from(size).map_err(|e| e.to_string())
}

/// Clustering and tree output options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    /// Rule for the distance between merged clusters
    #[clap(long, arg_enum, default_value = "average")]
    pub linkage: LinkageCli,

    /// Output Newick tree path; `-` is the standard output
    #[clap(short, long, value_parser, default_value = "-")]
    pub output: PathBuf,

    /// Write the leaf order of the tree as a CSV file to given path
    #[clap(long, value_parser)]
    pub leaf_order: Option<PathBuf>,
}

/// Options of the streaming pipeline shared by the VCF and FASTA commands.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Number of worker threads; defaults to the number of CPUs
    #[clap(long, value_parser)]
    pub threads: Option<usize>,

    /// Number of records buffered between the reader and the workers
    #[clap(long, value_parser, default_value_t = PipelineParamsBuilder::DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Also write the distance matrix to given path
    #[clap(long, value_parser)]
    pub matrix: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct VcfArgs {
    /// Input VCF files, optionally gzip-compressed; `-` is the standard input
    #[clap(value_parser, default_value = "-")]
    pub inputs: Vec<PathBuf>,

    /// Number of alleles per call; guessed from the first called genotype
    /// if not given
    #[clap(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub ploidy: Option<u32>,

    /// Number of distinct alleles per site; guessed from the ALT column of
    /// the first usable record if not given
    #[clap(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub alleles: Option<u32>,

    /// Treat heterozygous calls as missing
    #[clap(long, value_parser, conflicts_with = "only_het")]
    pub ignore_het: bool,

    /// Treat homozygous calls as missing
    #[clap(long, value_parser)]
    pub only_het: bool,

    /// Compare every pair of samples only over the sites both have called
    #[clap(long, value_parser)]
    pub ignore_missing: bool,

    #[clap(flatten)]
    pub pipeline: PipelineArgs,

    #[clap(flatten)]
    pub tree: TreeArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FastaArgs {
    /// Input FASTA or FASTQ files, optionally gzip-compressed; `-` is the
    /// standard input
    #[clap(value_parser, default_value = "-")]
    pub inputs: Vec<PathBuf>,

    /// K-mer length (1 - 31)
    #[clap(long, value_parser = kmer_size, default_value = "21")]
    pub kmer: KmerSize,

    /// Scale the k-mer probability vectors to unit length
    #[clap(long, value_parser)]
    pub normalize: bool,

    #[clap(flatten)]
    pub pipeline: PipelineArgs,

    #[clap(flatten)]
    pub tree: TreeArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a tree of the samples of VCF files from their genotypes
    Vcf(VcfArgs),

    /// Build a tree of the sequences of FASTA/FASTQ files from their k-mer
    /// profiles
    Fasta(FastaArgs),

    /// Build a tree from a distance matrix file
    Tree {
        /// Input distance matrix file; `-` is the standard input
        #[clap(default_value_t, value_parser = input_stream)]
        input: InputStream,

        #[clap(flatten)]
        tree: TreeArgs,
    },
}
