//! Streaming producer/consumer runs turning VCF or FASTA/FASTQ input into a
//! distance matrix.
//!
//! One source thread decodes records and sends them through a bounded
//! channel to a pool of workers. The workers wait until the source has
//! published the shape of the run, then encode records and accumulate
//! pairwise statistics which are summed up once every worker has finished.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use log::{debug, info, warn};

use crate::distance::DistanceMatrix;
use crate::fasta::reader::SequenceReader;
use crate::fasta::FastaError;
use crate::input::{InputError, LineSource};
use crate::kmer::{KmerProfile, KmerSize};
use crate::pipeline::accumulator::PairwiseAccumulator;
use crate::pipeline::shared::SharedState;
use crate::pipeline::source::{produce_genotypes, produce_sequences};
use crate::pipeline::worker::{accumulate_genotypes, profile_sequences};
use crate::pipeline::worker_pool::WorkerPool;
use crate::progress::{DummyProgressNotifier, ProgressNotifier};
use crate::vcf::encoder::GenotypeShape;
use crate::vcf::genotype::{GenotypeCache, HeterozygosityFilter};
use crate::vcf::reader::{VcfHeader, VcfReader};
use crate::vcf::VcfError;

pub mod accumulator;
mod shared;
mod source;
mod worker;
mod worker_pool;

pub use shared::RunStats;

const SOURCE_THREAD_NAME: &str = "genotree-source";
const WORKER_THREAD_NAME: &str = "genotree-worker";

/// Error occurring during a pipeline run.
#[derive(Debug)]
pub enum PipelineError {
    /// I/O error occurred, e.g. when spawning the source thread.
    IoError(std::io::Error),
    /// The inputs could not be opened.
    Input(InputError),
    /// The VCF input could not be read.
    Vcf(VcfError),
    /// The FASTA/FASTQ input could not be read.
    Fasta(FastaError),
    /// The input ended before the genotype layout could be inferred.
    ShapeUnknown { held_back: usize },
    /// Some of the workers panicked.
    WorkerPanicked(usize),
    /// The source thread panicked.
    SourcePanicked,
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<InputError> for PipelineError {
    fn from(e: InputError) -> Self {
        Self::Input(e)
    }
}

impl From<VcfError> for PipelineError {
    fn from(e: VcfError) -> Self {
        Self::Vcf(e)
    }
}

impl From<FastaError> for PipelineError {
    fn from(e: FastaError) -> Self {
        Self::Fasta(e)
    }
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::IoError(e) => write!(f, "IO error: {}", e),
            PipelineError::Input(e) => write!(f, "Input error: {}", e),
            PipelineError::Vcf(e) => write!(f, "VCF error: {}", e),
            PipelineError::Fasta(e) => write!(f, "FASTA error: {}", e),
            PipelineError::ShapeUnknown { held_back } => write!(
                f,
                "Could not infer the genotype layout ({} records without a called genotype); \
                 set the ploidy explicitly",
                held_back
            ),
            PipelineError::WorkerPanicked(num) => write!(f, "{} worker(s) panicked", num),
            PipelineError::SourcePanicked => write!(f, "Source thread panicked"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::IoError(e) => Some(e),
            PipelineError::Input(e) => Some(e),
            PipelineError::Vcf(e) => Some(e),
            PipelineError::Fasta(e) => Some(e),
            _ => None,
        }
    }
}

/// The result of a pipeline run.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// What the VCF workers need before they can encode anything.
#[derive(Debug)]
pub(crate) struct GenotypeContext {
    pub shape: GenotypeShape,
    pub cache: GenotypeCache,
}

/// What the sequence workers need before they can profile anything.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SequenceShape {
    pub kmer_size: KmerSize,
    pub normalize: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineParams {
    thread_num: usize,
    capacity: usize,
    ploidy: Option<usize>,
    alleles: Option<usize>,
    heterozygosity_filter: HeterozygosityFilter,
    ignore_missing: bool,
    kmer_size: KmerSize,
    normalize: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl PipelineParams {
    pub fn builder() -> PipelineParamsBuilder {
        PipelineParamsBuilder::new()
    }

    #[must_use]
    pub fn thread_num(&self) -> usize {
        self.thread_num
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn kmer_size(&self) -> KmerSize {
        self.kmer_size
    }

    /// Number of worker jobs; with no threads a single job runs on the
    /// calling thread.
    #[must_use]
    fn worker_num(&self) -> usize {
        self.thread_num.max(1)
    }
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineParamsBuilder {
    thread_num: usize,
    capacity: usize,
    ploidy: Option<usize>,
    alleles: Option<usize>,
    heterozygosity_filter: HeterozygosityFilter,
    ignore_missing: bool,
    kmer_size: KmerSize,
    normalize: bool,
    progress_notifier: Arc<dyn ProgressNotifier>,
}

impl PipelineParamsBuilder {
    pub const DEFAULT_CAPACITY: usize = 1024;
    pub const DEFAULT_KMER_SIZE: KmerSize = KmerSize::new(21);

    pub fn new() -> Self {
        Self {
            thread_num: 0,
            capacity: Self::DEFAULT_CAPACITY,
            ploidy: None,
            alleles: None,
            heterozygosity_filter: HeterozygosityFilter::default(),
            ignore_missing: false,
            kmer_size: Self::DEFAULT_KMER_SIZE,
            normalize: false,
            progress_notifier: Arc::new(DummyProgressNotifier),
        }
    }

    /// Number of worker threads; 0 runs the only worker on the calling
    /// thread.
    pub fn thread_num(&mut self, thread_num: usize) -> &mut Self {
        self.thread_num = thread_num;
        self
    }

    /// Number of records the channel holds before the source blocks.
    pub fn capacity(&mut self, capacity: usize) -> &mut Self {
        self.capacity = capacity;
        self
    }

    pub fn ploidy(&mut self, ploidy: Option<usize>) -> &mut Self {
        self.ploidy = ploidy;
        self
    }

    pub fn alleles(&mut self, alleles: Option<usize>) -> &mut Self {
        self.alleles = alleles;
        self
    }

    pub fn heterozygosity_filter(&mut self, filter: HeterozygosityFilter) -> &mut Self {
        self.heterozygosity_filter = filter;
        self
    }

    /// Compares every pair of samples only over the sites both have called.
    pub fn ignore_missing(&mut self, ignore_missing: bool) -> &mut Self {
        self.ignore_missing = ignore_missing;
        self
    }

    pub fn kmer_size(&mut self, kmer_size: KmerSize) -> &mut Self {
        self.kmer_size = kmer_size;
        self
    }

    pub fn normalize(&mut self, normalize: bool) -> &mut Self {
        self.normalize = normalize;
        self
    }

    pub fn progress_notifier(&mut self, progress_notifier: Arc<dyn ProgressNotifier>) -> &mut Self {
        self.progress_notifier = progress_notifier;
        self
    }

    pub fn build(&mut self) -> PipelineParams {
        PipelineParams {
            thread_num: self.thread_num,
            capacity: self.capacity,
            ploidy: self.ploidy,
            alleles: self.alleles,
            heterozygosity_filter: self.heterozygosity_filter,
            ignore_missing: self.ignore_missing,
            kmer_size: self.kmer_size,
            normalize: self.normalize,
            progress_notifier: self.progress_notifier.clone(),
        }
    }
}

impl Default for PipelineParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a VCF run.
#[derive(Debug, Clone)]
pub struct GenotypeRun {
    pub header: VcfHeader,
    pub shape: GenotypeShape,
    pub accumulator: PairwiseAccumulator,
    pub matrix: DistanceMatrix,
    pub stats: RunStats,
    /// Distinct genotypes with alleles beyond the layout's allele count.
    pub exceeding_genotypes: usize,
}

/// Result of a FASTA/FASTQ run.
#[derive(Debug, Clone)]
pub struct SequenceRun {
    pub matrix: DistanceMatrix,
    pub stats: RunStats,
}

/// Streams a VCF input and computes the cosine distance between every pair
/// of samples.
///
/// # Examples
/// ```
/// use genotree::input::InputChain;
/// use genotree::pipeline::{run_genotype_pipeline, PipelineParams};
///
/// let data = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tA\tB\n\
///             1\t10\t.\tA\tG\t.\t.\t.\tGT\t0/1\t0/1\n";
/// let run = run_genotype_pipeline(InputChain::from_bytes(data), &PipelineParams::default())
///     .unwrap();
/// assert_eq!(run.matrix.labels(), ["A", "B"]);
/// assert_eq!(run.matrix.get(0, 1), 0.0);
/// ```
pub fn run_genotype_pipeline<R: LineSource + Send + 'static>(
    input: R,
    params: &PipelineParams,
) -> PipelineResult<GenotypeRun> {
    let shared = Arc::new(SharedState::<GenotypeContext>::new());
    let (sender, receiver) = crossbeam_channel::bounded(params.capacity);

    let source = {
        let shared = shared.clone();
        let params = params.clone();
        thread::Builder::new()
            .name(SOURCE_THREAD_NAME.to_owned())
            .spawn(move || produce_genotypes(VcfReader::new(input), sender, &shared, &params))?
    };

    let pool = WorkerPool::new(params.thread_num, WORKER_THREAD_NAME);
    for _ in 0..params.worker_num() {
        let receiver = receiver.clone();
        let shared = shared.clone();
        let ignore_missing = params.ignore_missing;
        pool.execute(move || accumulate_genotypes(receiver, shared, ignore_missing));
    }
    drop(receiver);

    let worker_results = pool.join();
    let header = join_source(source)?;
    let accumulators = worker_results.map_err(PipelineError::WorkerPanicked)?;

    let context = shared.ready.wait().ok_or(PipelineError::ShapeUnknown { held_back: 0 })?;
    let mut accumulator =
        PairwiseAccumulator::new(context.shape.sample_num(), params.ignore_missing);
    for worker_accumulator in accumulators.iter().flatten() {
        accumulator += worker_accumulator;
    }
    debug!(
        "Reduced {} worker accumulators, {} sites, {} distinct genotypes",
        accumulators.len(),
        accumulator.site_num(),
        context.cache.len()
    );
    let exceeding_genotypes = context.cache.exceeding_num();
    if exceeding_genotypes > 0 {
        warn!(
            "{} distinct genotypes had alleles beyond the layout ({}); \
             those alleles were read as missing",
            exceeding_genotypes,
            context.shape.layout()
        );
    }

    let matrix = DistanceMatrix::from_accumulator(context.shape.samples(), &accumulator);
    shared.counters.print_stats();

    Ok(GenotypeRun {
        header,
        shape: context.shape.clone(),
        accumulator,
        matrix,
        stats: shared.counters.snapshot(),
        exceeding_genotypes,
    })
}

/// Streams a FASTA or FASTQ input and computes the D2 distance between every
/// pair of sequences, in input order.
pub fn run_sequence_pipeline<R: LineSource + Send + 'static>(
    input: R,
    params: &PipelineParams,
) -> PipelineResult<SequenceRun> {
    let shared = Arc::new(SharedState::<SequenceShape>::new());
    let (sender, receiver) = crossbeam_channel::bounded(params.capacity);

    let source = {
        let shared = shared.clone();
        let params = params.clone();
        thread::Builder::new()
            .name(SOURCE_THREAD_NAME.to_owned())
            .spawn(move || produce_sequences(SequenceReader::new(input), sender, &shared, &params))?
    };

    let pool = WorkerPool::new(params.thread_num, WORKER_THREAD_NAME);
    for _ in 0..params.worker_num() {
        let receiver = receiver.clone();
        let shared = shared.clone();
        pool.execute(move || profile_sequences(receiver, shared));
    }
    drop(receiver);

    let worker_results = pool.join();
    join_source(source)?;
    let mut profiled: Vec<_> = worker_results
        .map_err(PipelineError::WorkerPanicked)?
        .into_iter()
        .flatten()
        .collect();
    profiled.sort_by_key(|sequence| sequence.ordinal);

    let (labels, profiles): (Vec<String>, Vec<KmerProfile>) = profiled
        .into_iter()
        .map(|sequence| (sequence.name, sequence.profile))
        .unzip();
    info!(
        "Computing D2 distances between {} sequences (k = {})",
        profiles.len(),
        params.kmer_size
    );
    let matrix = DistanceMatrix::from_profiles(labels, &profiles);
    shared.counters.print_stats();

    Ok(SequenceRun {
        matrix,
        stats: shared.counters.snapshot(),
    })
}

fn join_source<T>(source: JoinHandle<PipelineResult<T>>) -> PipelineResult<T> {
    source.join().map_err(|_| PipelineError::SourcePanicked)?
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::_internal_test_data::{
        synthetic_vcf, SIMPLE_FASTA, SIMPLE_FASTQ, SIMPLE_VCF, SIMPLE_VCF_GZ,
    };
    use crate::input::InputChain;
    use crate::kmer::KmerSize;
    use crate::pipeline::{
        run_genotype_pipeline, run_sequence_pipeline, PipelineError, PipelineParams,
    };
    use crate::vcf::genotype::{GenotypeLayout, HeterozygosityFilter};

    fn params(thread_num: usize) -> PipelineParams {
        PipelineParams::builder()
            .thread_num(thread_num)
            .capacity(4)
            .build()
    }

    #[test]
    fn test_simple_vcf() {
        let run = run_genotype_pipeline(InputChain::from_bytes(SIMPLE_VCF), &params(2)).unwrap();

        assert_eq!(run.header.samples(), ["S1", "S2", "S3"]);
        assert_eq!(run.shape.layout(), GenotypeLayout::new(2, 2));
        assert_eq!(run.stats.records, 2);
        assert_eq!(run.stats.bytes.get(), SIMPLE_VCF.len());
        assert!(run.matrix.is_symmetric());
        assert_relative_eq!(run.matrix.get(0, 1), 0.25, epsilon = 1e-12);
        assert_relative_eq!(run.matrix.get(0, 2), 1.0, epsilon = 1e-12);
        assert!(run.matrix.get(0, 2) > run.matrix.get(0, 1));
    }

    #[test]
    fn test_gzip_input() {
        let plain = run_genotype_pipeline(InputChain::from_bytes(SIMPLE_VCF), &params(1)).unwrap();
        let gzip =
            run_genotype_pipeline(InputChain::from_bytes(SIMPLE_VCF_GZ.clone()), &params(1))
                .unwrap();

        assert_eq!(plain.accumulator, gzip.accumulator);
    }

    #[test]
    fn test_worker_num_does_not_change_result() {
        let data = synthetic_vcf(12, 500);
        let single =
            run_genotype_pipeline(InputChain::from_bytes(data.clone()), &params(0)).unwrap();
        let multi = run_genotype_pipeline(InputChain::from_bytes(data), &params(4)).unwrap();

        assert_eq!(single.accumulator.site_num(), 500);
        assert_eq!(single.accumulator, multi.accumulator);
        assert_eq!(single.matrix, multi.matrix);
    }

    #[test]
    fn test_short_data_line() {
        let data = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tA\tB\tC\n\
                    1\t1\t.\tA\tC\t.\t.\t.\tGT\t0/1\t0/1\n";
        let run = run_genotype_pipeline(InputChain::from_bytes(data), &params(1)).unwrap();

        assert_eq!(run.stats.skipped_records, 0);
        assert_eq!(run.accumulator.norm(2), 0);
        assert_eq!(run.matrix.get(0, 1), 0.0);
        assert_eq!(run.matrix.get(0, 2), 0.0);
    }

    #[test]
    fn test_heterozygosity_filter() {
        let params = PipelineParams::builder()
            .heterozygosity_filter(HeterozygosityFilter::IgnoreHeterozygous)
            .build();
        let run = run_genotype_pipeline(InputChain::from_bytes(SIMPLE_VCF), &params).unwrap();

        assert_eq!(run.accumulator.norm(1), 0);
        assert_eq!(run.accumulator.norm(0), 2);
    }

    #[test]
    fn test_ploidy_override() {
        let params = PipelineParams::builder()
            .ploidy(Some(2))
            .alleles(Some(4))
            .build();
        let run = run_genotype_pipeline(InputChain::from_bytes(SIMPLE_VCF), &params).unwrap();

        assert_eq!(run.shape.layout(), GenotypeLayout::new(2, 4));
    }

    #[test_log::test]
    fn test_alleles_beyond_inferred_layout() {
        let data = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tA\tB\n\
                    1\t1\t.\tA\tC\t.\t.\t.\tGT\t0/1\t0/1\n\
                    1\t2\t.\tA\tC,G\t.\t.\t.\tGT\t2/2\t2/2\n";

        let inferred = run_genotype_pipeline(InputChain::from_bytes(data), &params(2)).unwrap();
        assert_eq!(inferred.shape.layout(), GenotypeLayout::new(2, 2));
        assert_eq!(inferred.exceeding_genotypes, 1);
        assert_eq!(inferred.accumulator.norm(0), 2);

        let params = PipelineParams::builder().alleles(Some(3)).build();
        let fixed = run_genotype_pipeline(InputChain::from_bytes(data), &params).unwrap();
        assert_eq!(fixed.exceeding_genotypes, 0);
        assert_eq!(fixed.accumulator.norm(0), 4);
        assert_eq!(fixed.accumulator.dot(0, 1), 4);
    }

    #[test_log::test]
    fn test_unknown_shape() {
        let data = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tA\n\
                    1\t1\t.\tA\tC\t.\t.\t.\tGT\t.\n";
        let error = run_genotype_pipeline(InputChain::from_bytes(data), &params(2)).unwrap_err();

        assert!(matches!(error, PipelineError::ShapeUnknown { held_back: 1 }));
    }

    #[test]
    fn test_missing_header() {
        let error = run_genotype_pipeline(InputChain::from_bytes("##only meta\n"), &params(2))
            .unwrap_err();

        assert!(matches!(error, PipelineError::Vcf(_)));
    }

    #[test]
    fn test_fasta() {
        let params = PipelineParams::builder()
            .thread_num(2)
            .kmer_size(KmerSize::new(3))
            .build();
        let run = run_sequence_pipeline(InputChain::from_bytes(SIMPLE_FASTA), &params).unwrap();

        assert_eq!(run.stats.records, 3);
        assert_eq!(run.matrix.labels(), ["alpha", "beta", "gamma"]);
        assert!(run.matrix.is_symmetric());
        for i in 0..run.matrix.len() {
            assert_eq!(run.matrix.get(i, i), 0.0);
        }
    }

    #[test]
    fn test_fastq() {
        let params = PipelineParams::builder()
            .kmer_size(KmerSize::new(2))
            .build();
        let run = run_sequence_pipeline(InputChain::from_bytes(SIMPLE_FASTQ), &params).unwrap();

        assert_eq!(run.matrix.len(), 2);
        assert_eq!(run.matrix.labels()[1], "read_2");
    }
}
