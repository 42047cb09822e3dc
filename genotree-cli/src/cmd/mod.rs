use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use genotree::distance::DistanceMatrix;
use genotree::input::InputChain;
use genotree::matrix_file::write_matrix;
use genotree::pipeline::PipelineParamsBuilder;
use log::{debug, info};

use crate::cli::PipelineArgs;
use crate::opts::{plain_input_length, OutputWriter};
use crate::PROGRESS_BAR;

pub(crate) mod fasta;
pub(crate) mod tree;
pub(crate) mod vcf;

/// Opens every input up front, so that a missing file fails the run before
/// anything is read.
fn open_inputs(paths: &[PathBuf]) -> anyhow::Result<InputChain> {
    let chain = InputChain::open(paths).context("Could not open the inputs")?;
    PROGRESS_BAR.start_reading(plain_input_length(paths));

    Ok(chain)
}

/// Pipeline parameters common to every input format; also sizes the global
/// rayon pool used for the distance computation.
fn pipeline_params(args: &PipelineArgs) -> PipelineParamsBuilder {
    let thread_num = args.threads.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    });
    info!("Using {} worker threads", thread_num);

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_num)
        .build_global()
    {
        debug!("Global thread pool already initialized: {}", e);
    }

    let mut params = PipelineParamsBuilder::new();
    params
        .thread_num(thread_num)
        .capacity(args.capacity)
        .progress_notifier(Arc::new(PROGRESS_BAR.clone()));
    params
}

fn write_matrix_file(matrix: &DistanceMatrix, path: &Path) -> anyhow::Result<()> {
    let mut output = OutputWriter::from_path(path)?.into_write();
    write_matrix(matrix, &mut output).context("Could not write the distance matrix")?;
    output.flush()?;

    Ok(())
}
