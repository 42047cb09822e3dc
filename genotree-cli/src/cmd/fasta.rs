use anyhow::Context;
use genotree::pipeline::run_sequence_pipeline;
use itertools::Itertools;
use log::{debug, info, warn};

use crate::cli::FastaArgs;
use crate::cmd::tree::write_tree;
use crate::cmd::{open_inputs, pipeline_params, write_matrix_file};

pub(crate) fn fasta(args: &FastaArgs) -> anyhow::Result<()> {
    let params = pipeline_params(&args.pipeline)
        .kmer_size(args.kmer)
        .normalize(args.normalize)
        .build();

    let inputs = open_inputs(&args.inputs)?;
    let run = run_sequence_pipeline(inputs, &params)
        .context("Could not process the FASTA/FASTQ input")?;

    info!("{} sequences profiled", run.matrix.len());
    let duplicates: Vec<&String> = run.matrix.labels().iter().duplicates().collect();
    if !duplicates.is_empty() {
        warn!(
            "Duplicate sequence names in the tree: {}",
            duplicates.iter().join(", ")
        );
    }
    debug!("Skipped {} records", run.stats.skipped_records);

    if let Some(path) = &args.pipeline.matrix {
        write_matrix_file(&run.matrix, path)?;
    }
    write_tree(&run.matrix, &args.tree)
}
