use anyhow::Context;
use genotree::pipeline::run_genotype_pipeline;
use genotree::vcf::genotype::HeterozygosityFilter;
use itertools::Itertools;
use log::{debug, info, warn};

use crate::cli::VcfArgs;
use crate::cmd::tree::write_tree;
use crate::cmd::{open_inputs, pipeline_params, write_matrix_file};

pub(crate) fn vcf(args: &VcfArgs) -> anyhow::Result<()> {
    let heterozygosity_filter = if args.ignore_het {
        HeterozygosityFilter::IgnoreHeterozygous
    } else if args.only_het {
        HeterozygosityFilter::OnlyHeterozygous
    } else {
        HeterozygosityFilter::All
    };

    let params = pipeline_params(&args.pipeline)
        .ploidy(args.ploidy.map(|ploidy| ploidy as usize))
        .alleles(args.alleles.map(|alleles| alleles as usize))
        .heterozygosity_filter(heterozygosity_filter)
        .ignore_missing(args.ignore_missing)
        .build();

    let inputs = open_inputs(&args.inputs)?;
    let run = run_genotype_pipeline(inputs, &params).context("Could not process the VCF input")?;

    info!(
        "{} samples, {} sites, {}",
        run.shape.sample_num(),
        run.accumulator.site_num(),
        run.shape.layout()
    );
    if run.exceeding_genotypes > 0 && args.alleles.is_none() {
        warn!("Pass --alleles with the largest allele count of the input to keep every call");
    }
    debug!("Samples: {}", run.header.samples().iter().join(", "));
    debug!("{} metadata lines passed through", run.header.meta().len());

    if let Some(path) = &args.pipeline.matrix {
        write_matrix_file(&run.matrix, path)?;
    }
    write_tree(&run.matrix, &args.tree)
}
