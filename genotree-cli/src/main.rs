#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use anyhow::Context;
use atty::Stream;
use clap::Parser;
use cli::{Cli, Commands};
use cmd::{fasta, tree, vcf};
use human_panic::setup_panic;
use lazy_static::lazy_static;

use crate::logging::init_logging;
use crate::progress_bar::GenotreeProgressBar;

mod cli;
mod cmd;
mod logging;
mod opts;
mod progress_bar;

lazy_static! {
    pub(crate) static ref PROGRESS_BAR: GenotreeProgressBar = GenotreeProgressBar::new();
}

fn main() -> anyhow::Result<()> {
    setup_panic!();

    let cli: Cli = Cli::parse();

    if !cli.no_progress && atty::is(Stream::Stderr) {
        PROGRESS_BAR.show();
    }

    init_logging(cli.verbose.log_level_filter()).expect("Could not initialize logging");

    match &cli.command {
        Commands::Vcf(args) => vcf::vcf(args)?,
        Commands::Fasta(args) => fasta::fasta(args)?,
        Commands::Tree { input, tree: args } => {
            let reader = input.as_reader()?;

            tree::tree(reader.into_read(), args)
                .with_context(|| format!("Failed to build a tree from `{}`", input))?;
        }
    }

    PROGRESS_BAR.finish();
    Ok(())
}
