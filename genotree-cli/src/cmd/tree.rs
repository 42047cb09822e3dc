use std::io::{BufReader, Read, Write};
use std::path::Path;

use anyhow::{bail, Context};
use genotree::cluster::{cluster, ClusterTree, ClusteringOptions, Linkage};
use genotree::distance::DistanceMatrix;
use genotree::matrix_file::read_matrix;
use genotree::newick::write_newick;
use log::info;

use crate::cli::TreeArgs;
use crate::opts::OutputWriter;
use crate::PROGRESS_BAR;

const LEAF_ORDER_HEADER: [&str; 3] = ["position", "index", "label"];

pub(crate) fn tree<R: Read>(reader: R, args: &TreeArgs) -> anyhow::Result<()> {
    let matrix =
        read_matrix(BufReader::new(reader)).context("Could not read the distance matrix")?;
    info!("Read a distance matrix of {} labels", matrix.len());
    if !matrix.is_symmetric() {
        info!("The distance matrix is not symmetric; only its lower triangle is used");
    }

    write_tree(&matrix, args)
}

/// Clusters the matrix and writes the Newick tree and, if requested, the
/// leaf order.
pub(crate) fn write_tree(matrix: &DistanceMatrix, args: &TreeArgs) -> anyhow::Result<()> {
    let linkage = Linkage::from(&args.linkage);
    info!(
        "Clustering {} labels with {} linkage",
        matrix.len(),
        linkage
    );

    let options = ClusteringOptions::builder()
        .linkage(linkage)
        .progress_notifier(Box::new(&*PROGRESS_BAR))
        .build();
    let tree = match cluster(matrix, &options) {
        Some(tree) => tree,
        None => bail!("Nothing to cluster: no samples or sequences were found"),
    };
    if let Some(root) = tree.merges().last() {
        info!("Tree height: {}", root.height);
    }

    let mut output = OutputWriter::from_path(&args.output)?.into_write();
    write_newick(tree.root(), &mut output).context("Could not write the tree")?;
    output.flush()?;

    if let Some(path) = &args.leaf_order {
        write_leaf_order(&tree, matrix.labels(), path)?;
    }

    Ok(())
}

fn write_leaf_order(tree: &ClusterTree, labels: &[String], path: &Path) -> anyhow::Result<()> {
    let output = OutputWriter::from_path(path)?.into_write();
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(LEAF_ORDER_HEADER)?;
    for (position, index) in tree.leaf_order().into_iter().enumerate() {
        writer.write_record([
            position.to_string(),
            index.to_string(),
            labels[index].clone(),
        ])?;
    }
    writer.flush().context("Could not write the leaf order")?;

    Ok(())
}
