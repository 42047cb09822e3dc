use std::sync::Arc;

use crate::bitset::Bitset;
use crate::vcf::genotype::{Genotype, GenotypeCache, GenotypeLayout, GENOTYPE_FIELD};
use crate::vcf::reader::VcfRecord;
use crate::vcf::{VcfError, VcfResult, VCF_ALT_COLUMN, VCF_FIXED_COLUMNS, VCF_FORMAT_COLUMN};

const FORMAT_SEPARATOR: char = ':';
const ALT_SEPARATOR: char = ',';
const MISSING_VALUE: &str = ".";
const MIN_ALLELES: usize = 2;

/// Sample names and genotype layout of a run. Fixed once known.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GenotypeShape {
    samples: Vec<String>,
    layout: GenotypeLayout,
}

impl GenotypeShape {
    #[must_use]
    pub fn new<T: Into<Vec<String>>>(samples: T, layout: GenotypeLayout) -> Self {
        Self {
            samples: samples.into(),
            layout,
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    #[must_use]
    pub fn sample_num(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn layout(&self) -> GenotypeLayout {
        self.layout
    }
}

/// Guesses the genotype layout from a data record.
///
/// Ploidy comes from the first `GT` value that tells it, the allele
/// cardinality from the number of ALT alleles (at least biallelic). Either
/// can be fixed by the caller. Returns `None` if the record does not tell the
/// ploidy, e.g. when every sample is `.`.
pub fn infer_layout(
    record: &VcfRecord,
    ploidy: Option<usize>,
    alleles: Option<usize>,
) -> VcfResult<Option<GenotypeLayout>> {
    if let (Some(ploidy), Some(alleles)) = (ploidy, alleles) {
        return Ok(Some(GenotypeLayout::new(ploidy, alleles)));
    }

    let columns = split_columns(record)?;

    let alleles = alleles.unwrap_or_else(|| {
        let alt = columns[VCF_ALT_COLUMN];
        let alt_num = if alt == MISSING_VALUE || alt.is_empty() {
            0
        } else {
            alt.split(ALT_SEPARATOR).count()
        };
        (alt_num + 1).max(MIN_ALLELES)
    });

    let ploidy = match ploidy {
        Some(ploidy) => Some(ploidy),
        None => {
            let gt_index = genotype_field_index(&columns, record)?;
            columns[VCF_FIXED_COLUMNS..]
                .iter()
                .filter_map(|sample| sample.split(FORMAT_SEPARATOR).nth(gt_index))
                .map(Genotype::parse)
                .find(Genotype::has_known_ploidy)
                .map(|genotype| genotype.ploidy())
        }
    };

    Ok(ploidy.map(|ploidy| GenotypeLayout::new(ploidy, alleles)))
}

/// Encodes the genotype of every sample of a record.
///
/// The result always has `sample_num` entries: samples missing from the
/// line, or without a `GT` value, are encoded as all-zero.
pub fn encode_record(
    record: &VcfRecord,
    sample_num: usize,
    cache: &GenotypeCache,
) -> VcfResult<Vec<Arc<Bitset>>> {
    let columns = split_columns(record)?;
    let gt_index = genotype_field_index(&columns, record)?;

    let mut site: Vec<Arc<Bitset>> = columns[VCF_FIXED_COLUMNS..]
        .iter()
        .take(sample_num)
        .map(|sample| match sample.split(FORMAT_SEPARATOR).nth(gt_index) {
            Some(text) => cache.encode(text),
            None => cache.missing(),
        })
        .collect();
    site.resize(sample_num, cache.missing());

    Ok(site)
}

fn split_columns(record: &VcfRecord) -> VcfResult<Vec<&str>> {
    let columns: Vec<&str> = record.columns().collect();
    if columns.len() < VCF_FIXED_COLUMNS {
        return Err(VcfError::TooFewColumns {
            line: record.line_number(),
            columns: columns.len(),
        });
    }

    Ok(columns)
}

fn genotype_field_index(columns: &[&str], record: &VcfRecord) -> VcfResult<usize> {
    columns[VCF_FORMAT_COLUMN]
        .split(FORMAT_SEPARATOR)
        .position(|field| field == GENOTYPE_FIELD)
        .ok_or_else(|| VcfError::MissingGenotypeField(record.line_number()))
}
