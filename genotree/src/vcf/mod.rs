use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod encoder;
pub mod genotype;
pub mod reader;

pub(crate) const VCF_META_PREFIX: &str = "##";
pub(crate) const VCF_HEADER_PREFIX: &str = "#";
pub(crate) const VCF_HEADER_FIRST_COLUMN: &str = "#CHROM";
pub(crate) const VCF_COLUMN_SEPARATOR: char = '\t';
/// CHROM, POS, ID, REF, ALT, QUAL, FILTER, INFO, FORMAT.
pub(crate) const VCF_FIXED_COLUMNS: usize = 9;
pub(crate) const VCF_ALT_COLUMN: usize = 4;
pub(crate) const VCF_FORMAT_COLUMN: usize = 8;

/// Error occurring while reading or decoding a VCF file.
#[derive(Debug)]
pub enum VcfError {
    /// I/O error occurred when reading the VCF file.
    IoError(std::io::Error),
    /// The input ended before the `#CHROM` sample header line.
    MissingHeader,
    /// The sample header line is malformed.
    InvalidHeader(usize),
    /// A data line has fewer than the mandatory nine columns.
    TooFewColumns { line: usize, columns: usize },
    /// The FORMAT column of a data line has no `GT` sub-field.
    MissingGenotypeField(usize),
}

impl From<std::io::Error> for VcfError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl Display for VcfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VcfError::IoError(e) => write!(f, "IO error: {}", e),
            VcfError::MissingHeader => write!(f, "Missing #CHROM header line"),
            VcfError::InvalidHeader(line) => write!(f, "Invalid header line (line {})", line),
            VcfError::TooFewColumns { line, columns } => write!(
                f,
                "Too few columns (line {}: {} columns, at least {} required)",
                line, columns, VCF_FIXED_COLUMNS
            ),
            VcfError::MissingGenotypeField(line) => {
                write!(f, "No GT field in FORMAT column (line {})", line)
            }
        }
    }
}

impl Error for VcfError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            VcfError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// The result of a VCF reading operation.
pub type VcfResult<T> = Result<T, VcfError>;
