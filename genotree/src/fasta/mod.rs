use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::progress::ByteNum;

pub mod reader;

pub(crate) const FASTA_TITLE_PREFIX: u8 = b'>';
pub(crate) const FASTQ_TITLE_PREFIX: u8 = b'@';
pub(crate) const FASTQ_QUALITY_SCORE_SEPARATOR: u8 = b'+';

/// Error occurring during parsing a FASTA or FASTQ file.
#[derive(Debug)]
pub enum FastaError {
    /// I/O error occurred when reading the file.
    IoError(std::io::Error),
    /// End-Of-File reached in the middle of the quality scores of a record.
    TruncatedQualityScores(String),
    /// The quality scores are longer than the sequence.
    AcidAndQualityScoreLengthMismatch(String),
}

impl From<std::io::Error> for FastaError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl Display for FastaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FastaError::IoError(e) => write!(f, "IO error: {}", e),
            FastaError::TruncatedQualityScores(identifier) => {
                write!(f, "Truncated quality scores of `{}`", identifier)
            }
            FastaError::AcidAndQualityScoreLengthMismatch(identifier) => {
                write!(
                    f,
                    "Acid and quality score length mismatch in `{}`",
                    identifier
                )
            }
        }
    }
}

impl Error for FastaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FastaError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// The result of a FASTA/FASTQ reading operation.
pub type FastaResult<T> = Result<T, FastaError>;

/// One sequence: its header, bases and, for FASTQ input, quality scores.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SequenceRecord {
    ordinal: usize,
    identifier: String,
    bases: Vec<u8>,
    quality_scores: Option<Vec<u8>>,
    size: ByteNum,
}

impl SequenceRecord {
    /// Creates a new instance of `SequenceRecord`.
    ///
    /// # Examples
    /// ```
    /// use genotree::fasta::SequenceRecord;
    ///
    /// let seq = SequenceRecord::new(0, "chr1 assembled", b"ACGT".to_vec(), None);
    /// assert_eq!(seq.name(), "chr1");
    /// assert_eq!(seq.len(), 4);
    /// ```
    #[must_use]
    pub fn new<T: Into<String>>(
        ordinal: usize,
        identifier: T,
        bases: Vec<u8>,
        quality_scores: Option<Vec<u8>>,
    ) -> Self {
        let identifier = identifier.into();
        let size = ByteNum::new(
            identifier.len() + bases.len() + quality_scores.as_ref().map_or(0, Vec::len),
        );

        Self::with_size(ordinal, identifier, bases, quality_scores, size)
    }

    #[must_use]
    pub fn with_size<T: Into<String>>(
        ordinal: usize,
        identifier: T,
        bases: Vec<u8>,
        quality_scores: Option<Vec<u8>>,
        size: ByteNum,
    ) -> Self {
        Self {
            ordinal,
            identifier: identifier.into(),
            bases,
            quality_scores,
            size,
        }
    }

    /// Zero-based position of this sequence in the input.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The whole header line, without the leading `>`/`@`.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The first word of the identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        self.identifier
            .split_whitespace()
            .next()
            .unwrap_or(&self.identifier)
    }

    #[must_use]
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    #[must_use]
    pub fn quality_scores(&self) -> Option<&[u8]> {
        self.quality_scores.as_deref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Number of input bytes this record was decoded from.
    #[must_use]
    pub fn size(&self) -> ByteNum {
        self.size
    }
}
