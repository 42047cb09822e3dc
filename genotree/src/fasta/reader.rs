use log::warn;

use crate::fasta::{
    FastaError, FastaResult, SequenceRecord, FASTA_TITLE_PREFIX, FASTQ_QUALITY_SCORE_SEPARATOR,
    FASTQ_TITLE_PREFIX,
};
use crate::input::LineSource;
use crate::progress::ByteNum;

const LINE_DELIMITER: u8 = b'\n';

#[derive(Debug)]
struct PendingTitle {
    title: String,
    bytes: usize,
}

/// Reader of FASTA and FASTQ records, with any line wrapping.
///
/// A record is a `>` or `@` title line followed by sequence lines up to the
/// next title line. A `+` line starts the quality scores, which are read
/// until they are as long as the sequence, so quality lines starting with
/// `@` are not mistaken for titles.
#[derive(Debug)]
pub struct SequenceReader<R> {
    reader: R,
    buffer: Vec<u8>,
    pending_title: Option<PendingTitle>,
    bytes_read: usize,
    sequence_num: usize,
    skipped_lines: usize,
}

impl<R: LineSource> SequenceReader<R> {
    /// Creates new `SequenceReader` instance.
    ///
    /// # Examples
    /// ```
    /// use genotree::fasta::reader::SequenceReader;
    ///
    /// let data = ">seq_1\nACGT\nAC\n>seq_2\nGG\n";
    /// let mut reader = SequenceReader::new(data.as_bytes());
    /// let seq = reader.read_sequence().unwrap().unwrap();
    /// assert_eq!(seq.bases(), b"ACGTAC");
    /// ```
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(4096),
            pending_title: None,
            bytes_read: 0,
            sequence_num: 0,
            skipped_lines: 0,
        }
    }

    /// Total number of bytes consumed so far.
    #[must_use]
    pub fn bytes_read(&self) -> ByteNum {
        ByteNum::new(self.bytes_read)
    }

    /// Number of lines outside of any record that were dropped.
    #[must_use]
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Reads a single sequence, or returns `None` at the end of the input.
    pub fn read_sequence(&mut self) -> FastaResult<Option<SequenceRecord>> {
        let PendingTitle { title, bytes } = match self.pending_title.take() {
            Some(pending) => pending,
            None => match self.parse_title()? {
                Some(pending) => pending,
                None => return Ok(None),
            },
        };
        let mut size = bytes;

        let mut bases = Vec::new();
        let mut quality_scores = None;
        while let Some(bytes_read) = self.read_line()? {
            if self.is_title_line() {
                self.pending_title = Some(self.current_title(bytes_read));
                break;
            }

            size += bytes_read;
            if self.buffer[0] == FASTQ_QUALITY_SCORE_SEPARATOR {
                let scores = self.parse_quality_scores(&title, bases.len(), &mut size)?;
                quality_scores = Some(scores);
                break;
            }
            bases.extend_from_slice(&self.buffer);
        }

        let ordinal = self.sequence_num;
        self.sequence_num += 1;
        Ok(Some(SequenceRecord::with_size(
            ordinal,
            title,
            bases,
            quality_scores,
            ByteNum::new(size),
        )))
    }

    fn parse_title(&mut self) -> FastaResult<Option<PendingTitle>> {
        while let Some(bytes_read) = self.read_line()? {
            if self.is_title_line() {
                return Ok(Some(self.current_title(bytes_read)));
            }

            warn!(
                "Skipping line outside of any sequence: `{}`",
                String::from_utf8_lossy(&self.buffer)
            );
            self.skipped_lines += 1;
        }

        Ok(None)
    }

    fn parse_quality_scores(
        &mut self,
        title: &str,
        expected_len: usize,
        size: &mut usize,
    ) -> FastaResult<Vec<u8>> {
        let mut quality_scores = Vec::with_capacity(expected_len);

        while quality_scores.len() < expected_len {
            match self.read_line()? {
                Some(bytes_read) => {
                    *size += bytes_read;
                    quality_scores.extend_from_slice(&self.buffer);
                }
                None => return Err(FastaError::TruncatedQualityScores(title.to_owned())),
            }
        }

        if quality_scores.len() != expected_len {
            return Err(FastaError::AcidAndQualityScoreLengthMismatch(
                title.to_owned(),
            ));
        }

        Ok(quality_scores)
    }

    #[must_use]
    fn is_title_line(&self) -> bool {
        matches!(
            self.buffer.first(),
            Some(&FASTA_TITLE_PREFIX) | Some(&FASTQ_TITLE_PREFIX)
        )
    }

    #[must_use]
    fn current_title(&self, bytes: usize) -> PendingTitle {
        let title = String::from_utf8_lossy(&self.buffer[1..]).trim().to_owned();

        PendingTitle { title, bytes }
    }

    /// Reads the next non-blank line into the buffer, without its line
    /// terminator. Returns the number of bytes consumed, blank lines
    /// included.
    fn read_line(&mut self) -> FastaResult<Option<usize>> {
        let mut total = 0;

        loop {
            self.buffer.clear();
            let bytes_read = self
                .reader
                .read_until_delimiter(LINE_DELIMITER, &mut self.buffer)?;
            if bytes_read == 0 {
                self.bytes_read += total;
                return Ok(None);
            }
            total += bytes_read;

            while matches!(self.buffer.last(), Some(b'\n') | Some(b'\r')) {
                self.buffer.pop();
            }
            if !self.buffer.iter().all(u8::is_ascii_whitespace) {
                self.bytes_read += total;
                return Ok(Some(total));
            }
        }
    }
}

impl<R: LineSource> IntoIterator for SequenceReader<R> {
    type Item = FastaResult<SequenceRecord>;
    type IntoIter = SequenceReaderIterator<R>;

    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter { reader: self }
    }
}

/// Iterator implementation for [`SequenceReader`] which iterates over all
/// sequences in the input. A malformed record is returned as an error and
/// the iteration continues with the next one.
#[derive(Debug)]
pub struct SequenceReaderIterator<R> {
    reader: SequenceReader<R>,
}

impl<R: LineSource> Iterator for SequenceReaderIterator<R> {
    type Item = FastaResult<SequenceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_sequence().transpose()
    }
}
