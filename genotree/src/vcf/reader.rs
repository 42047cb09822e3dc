use log::warn;

use crate::input::LineSource;
use crate::progress::ByteNum;
use crate::vcf::{
    VcfError, VcfResult, VCF_COLUMN_SEPARATOR, VCF_FIXED_COLUMNS, VCF_HEADER_FIRST_COLUMN,
    VCF_HEADER_PREFIX, VCF_META_PREFIX,
};

const LINE_DELIMITER: u8 = b'\n';

/// Meta-information lines and sample names of a VCF file.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct VcfHeader {
    meta: Vec<String>,
    samples: Vec<String>,
}

impl VcfHeader {
    #[must_use]
    pub fn new<T: Into<Vec<String>>, U: Into<Vec<String>>>(meta: T, samples: U) -> Self {
        Self {
            meta: meta.into(),
            samples: samples.into(),
        }
    }

    /// `##` lines, verbatim.
    #[must_use]
    pub fn meta(&self) -> &[String] {
        &self.meta
    }

    /// Names from the tenth column of the `#CHROM` line onwards.
    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    #[must_use]
    pub fn sample_num(&self) -> usize {
        self.samples.len()
    }
}

/// One VCF data line.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VcfRecord {
    line_number: usize,
    line: String,
}

impl VcfRecord {
    #[must_use]
    pub fn new<T: Into<String>>(line_number: usize, line: T) -> Self {
        Self {
            line_number,
            line: line.into(),
        }
    }

    /// One-based line number in the (concatenated) input.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    #[must_use]
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.line.split(VCF_COLUMN_SEPARATOR)
    }
}

/// Splits a VCF line stream into the header and data records.
#[derive(Debug)]
pub struct VcfReader<R> {
    reader: R,
    buffer: Vec<u8>,
    line_number: usize,
    bytes_read: usize,
    skipped_lines: usize,
}

impl<R: LineSource> VcfReader<R> {
    /// Creates new `VcfReader` instance.
    ///
    /// # Examples
    /// ```
    /// use genotree::vcf::reader::VcfReader;
    ///
    /// let data = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\n";
    /// let mut reader = VcfReader::new(data.as_bytes());
    /// let header = reader.read_header().unwrap();
    /// assert_eq!(header.samples(), ["S1"]);
    /// ```
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(4096),
            line_number: 0,
            bytes_read: 0,
            skipped_lines: 0,
        }
    }

    /// Total number of bytes consumed so far.
    #[must_use]
    pub fn bytes_read(&self) -> ByteNum {
        ByteNum::new(self.bytes_read)
    }

    /// Number of lines dropped because they were out of place.
    #[must_use]
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Reads lines up to and including the `#CHROM` line.
    pub fn read_header(&mut self) -> VcfResult<VcfHeader> {
        let mut meta = Vec::new();

        loop {
            let line = match self.read_line()? {
                Some(line) => line,
                None => return Err(VcfError::MissingHeader),
            };

            if line.starts_with(VCF_META_PREFIX) {
                meta.push(line);
            } else if line.starts_with(VCF_HEADER_PREFIX) {
                let columns: Vec<&str> = line.split(VCF_COLUMN_SEPARATOR).collect();
                if columns[0] != VCF_HEADER_FIRST_COLUMN || columns.len() < VCF_FIXED_COLUMNS - 1 {
                    return Err(VcfError::InvalidHeader(self.line_number));
                }

                let samples = columns
                    .iter()
                    .skip(VCF_FIXED_COLUMNS)
                    .map(|&name| name.to_owned())
                    .collect::<Vec<_>>();
                return Ok(VcfHeader::new(meta, samples));
            } else {
                warn!(
                    "Skipping data line {} found before the #CHROM header",
                    self.line_number
                );
                self.skipped_lines += 1;
            }
        }
    }

    /// Reads the next data line, or `None` at the end of the input.
    pub fn read_record(&mut self) -> VcfResult<Option<VcfRecord>> {
        while let Some(line) = self.read_line()? {
            if line.starts_with(VCF_HEADER_PREFIX) {
                warn!(
                    "Skipping header line {} found among data lines",
                    self.line_number
                );
                self.skipped_lines += 1;
                continue;
            }

            return Ok(Some(VcfRecord::new(self.line_number, line)));
        }

        Ok(None)
    }

    /// Next non-blank line without its line terminator.
    fn read_line(&mut self) -> VcfResult<Option<String>> {
        loop {
            self.buffer.clear();
            let bytes_read = self
                .reader
                .read_until_delimiter(LINE_DELIMITER, &mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.bytes_read += bytes_read;
            self.line_number += 1;

            let mut line = self.buffer.as_slice();
            while let Some((&last, rest)) = line.split_last() {
                if last == b'\n' || last == b'\r' {
                    line = rest;
                } else {
                    break;
                }
            }

            if !line.is_empty() {
                return Ok(Some(String::from_utf8_lossy(line).into_owned()));
            }
        }
    }
}

impl<R: LineSource> Iterator for VcfReader<R> {
    type Item = VcfResult<VcfRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
