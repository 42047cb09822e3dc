use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::io::{BufRead, Write};

use log::warn;

use crate::distance::DistanceMatrix;

const MISSING_DISTANCE: f64 = 1.0;
const COMMA: char = ',';
const LABEL_REPLACEMENT: char = '_';

/// Error occurring when reading a distance matrix file.
#[derive(Debug)]
pub enum MatrixError {
    /// I/O error occurred when reading the file.
    IoError(std::io::Error),
    /// The file has no size line.
    MissingSize,
    /// The size line does not start with a number.
    InvalidSize(String),
    /// The file ends before all rows were read.
    MissingRows { expected: usize, found: usize },
}

impl From<std::io::Error> for MatrixError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl Display for MatrixError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixError::IoError(e) => write!(f, "IO error: {}", e),
            MatrixError::MissingSize => write!(f, "Missing matrix size line"),
            MatrixError::InvalidSize(line) => write!(f, "Invalid matrix size line: `{}`", line),
            MatrixError::MissingRows { expected, found } => {
                write!(f, "Expected {} matrix rows, found {}", expected, found)
            }
        }
    }
}

impl Error for MatrixError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MatrixError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// The result of a distance matrix file operation.
pub type MatrixResult<T> = Result<T, MatrixError>;

/// Reads a distance matrix file.
///
/// The first line holds the number of rows N, optionally followed by another
/// number which is ignored. Each of the next N lines holds a label and N
/// distances. Every line is split on commas if it has any, or on whitespace
/// otherwise. Distances that are missing or not numbers are read as 1.
/// Blank lines are skipped. Nothing is allocated from N before the N rows
/// have been read.
///
/// # Examples
/// ```
/// use genotree::matrix_file::read_matrix;
///
/// let data = "2\nA\t0\t0.5\nB\t0.5\t0\n";
/// let matrix = read_matrix(data.as_bytes()).unwrap();
/// assert_eq!(matrix.labels(), ["A", "B"]);
/// assert_eq!(matrix.get(1, 0), 0.5);
/// ```
pub fn read_matrix<R: BufRead>(reader: R) -> MatrixResult<DistanceMatrix> {
    let mut lines = reader.lines().filter(|line| match line {
        Ok(line) => !line.trim().is_empty(),
        Err(_) => true,
    });

    let size_line = lines.next().ok_or(MatrixError::MissingSize)??;
    let size: usize = split_fields(&size_line)
        .first()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| MatrixError::InvalidSize(size_line.clone()))?;

    let row_lines: Vec<String> = lines.take(size).collect::<Result<_, _>>()?;
    if row_lines.len() < size {
        return Err(MatrixError::MissingRows {
            expected: size,
            found: row_lines.len(),
        });
    }

    let mut labels = Vec::with_capacity(size);
    let mut rows = Vec::with_capacity(size);
    let mut defaulted = 0;
    for line in &row_lines {
        let fields = split_fields(line);

        labels.push(fields.first().copied().unwrap_or_default().to_owned());
        let row: Vec<f64> = (0..size)
            .map(|index| {
                match fields
                    .get(index + 1)
                    .and_then(|field| field.parse::<f64>().ok())
                {
                    Some(value) => value,
                    None => {
                        defaulted += 1;
                        MISSING_DISTANCE
                    }
                }
            })
            .collect();
        rows.push(row);
    }

    if defaulted > 0 {
        warn!(
            "{} missing or unreadable distances read as {}",
            defaulted, MISSING_DISTANCE
        );
    }

    Ok(DistanceMatrix::from_rows(labels, &rows))
}

fn split_fields(line: &str) -> Vec<&str> {
    if line.contains(COMMA) {
        line.split(COMMA).map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    }
}

/// Writes a distance matrix in the format [`read_matrix`] reads: the size
/// line, then one tab-separated row per label.
///
/// Whitespace and commas in labels are replaced with `_`.
pub fn write_matrix<W: Write>(matrix: &DistanceMatrix, mut writer: W) -> io::Result<()> {
    writeln!(writer, "{}", matrix.len())?;

    for (label, row) in matrix.labels().iter().zip(matrix.rows()) {
        write!(writer, "{}", sanitize_label(label))?;
        for value in row {
            write!(writer, "\t{}", value)?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

#[must_use]
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|ch| {
            if ch.is_whitespace() || ch == COMMA {
                LABEL_REPLACEMENT
            } else {
                ch
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::io::ErrorKind::NotFound;

    use crate::distance::DistanceMatrix;
    use crate::matrix_file::{read_matrix, write_matrix, MatrixError};

    #[test]
    fn test_read_whitespace_separated() {
        let data = "3 100\n\
                    S1 0 0.25 1\n\
                    \n\
                    S2   0.25\t0 0.5\n\
                    S3 1 0.5 0\n";
        let matrix = read_matrix(data.as_bytes()).unwrap();

        assert_eq!(matrix.labels(), ["S1", "S2", "S3"]);
        assert_eq!(matrix.row(1), [0.25, 0.0, 0.5]);
        assert!(matrix.is_symmetric());
    }

    #[test]
    fn test_read_comma_separated() {
        let data = "2\nfirst sample, 0, 0.75\nsecond sample ,0.75,0\n";
        let matrix = read_matrix(data.as_bytes()).unwrap();

        assert_eq!(matrix.labels(), ["first sample", "second sample"]);
        assert_eq!(matrix.get(0, 1), 0.75);
    }

    #[test]
    fn test_read_comma_separated_size_line() {
        let data = "2,0\nA,0,0.5\nB,0.5,0\n";
        let matrix = read_matrix(data.as_bytes()).unwrap();

        assert_eq!(matrix.labels(), ["A", "B"]);
        assert_eq!(matrix.row(0), [0.0, 0.5]);
        assert!(matrix.is_symmetric());
    }

    #[test]
    fn test_huge_size_line_is_missing_rows() {
        let data = "100000000000000000\nA 0\n";

        assert!(matches!(
            read_matrix(data.as_bytes()).unwrap_err(),
            MatrixError::MissingRows {
                expected: 100_000_000_000_000_000,
                found: 1
            }
        ));
    }

    #[test_log::test]
    fn test_unreadable_values_default_to_one() {
        let data = "3\nA 0 x 0.5\nB 0.1\nC 0.5 NaN-ish 0\n";
        let matrix = read_matrix(data.as_bytes()).unwrap();

        assert_eq!(matrix.row(0), [0.0, 1.0, 0.5]);
        assert_eq!(matrix.row(1), [0.1, 1.0, 1.0]);
        assert_eq!(matrix.row(2), [0.5, 1.0, 0.0]);
    }

    #[test]
    fn test_read_errors() {
        assert!(matches!(
            read_matrix("".as_bytes()).unwrap_err(),
            MatrixError::MissingSize
        ));
        assert!(matches!(
            read_matrix("size\nA 0\n".as_bytes()).unwrap_err(),
            MatrixError::InvalidSize(_)
        ));
        assert!(matches!(
            read_matrix("3\nA 0 1 1\nB 1 0 1\n".as_bytes()).unwrap_err(),
            MatrixError::MissingRows {
                expected: 3,
                found: 2
            }
        ));
    }

    #[test]
    fn test_write_then_read() {
        let matrix = DistanceMatrix::from_rows(
            vec!["sample one".to_owned(), "b,c".to_owned()],
            &[vec![0.0, 0.125], vec![0.125, 0.0]],
        );
        let mut output = Vec::new();
        write_matrix(&matrix, &mut output).unwrap();
        let text = String::from_utf8(output).unwrap();

        assert_eq!(text, "2\nsample_one\t0\t0.125\nb_c\t0.125\t0\n");
        let read = read_matrix(text.as_bytes()).unwrap();
        assert_eq!(read.labels(), ["sample_one", "b_c"]);
        assert_eq!(read.row(0), matrix.row(0));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", MatrixError::from(std::io::Error::from(NotFound))),
            "IO error: entity not found"
        );
        assert_eq!(
            format!(
                "{}",
                MatrixError::MissingRows {
                    expected: 4,
                    found: 1
                }
            ),
            "Expected 4 matrix rows, found 1"
        );
        assert!(MatrixError::MissingSize.source().is_none());
    }
}
