use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use log::debug;

/// Path token meaning "read from the standard input".
pub const STDIN_PATH: &str = "-";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BUFFER_CAPACITY: usize = 1024 * 1024;

/// Error occurring when opening the inputs of a run.
#[derive(Debug)]
pub enum InputError {
    /// I/O error occurred when reading an already opened input.
    IoError(std::io::Error),
    /// Input file could not be opened.
    OpenFailed(PathBuf, std::io::Error),
    /// No input was given.
    NoInputs,
}

impl From<std::io::Error> for InputError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl Display for InputError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::IoError(e) => write!(f, "IO error: {}", e),
            InputError::OpenFailed(path, e) => {
                write!(f, "Could not open `{}`: {}", path.display(), e)
            }
            InputError::NoInputs => write!(f, "No inputs given"),
        }
    }
}

impl Error for InputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InputError::IoError(e) => Some(e),
            InputError::OpenFailed(_, e) => Some(e),
            InputError::NoInputs => None,
        }
    }
}

/// The result of opening inputs.
pub type InputResult<T> = Result<T, InputError>;

/// Line-oriented byte source the record decoders read from.
pub trait LineSource {
    /// Appends bytes up to and including `delimiter` to `buffer`.
    ///
    /// Returns the number of bytes appended; zero means the source is
    /// exhausted.
    fn read_until_delimiter(&mut self, delimiter: u8, buffer: &mut Vec<u8>) -> io::Result<usize>;
}

impl LineSource for &[u8] {
    fn read_until_delimiter(&mut self, delimiter: u8, buffer: &mut Vec<u8>) -> io::Result<usize> {
        self.read_until(delimiter, buffer)
    }
}

impl<R: Read> LineSource for BufReader<R> {
    fn read_until_delimiter(&mut self, delimiter: u8, buffer: &mut Vec<u8>) -> io::Result<usize> {
        self.read_until(delimiter, buffer)
    }
}

struct PendingInput {
    name: String,
    reader: Box<dyn Read + Send>,
}

/// Several inputs read one after another as a single line stream.
///
/// Every file is opened when the chain is created, so a missing file is
/// reported before any record is decoded. Gzip compression is detected per
/// input from its first two bytes. A line never spans two inputs, even if
/// an input does not end with a newline.
pub struct InputChain {
    pending: VecDeque<PendingInput>,
    current: Option<Box<dyn BufRead + Send>>,
}

impl InputChain {
    /// Opens the given paths in order; [`STDIN_PATH`] stands for the standard
    /// input.
    pub fn open<P: AsRef<Path>>(paths: &[P]) -> InputResult<Self> {
        if paths.is_empty() {
            return Err(InputError::NoInputs);
        }

        let mut inputs = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let name = path.display().to_string();
            let reader: Box<dyn Read + Send> = if name == STDIN_PATH {
                Box::new(io::stdin())
            } else {
                let file =
                    File::open(path).map_err(|e| InputError::OpenFailed(path.to_owned(), e))?;
                Box::new(file)
            };
            inputs.push((name, reader));
        }

        Self::from_readers(inputs)
    }

    /// Creates a chain from already opened readers, each paired with a name
    /// used in log messages.
    pub fn from_readers<I>(readers: I) -> InputResult<Self>
    where
        I: IntoIterator<Item = (String, Box<dyn Read + Send>)>,
    {
        let pending: VecDeque<PendingInput> = readers
            .into_iter()
            .map(|(name, reader)| PendingInput { name, reader })
            .collect();
        if pending.is_empty() {
            return Err(InputError::NoInputs);
        }

        Ok(Self {
            pending,
            current: None,
        })
    }

    /// Creates a chain over a single in-memory buffer.
    pub fn from_bytes<T: Into<Vec<u8>>>(data: T) -> Self {
        let reader: Box<dyn Read + Send> = Box::new(io::Cursor::new(data.into()));
        Self {
            pending: VecDeque::from(vec![PendingInput {
                name: String::from("<memory>"),
                reader,
            }]),
            current: None,
        }
    }

    fn activate(input: PendingInput) -> io::Result<Box<dyn BufRead + Send>> {
        let mut buffered = BufReader::with_capacity(BUFFER_CAPACITY, input.reader);
        let is_gzipped = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);

        if is_gzipped {
            debug!("Reading `{}` as gzip-compressed input", input.name);
            let decoder = MultiGzDecoder::new(buffered);
            Ok(Box::new(BufReader::with_capacity(BUFFER_CAPACITY, decoder)))
        } else {
            debug!("Reading `{}` as plain text input", input.name);
            Ok(Box::new(buffered))
        }
    }
}

impl Debug for InputChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputChain")
            .field(
                "pending",
                &self.pending.iter().map(|x| &x.name).collect::<Vec<_>>(),
            )
            .field("active", &self.current.is_some())
            .finish()
    }
}

impl LineSource for InputChain {
    fn read_until_delimiter(&mut self, delimiter: u8, buffer: &mut Vec<u8>) -> io::Result<usize> {
        loop {
            if let Some(current) = self.current.as_mut() {
                let bytes_read = current.read_until(delimiter, buffer)?;
                if bytes_read > 0 {
                    return Ok(bytes_read);
                }
                self.current = None;
            }

            match self.pending.pop_front() {
                Some(input) => self.current = Some(Self::activate(input)?),
                None => return Ok(0),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::io::ErrorKind::NotFound;
    use std::io::{Read, Write};

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use crate::input::{InputChain, InputError, LineSource};

    fn read_lines<T: LineSource>(source: &mut T) -> Vec<String> {
        let mut lines = Vec::new();
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            if source.read_until_delimiter(b'\n', &mut buffer).unwrap() == 0 {
                return lines;
            }
            lines.push(String::from_utf8_lossy(&buffer).trim_end().to_owned());
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn boxed(data: Vec<u8>) -> Box<dyn Read + Send> {
        Box::new(std::io::Cursor::new(data))
    }

    #[test]
    fn test_chain_concatenates_inputs() {
        let mut chain = InputChain::from_readers(vec![
            (String::from("a"), boxed(b"first\nsecond".to_vec())),
            (String::from("b"), boxed(b"third\n".to_vec())),
        ])
        .unwrap();

        assert_eq!(read_lines(&mut chain), ["first", "second", "third"]);
    }

    #[test]
    fn test_chain_detects_gzip_per_input() {
        let mut chain = InputChain::from_readers(vec![
            (String::from("plain"), boxed(b"plain line\n".to_vec())),
            (String::from("gz"), boxed(gzip(b"packed 1\npacked 2\n"))),
        ])
        .unwrap();

        assert_eq!(read_lines(&mut chain), ["plain line", "packed 1", "packed 2"]);
    }

    #[test]
    fn test_chain_skips_empty_inputs() {
        let mut chain = InputChain::from_readers(vec![
            (String::from("empty"), boxed(Vec::new())),
            (String::from("data"), boxed(b"x\n".to_vec())),
            (String::from("empty 2"), boxed(Vec::new())),
        ])
        .unwrap();

        assert_eq!(read_lines(&mut chain), ["x"]);
    }

    #[test]
    fn test_open_missing_file() {
        let error = InputChain::open(&["/nonexistent/genotree/input.vcf"]).unwrap_err();

        assert!(matches!(error, InputError::OpenFailed(_, _)));
        assert!(error.source().is_some());
    }

    #[test]
    fn test_open_no_paths() {
        let paths: [&str; 0] = [];

        assert!(matches!(
            InputChain::open(&paths).unwrap_err(),
            InputError::NoInputs
        ));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", InputError::from(std::io::Error::from(NotFound))),
            "IO error: entity not found"
        );
        assert_eq!(format!("{}", InputError::NoInputs), "No inputs given");
    }
}
