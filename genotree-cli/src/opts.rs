use std::fmt::Display;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use genotree::input::STDIN_PATH;
use log::info;

pub fn input_stream(path: &str) -> Result<InputStream, String> {
    let output_path = Path::new(path);
    let result = InputStream {
        path: output_path.to_path_buf(),
    };

    Ok(result)
}

#[derive(Debug, Clone)]
pub struct InputStream {
    path: PathBuf,
}

impl Display for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl Default for InputStream {
    fn default() -> Self {
        Self {
            path: PathBuf::from(STDIN_PATH),
        }
    }
}

impl InputStream {
    pub fn as_reader(&self) -> Result<InputReader, anyhow::Error> {
        InputReader::from_path(&self.path)
    }
}

#[derive(Debug)]
pub enum InputReader {
    Stdin(io::Stdin),
    File(File),
}

impl InputReader {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        let is_stdin = path.to_string_lossy() == STDIN_PATH;

        let val = if is_stdin {
            Self::Stdin(io::stdin())
        } else {
            let file = File::open(path)
                .with_context(|| format!("Could not open `{}`", path.display()))?;

            Self::File(file)
        };
        Ok(val)
    }

    #[must_use]
    pub fn into_read(self) -> Box<dyn Read + Send> {
        match self {
            InputReader::Stdin(stdin) => Box::new(stdin),
            InputReader::File(file) => Box::new(file),
        }
    }
}

/// Total size of the given inputs, if all of them are uncompressed files.
///
/// Progress is counted in decompressed bytes, so the size of a gzip file
/// would be too small to serve as the total.
pub fn plain_input_length(paths: &[PathBuf]) -> Option<u64> {
    let mut total = 0;

    for path in paths {
        let is_gzip = path
            .extension()
            .map_or(false, |extension| extension == "gz" || extension == "bgz");
        if is_gzip || path.to_string_lossy() == STDIN_PATH {
            return None;
        }
        total += path.metadata().ok()?.len();
    }

    Some(total)
}

#[derive(Debug)]
pub enum OutputWriter {
    Stdout(io::Stdout),
    File(File),
}

impl OutputWriter {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let is_stdout = path.to_string_lossy() == STDIN_PATH;

        let writer = if is_stdout {
            Self::Stdout(io::stdout())
        } else {
            info!("Output file: {}", path.display());
            let file = File::create(path)
                .with_context(|| format!("Could not create `{}`", path.display()))?;
            Self::File(file)
        };

        Ok(writer)
    }

    pub fn into_write(self) -> Box<dyn Write + Send> {
        match self {
            OutputWriter::Stdout(stdout) => Box::new(stdout),
            OutputWriter::File(file) => Box::new(BufWriter::new(file)),
        }
    }
}
