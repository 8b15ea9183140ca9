use std::io;
use std::path::PathBuf;

/// Errors produced while reading containers and writing recovered files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of data reading {what} at offset {offset} ({needed} bytes needed)")]
    Truncated {
        what: &'static str,
        offset: u64,
        needed: usize,
    },

    #[error("bad {what} signature")]
    BadSignature { what: &'static str },

    #[error("every inflate strategy failed ({compressed} compressed bytes, {expected} expected)")]
    Decompression { compressed: usize, expected: u32 },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("output path '{0}' is empty after sanitizing")]
    EmptyPath(String),

    #[error("invalid file name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
