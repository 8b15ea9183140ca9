use super::ReadAt;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Local input file held in memory for offset-based random access
pub struct LocalFile {
    path: PathBuf,
    data: Vec<u8>,
}

impl LocalFile {
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ReadAt for LocalFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        self.data.read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
