use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::sanitize::sanitize;

/// Subdirectory receiving inputs that no container format claimed
pub const UNPARSED_DIR: &str = "_unparsed";
/// Subdirectory receiving TOC descriptor renderings
pub const TOC_DIR: &str = "_toc";
/// File-name suffix identifying a TOC rendering
pub const TOC_RENDER_SUFFIX: &str = ".toc.txt";

/// Options for an extraction run
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub output_root: PathBuf,
    /// Replace outputs that already exist
    pub overwrite: bool,
}

impl ExtractOptions {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            overwrite: true,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// What happened to a single write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(PathBuf),
    /// Output existed and overwriting is disabled
    Skipped(PathBuf),
}

/// Output directory that every recovered file is written into
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: PathBuf,
    overwrite: bool,
}

impl OutputTree {
    pub fn new(options: &ExtractOptions) -> Self {
        Self {
            root: options.output_root.clone(),
            overwrite: options.overwrite,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an archive-relative path below the root.
    pub fn resolve(&self, rel_path: &str) -> Result<PathBuf> {
        let clean = sanitize(rel_path);
        if clean.is_empty() {
            return Err(Error::EmptyPath(rel_path.to_string()));
        }
        Ok(self.root.join(clean))
    }

    /// `true` when the output for `rel_path` exists and would be kept.
    pub fn would_skip(&self, rel_path: &str) -> bool {
        !self.overwrite && self.resolve(rel_path).is_ok_and(|p| p.exists())
    }

    /// Write `data` to the sanitized `rel_path`, creating parent directories.
    pub fn write(&self, rel_path: &str, data: &[u8]) -> Result<WriteOutcome> {
        let out_path = self.resolve(rel_path)?;

        if !self.overwrite && out_path.exists() {
            debug!(path = %out_path.display(), "output exists, skipping");
            return Ok(WriteOutcome::Skipped(out_path));
        }

        if let Some(parent) = out_path.parent() {
            create_dir_all(parent)?;
        }

        fs::write(&out_path, data).map_err(|source| Error::Write {
            path: out_path.clone(),
            source,
        })?;
        debug!(path = %out_path.display(), bytes = data.len(), "written");
        Ok(WriteOutcome::Written(out_path))
    }
}

/// `create_dir_all` that tolerates a concurrent creator.
pub(crate) fn create_dir_all(dir: &Path) -> Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(_) if dir.is_dir() => Ok(()),
        Err(source) => Err(Error::Write {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
