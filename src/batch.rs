//! Batch driver: dispatch every input, then relocate once.

use std::path::{Component, Path, PathBuf};

use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::io::LocalFile;
use crate::nz::{ContainerKind, EntryOutcome, Extracted, Extractor, recognize};
use crate::output::{ExtractOptions, OutputTree, UNPARSED_DIR, WriteOutcome};
use crate::relocate::{RelocationReport, relocate};

/// How one input file was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Extracted(ContainerKind),
    /// No format claimed the file; copied under the unparsed directory
    Unparsed,
    /// Could not be read or written at all
    Failed,
}

/// Totals for a whole run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub files: usize,
    pub singles: usize,
    pub tocs: usize,
    pub bundles: usize,
    pub unparsed: usize,
    pub failed: usize,
    pub entries_written: usize,
    pub entries_degraded: usize,
    pub entries_skipped: usize,
    pub entries_failed: usize,
    pub relocation: RelocationReport,
}

impl BatchReport {
    fn record(&mut self, extracted: &Extracted) {
        match extracted {
            Extracted::Single(outcome) => {
                self.singles += 1;
                if *outcome == EntryOutcome::Skipped {
                    self.entries_skipped += 1;
                } else {
                    self.entries_written += 1;
                    if outcome.is_degraded() {
                        self.entries_degraded += 1;
                    }
                }
            }
            Extracted::Toc { .. } => self.tocs += 1,
            Extracted::Bundle(summary) => {
                self.bundles += 1;
                self.entries_written += summary.written;
                self.entries_degraded += summary.degraded;
                self.entries_skipped += summary.skipped;
                self.entries_failed += summary.failed;
            }
        }
    }
}

/// One extraction run over a set of inputs.
///
/// Inputs are handled strictly one after another. [`Session::finish`]
/// consumes the session, so the relocation pass runs exactly once and only
/// after every input has been processed.
pub struct Session {
    input_root: PathBuf,
    output: OutputTree,
    report: BatchReport,
}

impl Session {
    pub fn new(input_root: impl Into<PathBuf>, options: &ExtractOptions) -> Self {
        Self {
            input_root: input_root.into(),
            output: OutputTree::new(options),
            report: BatchReport::default(),
        }
    }

    /// Process `paths`, or the whole input root when `paths` is empty,
    /// then relocate.
    pub fn run(mut self, paths: &[PathBuf]) -> BatchReport {
        if paths.is_empty() {
            self.process_all();
        } else {
            for path in paths {
                self.process_path(path);
            }
        }
        self.finish()
    }

    /// Process every file below the input root.
    pub fn process_all(&mut self) {
        let root = self.input_root.clone();
        let files = self.input_files(&root);
        if files.is_empty() {
            warn!(root = %root.display(), "no input files");
        }
        for (path, rel) in files {
            self.handle_file(&path, &rel);
        }
    }

    /// Process one file, or every file below a directory.
    pub fn process_path(&mut self, path: &Path) {
        if path.is_dir() {
            for (file, rel) in self.input_files(path) {
                self.handle_file(&file, &rel);
            }
            return;
        }

        let rel = path
            .strip_prefix(&self.input_root)
            .ok()
            .or_else(|| path.file_name().map(Path::new))
            .map(rel_string)
            .unwrap_or_default();
        self.handle_file(path, &rel);
    }

    /// Dispatch one input through the recognizers.
    ///
    /// Files no recognizer can extract are copied verbatim under the
    /// unparsed directory, never dropped.
    pub fn handle_file(&mut self, path: &Path, rel: &str) -> FileOutcome {
        self.report.files += 1;

        let file = match LocalFile::open(path) {
            Ok(file) => file,
            Err(e) => {
                error!(file = rel, "{e}");
                self.report.failed += 1;
                return FileOutcome::Failed;
            }
        };

        if let Some(kind) = recognize(file.bytes()) {
            match Extractor::new(&self.output).extract(&file, rel, kind) {
                Ok(extracted) => {
                    self.report.record(&extracted);
                    return FileOutcome::Extracted(kind);
                }
                Err(e) => warn!(file = rel, %kind, "{e}; archiving verbatim"),
            }
        }

        let unparsed_rel = format!("{UNPARSED_DIR}/{rel}");
        match self.output.write(&unparsed_rel, file.bytes()) {
            Ok(WriteOutcome::Written(_)) => {
                warn!(file = rel, bytes = file.bytes().len(), "unparsed, copied raw");
                self.report.unparsed += 1;
                FileOutcome::Unparsed
            }
            Ok(WriteOutcome::Skipped(_)) => {
                self.report.unparsed += 1;
                FileOutcome::Unparsed
            }
            Err(e) => {
                error!(file = rel, "copy failed: {e}");
                self.report.failed += 1;
                FileOutcome::Failed
            }
        }
    }

    /// Run the relocation pass and return the run's totals.
    pub fn finish(mut self) -> BatchReport {
        match relocate(self.output.root()) {
            Ok(relocation) => self.report.relocation = relocation,
            Err(e) => error!("relocation pass failed: {e}"),
        }
        info!(
            files = self.report.files,
            bundles = self.report.bundles,
            singles = self.report.singles,
            tocs = self.report.tocs,
            unparsed = self.report.unparsed,
            failed = self.report.failed,
            "run complete"
        );
        self.report
    }

    /// Files below `dir` paired with their `/`-separated relative paths.
    fn input_files(&self, dir: &Path) -> Vec<(PathBuf, String)> {
        let output_root = self.output.root();
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != output_root)
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("skipping unreadable input: {e}");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = rel_string(e.path().strip_prefix(dir).unwrap_or(e.path()));
                (e.into_path(), rel)
            })
            .collect()
    }
}

/// Join the normal components of `path` with `/`.
fn rel_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
