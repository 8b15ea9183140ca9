//! Second pass: move hash-named outputs to their logical paths.
//!
//! Bundles store payloads under names ending in `._<hex hash>`; the
//! logical path for each hash lives in TOC listings that may come from
//! any input in the batch. The map is therefore built from every listing
//! in the output tree before a single file is moved.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::listing::{is_listing_name, read_listing};
use crate::output::create_dir_all;
use crate::sanitize::sanitize;

/// `._` followed by a hex hash at the end of a file name
pub const HASH_SUFFIX_PATTERN: &str = r"\._([0-9A-Fa-f]{6,64})$";

/// Counts from one relocation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    /// Listing files found
    pub listings: usize,
    /// Listing files that could not be read
    pub listing_errors: usize,
    /// Lines skipped across all listings
    pub malformed_lines: usize,
    /// Distinct hashes in the map
    pub mapped: usize,
    /// Files moved to a mapped path
    pub moved: usize,
    /// Files whose hash was unknown; suffix removed in place
    pub stripped: usize,
    /// Moves or renames that failed
    pub failed: usize,
}

/// Hash to logical path, rebuilt for every pass
#[derive(Debug, Clone, Default)]
pub struct RelocationMap {
    paths: HashMap<String, String>,
}

impl RelocationMap {
    pub fn insert(&mut self, hash: &str, path: &str) {
        self.paths.insert(hash.to_ascii_lowercase(), path.to_string());
    }

    pub fn get(&self, hash: &str) -> Option<&str> {
        self.paths
            .get(&hash.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// A hash-suffixed output file
#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    hash: String,
    /// File name with the suffix removed
    bare_name: String,
}

/// Run the relocation pass over `output_root`.
///
/// Parse failures of individual listings and failed moves are logged and
/// counted; only an unusable output root is an error.
pub fn relocate(output_root: &Path) -> Result<RelocationReport> {
    let suffix = Regex::new(HASH_SUFFIX_PATTERN)?;
    let mut report = RelocationReport::default();

    let (map, listings) = build_map(output_root, &mut report)?;
    report.mapped = map.len();
    info!(
        entries = report.mapped,
        listings = report.listings,
        "relocation map built"
    );

    for candidate in find_candidates(output_root, &listings, &suffix)? {
        let result = match map.get(&candidate.hash).map(sanitize) {
            Some(rel) if !rel.is_empty() => {
                let target = output_root.join(&rel);
                move_file(&candidate.path, &target).map(|()| {
                    debug!(from = %candidate.path.display(), to = %rel, "relocated");
                    report.moved += 1;
                })
            }
            _ => {
                let target = candidate.path.with_file_name(&candidate.bare_name);
                move_file(&candidate.path, &target).map(|()| {
                    warn!(hash = %candidate.hash, file = %candidate.path.display(), "no listing entry, suffix stripped");
                    report.stripped += 1;
                })
            }
        };
        if let Err(e) = result {
            error!(file = %candidate.path.display(), "relocation failed: {e}");
            report.failed += 1;
        }
    }

    info!(
        moved = report.moved,
        stripped = report.stripped,
        failed = report.failed,
        "relocation done"
    );
    Ok(report)
}

/// Parse every listing below `root` into one map.
fn build_map(
    root: &Path,
    report: &mut RelocationReport,
) -> Result<(RelocationMap, HashSet<PathBuf>)> {
    let mut map = RelocationMap::default();
    let mut listings = HashSet::new();

    for path in walk_files(root)? {
        let is_listing = path
            .file_name()
            .is_some_and(|name| is_listing_name(&name.to_string_lossy()));
        if !is_listing {
            continue;
        }

        report.listings += 1;
        match read_listing(&path) {
            Ok(listing) => {
                report.malformed_lines += listing.malformed.len();
                for row in listing.rows.iter().filter(|r| r.is_file && !r.hash.is_empty()) {
                    map.insert(&row.hash, &row.path);
                }
            }
            Err(e) => {
                error!(listing = %path.display(), "{e}");
                report.listing_errors += 1;
            }
        }
        listings.insert(path);
    }
    Ok((map, listings))
}

fn find_candidates(
    root: &Path,
    listings: &HashSet<PathBuf>,
    suffix: &Regex,
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    for path in walk_files(root)? {
        if listings.contains(&path) {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some(found) = suffix.captures(&name) else {
            continue;
        };
        let (Some(whole), Some(hash)) = (found.get(0), found.get(1)) else {
            continue;
        };
        let bare_name = name[..whole.start()].to_string();
        if bare_name.is_empty() {
            continue;
        }
        candidates.push(Candidate {
            hash: hash.as_str().to_string(),
            bare_name,
            path,
        });
    }
    Ok(candidates)
}

/// All regular files below `root`, collected up front so moves cannot
/// disturb the walk.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::Read {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "output root is not a directory"),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => warn!("skipping unreadable output entry: {e}"),
        }
    }
    Ok(files)
}

/// Move `from` to `to`, replacing an existing file and creating parents.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    if to.is_dir() {
        return Err(Error::Write {
            path: to.to_path_buf(),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "a directory is in the way"),
        });
    }
    if let Some(parent) = to.parent() {
        create_dir_all(parent)?;
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Platforms whose rename refuses to replace an existing file.
        Err(_) if to.is_file() => {
            fs::remove_file(to)?;
            fs::rename(from, to).map_err(|source| Error::Write {
                path: to.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(Error::Write {
            path: to.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_pattern() {
        let re = Regex::new(HASH_SUFFIX_PATTERN).unwrap();
        let caps = re.captures("bar.tex._ABC123").unwrap();
        assert_eq!(&caps[1], "ABC123");
        assert!(re.captures("bar.tex").is_none());
        assert!(re.captures("bar._abc").is_none());
        assert!(re.captures("bar._abc123.tex").is_none());
        assert!(re.captures("bar._xyz123").is_none());
    }

    #[test]
    fn map_lookup_ignores_case() {
        let mut map = RelocationMap::default();
        map.insert("ABC123", "foo/bar.tex");
        assert_eq!(map.get("abc123"), Some("foo/bar.tex"));
        assert_eq!(map.len(), 1);
        assert!(map.get("abc124").is_none());
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(relocate(&dir.path().join("nope")).is_err());
    }
}
