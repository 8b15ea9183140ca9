//! TOC listings: text files mapping logical paths to content hashes.
//!
//! Two line formats exist:
//!
//! - renderings written by this tool, `index\tname\tsize\thash`
//! - game-side listings, `path|type|hash`, where type `f` marks a file
//!
//! Blank lines are ignored in both.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::warn;

use crate::error::{Error, Result};
use crate::output::TOC_RENDER_SUFFIX;

/// Name fragment of game-side pipe listings
pub const PIPE_LISTING_MARKER: &str = "__toc";

/// One path/hash pair from a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub path: String,
    pub hash: String,
    /// `false` for pipe rows whose type is not `f`
    pub is_file: bool,
}

/// Whether a file name follows one of the listing naming conventions.
pub fn is_listing_name(file_name: &str) -> bool {
    file_name.ends_with(TOC_RENDER_SUFFIX) || file_name.contains(PIPE_LISTING_MARKER)
}

/// A parsed listing file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub rows: Vec<ListingRow>,
    /// 1-based numbers of lines that fit neither format
    pub malformed: Vec<usize>,
}

/// Parse listing text. `path` is only used for logging.
///
/// Lines that fit neither format are skipped and recorded; the rest of
/// the listing is kept.
pub fn parse_listing(text: &str, path: &Path) -> Listing {
    let mut listing = Listing::default();

    for (number, line) in text.lines().enumerate() {
        // Separators carry meaning: a trailing tab is an empty hash.
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Some(row) => listing.rows.push(row),
            None => {
                warn!(listing = %path.display(), line = number + 1, "skipping malformed line");
                listing.malformed.push(number + 1);
            }
        }
    }
    listing
}

fn parse_line(line: &str) -> Option<ListingRow> {
    if line.contains('\t') {
        let fields: Vec<&str> = line.split('\t').collect();
        let [_, name, size, hash] = fields[..] else {
            return None;
        };
        size.trim().parse::<u32>().ok()?;
        return Some(ListingRow {
            path: name.to_string(),
            hash: hash.trim().to_string(),
            is_file: true,
        });
    }

    let fields: Vec<&str> = line.split('|').collect();
    let [name, kind, hash] = fields[..] else {
        return None;
    };
    Some(ListingRow {
        path: name.trim().to_string(),
        hash: hash.trim().to_string(),
        is_file: kind.trim() == "f",
    })
}

/// Read and parse a listing file.
pub fn read_listing(path: &Path) -> Result<Listing> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_listing(&text, path))
}

/// Differences between two listings, sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDiff {
    /// (path, new hash)
    pub added: Vec<(String, String)>,
    /// (path, old hash)
    pub removed: Vec<(String, String)>,
    /// (path, old hash, new hash)
    pub changed: Vec<(String, String, String)>,
}

impl ListingDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compare two listings by path.
pub fn diff_listings(old: &[ListingRow], new: &[ListingRow]) -> ListingDiff {
    let old_map: BTreeMap<&str, &str> = old
        .iter()
        .map(|r| (r.path.as_str(), r.hash.as_str()))
        .collect();
    let new_map: BTreeMap<&str, &str> = new
        .iter()
        .map(|r| (r.path.as_str(), r.hash.as_str()))
        .collect();

    let mut diff = ListingDiff::default();
    for (&path, &new_hash) in &new_map {
        match old_map.get(path) {
            None => diff.added.push((path.to_string(), new_hash.to_string())),
            Some(&old_hash) if old_hash != new_hash => diff.changed.push((
                path.to_string(),
                old_hash.to_string(),
                new_hash.to_string(),
            )),
            Some(_) => {}
        }
    }
    for (&path, &old_hash) in &old_map {
        if !new_map.contains_key(path) {
            diff.removed.push((path.to_string(), old_hash.to_string()));
        }
    }
    diff
}

impl fmt::Display for ListingDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ADDED ({}):", self.added.len())?;
        for (path, hash) in &self.added {
            writeln!(f, "{path} | {hash}")?;
        }
        writeln!(f, "\nREMOVED ({}):", self.removed.len())?;
        for (path, hash) in &self.removed {
            writeln!(f, "{path} | {hash}")?;
        }
        writeln!(f, "\nCHANGED ({}):", self.changed.len())?;
        for (path, old, new) in &self.changed {
            writeln!(f, "{path} | {old} -> {new}")?;
        }
        Ok(())
    }
}
