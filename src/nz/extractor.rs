use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::codec::{Framing, decompress};
use crate::error::{Error, Result};
use crate::io::{ByteReader, LocalFile, ReadAt};
use crate::output::{OutputTree, TOC_DIR, TOC_RENDER_SUFFIX, WriteOutcome};
use crate::sanitize::sanitize;

use super::parser::{
    parse_bundle_header, parse_entry_record, parse_name_table, parse_toc, read_compressed_header,
    recognize,
};
use super::structures::*;

/// Result of extracting one recognized container
#[derive(Debug, Clone)]
pub enum Extracted {
    Single(EntryOutcome),
    Toc { entries: usize },
    Bundle(BundleSummary),
}

/// What happened to one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Inflated to exactly the recorded size
    Inflated(Framing),
    /// Stored uncompressed and copied verbatim
    Copied,
    /// Inflated, but the output length does not match the recorded size
    Salvaged,
    /// Inflate failed; the compressed bytes were written instead
    RawDump,
    /// Output already existed
    Skipped,
}

impl EntryOutcome {
    pub fn is_degraded(self) -> bool {
        matches!(self, EntryOutcome::Salvaged | EntryOutcome::RawDump)
    }
}

/// Per-bundle tally
#[derive(Debug, Clone, Default)]
pub struct BundleSummary {
    /// Names read from the name table
    pub names: usize,
    pub written: usize,
    pub degraded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The entry table ended before every name had a record
    pub truncated: bool,
}

impl BundleSummary {
    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Skipped => self.skipped += 1,
            o if o.is_degraded() => {
                self.written += 1;
                self.degraded += 1;
            }
            _ => self.written += 1,
        }
    }
}

/// Writes the contents of recognized containers into an [`OutputTree`]
pub struct Extractor<'a> {
    output: &'a OutputTree,
}

impl<'a> Extractor<'a> {
    pub fn new(output: &'a OutputTree) -> Self {
        Self { output }
    }

    /// Extract a file already recognized as `kind`.
    ///
    /// `rel` is the input's path relative to the input root, with `/`
    /// separators. Single-blob and TOC extraction write nothing on failure.
    pub fn extract(&self, file: &LocalFile, rel: &str, kind: ContainerKind) -> Result<Extracted> {
        match kind {
            ContainerKind::SingleBlob => self.extract_single(file, rel).map(Extracted::Single),
            ContainerKind::TocDescriptor => self
                .extract_toc(file, rel)
                .map(|entries| Extracted::Toc { entries }),
            ContainerKind::Bundle(_) => self.extract_bundle(file).map(Extracted::Bundle),
        }
    }

    /// Inflate a file consisting of a single `__ZN` payload.
    pub fn extract_single(&self, file: &LocalFile, rel: &str) -> Result<EntryOutcome> {
        let mut reader = ByteReader::new(file);
        let header = read_compressed_header(&mut reader)?
            .ok_or(Error::BadSignature { what: "compressed payload" })?;
        let compressed = reader.read_up_to(reader.remaining());

        let out_rel = single_output_path(rel);
        if self.output.would_skip(&out_rel) {
            return Ok(EntryOutcome::Skipped);
        }

        let inflated = decompress(&compressed, header.xsize)?;
        if !inflated.verified {
            warn!(
                file = rel,
                expected = header.xsize,
                produced = inflated.data.len(),
                "size mismatch, keeping partial output"
            );
        }

        let outcome = match self.output.write(&out_rel, &inflated.data)? {
            WriteOutcome::Skipped(_) => EntryOutcome::Skipped,
            WriteOutcome::Written(_) if inflated.verified => EntryOutcome::Inflated(inflated.framing),
            WriteOutcome::Written(_) => EntryOutcome::Salvaged,
        };
        info!(file = rel, out = %out_rel, bytes = inflated.data.len(), "single payload");
        Ok(outcome)
    }

    /// Render a TOC descriptor to text under the TOC directory.
    ///
    /// Returns the number of entries rendered.
    pub fn extract_toc(&self, file: &LocalFile, rel: &str) -> Result<usize> {
        let toc = parse_toc(file)?;
        let out_rel = toc_rendering_path(rel);
        self.output.write(&out_rel, toc.render().as_bytes())?;
        info!(file = rel, out = %out_rel, entries = toc.entries.len(), "toc descriptor");
        Ok(toc.entries.len())
    }

    /// Walk a bundle and write every entry it describes.
    ///
    /// Only an unreadable bundle header is an error. Problems with single
    /// entries are logged and counted, and a record table cut short ends
    /// the walk while keeping everything already written.
    pub fn extract_bundle(&self, file: &LocalFile) -> Result<BundleSummary> {
        let mut reader = ByteReader::new(file);
        let (encoding, header) = parse_bundle_header(&mut reader)?;
        let names = parse_name_table(&mut reader, header.entry_count, encoding);

        let mut summary = BundleSummary {
            names: names.len(),
            ..Default::default()
        };

        for (index, name) in names.iter().enumerate() {
            let entry = match parse_entry_record(&mut reader, index, name) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(index, name = %name, "entry table cut short: {e}");
                    summary.truncated = true;
                    break;
                }
            };

            // Records are contiguous; payloads live anywhere.
            let resume = reader.position();
            match self.extract_entry(&mut reader, &entry, header.base_offset) {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    error!(index, name = %entry.name, "entry failed: {e}");
                    summary.failed += 1;
                }
            }
            reader.seek(resume);
        }

        info!(
            bundle = %file.path().display(),
            names = summary.names,
            written = summary.written,
            degraded = summary.degraded,
            skipped = summary.skipped,
            failed = summary.failed,
            "bundle done"
        );
        Ok(summary)
    }

    fn extract_entry<R: ReadAt + ?Sized>(
        &self,
        reader: &mut ByteReader<'_, R>,
        entry: &BundleEntry,
        base_offset: u32,
    ) -> Result<EntryOutcome> {
        let offset = entry.absolute_offset(base_offset);
        reader.seek(offset);
        debug!(index = entry.index, name = %entry.name, size = entry.size, offset, "entry");

        match read_compressed_header(reader) {
            Ok(Some(header)) => self.inflate_entry(reader, entry, header),
            Ok(None) => self.copy_entry(reader, entry, offset),
            Err(e) => {
                warn!(index = entry.index, name = %entry.name, offset, "payload out of range: {e}");
                self.copy_entry(reader, entry, offset)
            }
        }
    }

    fn inflate_entry<R: ReadAt + ?Sized>(
        &self,
        reader: &mut ByteReader<'_, R>,
        entry: &BundleEntry,
        header: CompressedHeader,
    ) -> Result<EntryOutcome> {
        let out_rel = strip_compression_marker(&entry.name);
        if self.output.would_skip(&out_rel) {
            return Ok(EntryOutcome::Skipped);
        }

        let stored = u64::from(entry.size).saturating_sub(CompressedHeader::SIZE as u64);
        let compressed = reader.read_up_to(stored);

        let (data, outcome) = match decompress(&compressed, header.xsize) {
            Ok(inflated) if inflated.verified => {
                (inflated.data, EntryOutcome::Inflated(inflated.framing))
            }
            Ok(inflated) => {
                warn!(
                    name = %entry.name,
                    expected = header.xsize,
                    produced = inflated.data.len(),
                    "size mismatch, keeping partial output"
                );
                (inflated.data, EntryOutcome::Salvaged)
            }
            Err(e) => {
                warn!(name = %entry.name, "{e}; writing compressed bytes");
                (compressed, EntryOutcome::RawDump)
            }
        };

        match self.output.write(&out_rel, &data)? {
            WriteOutcome::Written(_) => Ok(outcome),
            WriteOutcome::Skipped(_) => Ok(EntryOutcome::Skipped),
        }
    }

    fn copy_entry<R: ReadAt + ?Sized>(
        &self,
        reader: &mut ByteReader<'_, R>,
        entry: &BundleEntry,
        offset: u64,
    ) -> Result<EntryOutcome> {
        reader.seek(offset);
        let data = reader.read_up_to(u64::from(entry.size));
        if data.len() != entry.size as usize {
            warn!(
                name = %entry.name,
                size = entry.size,
                available = data.len(),
                "payload runs past end of file"
            );
        }

        match self.output.write(&entry.name, &data)? {
            WriteOutcome::Written(_) => Ok(EntryOutcome::Copied),
            WriteOutcome::Skipped(_) => Ok(EntryOutcome::Skipped),
        }
    }
}

/// Output path of a single-blob input: its base name with the marker
/// removed, at the top of the output tree.
pub fn single_output_path(rel: &str) -> String {
    let clean = sanitize(rel);
    let base = clean.rsplit('/').next().unwrap_or_default();
    strip_compression_marker(base)
}

/// Output path of a TOC rendering.
///
/// Keyed by a hash of the input's relative path, so repeated runs over
/// the same input overwrite the same rendering.
pub fn toc_rendering_path(rel: &str) -> String {
    let clean = sanitize(rel);
    let digest = hex::encode(Sha256::digest(clean.as_bytes()));

    let stem = match clean.rfind('.') {
        Some(dot) if !clean[dot..].contains('/') => &clean[..dot],
        _ => clean.as_str(),
    };
    format!(
        "{TOC_DIR}/{}_{}{TOC_RENDER_SUFFIX}",
        stem.replace('/', "_"),
        &digest[..8]
    )
}

/// A recognized container and what it describes
#[derive(Debug, Clone)]
pub struct Contents {
    pub kind: ContainerKind,
    pub rows: Vec<ContentRow>,
}

/// One listed entry
#[derive(Debug, Clone)]
pub struct ContentRow {
    pub name: String,
    /// Stored length (for TOC descriptors, the recorded size)
    pub size: u64,
    /// Absolute payload offset, when the container holds the bytes
    pub offset: Option<u64>,
    /// Decompressed size for `__ZN` payloads
    pub xsize: Option<u32>,
    /// Content hash listed by a TOC descriptor
    pub hash: Option<String>,
}

/// Describe a file without writing anything.
///
/// Returns `Ok(None)` when no container format recognizes the file.
pub fn list_contents(file: &LocalFile, rel: &str) -> Result<Option<Contents>> {
    let Some(kind) = recognize(file.bytes()) else {
        return Ok(None);
    };

    let rows = match kind {
        ContainerKind::SingleBlob => {
            let mut reader = ByteReader::new(file);
            let header = read_compressed_header(&mut reader)?
                .ok_or(Error::BadSignature { what: "compressed payload" })?;
            vec![ContentRow {
                name: single_output_path(rel),
                size: reader.remaining(),
                offset: Some(reader.position()),
                xsize: Some(header.xsize),
                hash: None,
            }]
        }
        ContainerKind::TocDescriptor => parse_toc(file)?
            .entries
            .into_iter()
            .map(|e| ContentRow {
                name: e.name,
                size: u64::from(e.size),
                offset: None,
                xsize: None,
                hash: Some(e.hash),
            })
            .collect(),
        ContainerKind::Bundle(_) => list_bundle(file)?,
    };

    Ok(Some(Contents { kind, rows }))
}

fn list_bundle(file: &LocalFile) -> Result<Vec<ContentRow>> {
    let mut reader = ByteReader::new(file);
    let (encoding, header) = parse_bundle_header(&mut reader)?;
    let names = parse_name_table(&mut reader, header.entry_count, encoding);

    let mut rows = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let Ok(entry) = parse_entry_record(&mut reader, index, name) else {
            break;
        };
        let resume = reader.position();
        let offset = entry.absolute_offset(header.base_offset);
        reader.seek(offset);
        let xsize = read_compressed_header(&mut reader)
            .ok()
            .flatten()
            .map(|h| h.xsize);
        reader.seek(resume);

        rows.push(ContentRow {
            name: entry.name,
            size: u64::from(entry.size),
            offset: Some(offset),
            xsize,
            hash: None,
        });
    }
    Ok(rows)
}
