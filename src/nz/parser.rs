//! Low-level container parser.
//!
//! Recognition is a pure function of the leading bytes: each probe looks
//! at one signature and either claims the file or passes. The probes are
//! tried in [`PROBES`] order and the first claim wins.
//!
//! Everything else reads through a [`ByteReader`] over the whole input
//! held in memory, so offsets taken from headers can point anywhere
//! (including past the end) without touching a file handle.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io::{ByteReader, ReadAt};

use super::structures::*;

type Probe = fn(&[u8]) -> Option<ContainerKind>;

/// Recognizers in dispatch priority order.
pub const PROBES: [Probe; 3] = [probe_single_blob, probe_toc, probe_bundle];

/// Identify the container kind of a file from its leading bytes.
pub fn recognize(head: &[u8]) -> Option<ContainerKind> {
    PROBES.iter().find_map(|probe| probe(head))
}

pub fn probe_single_blob(head: &[u8]) -> Option<ContainerKind> {
    head.starts_with(COMPRESSED_SIGNATURE)
        .then_some(ContainerKind::SingleBlob)
}

pub fn probe_toc(head: &[u8]) -> Option<ContainerKind> {
    head.starts_with(TOC_SIGNATURE)
        .then_some(ContainerKind::TocDescriptor)
}

pub fn probe_bundle(head: &[u8]) -> Option<ContainerKind> {
    bundle_magic(head).map(|magic| ContainerKind::Bundle(magic.names))
}

fn bundle_magic(head: &[u8]) -> Option<&'static BundleMagic> {
    BUNDLE_MAGICS
        .iter()
        .find(|magic| head.starts_with(&magic.signature))
}

/// Read the `__ZN` sub-header at the reader's position.
///
/// Returns `Ok(None)` without consuming anything when the signature
/// does not match.
pub fn read_compressed_header<R: ReadAt + ?Sized>(
    reader: &mut ByteReader<'_, R>,
) -> Result<Option<CompressedHeader>> {
    let start = reader.position();
    let signature = reader.read_array::<4>("payload signature")?;
    if &signature != COMPRESSED_SIGNATURE {
        reader.seek(start);
        return Ok(None);
    }
    let xsize = reader.read_u32("xsize")?;
    Ok(Some(CompressedHeader { xsize }))
}

/// Parse the 8-byte signature and the fixed bundle header.
pub fn parse_bundle_header<R: ReadAt + ?Sized>(
    reader: &mut ByteReader<'_, R>,
) -> Result<(NameEncoding, BundleHeader)> {
    let signature = reader.read_array::<8>("bundle signature")?;
    let Some(magic) = bundle_magic(&signature) else {
        return Err(Error::BadSignature { what: "bundle" });
    };

    let header = BundleHeader {
        entry_count: reader.read_u32("entry count")?,
        reserved: reader.read_u32("reserved header field")?,
        info_offset: reader.read_u32("info offset")?,
        base_offset: reader.read_u32("base offset")?,
    };
    debug!(
        entries = header.entry_count,
        info_offset = header.info_offset,
        base_offset = header.base_offset,
        "bundle header"
    );
    Ok((magic.names, header))
}

/// Read up to `count` names from the name table.
///
/// A name cut short by the end of the file ends the table; names read
/// before it are kept.
pub fn parse_name_table<R: ReadAt + ?Sized>(
    reader: &mut ByteReader<'_, R>,
    count: u32,
    encoding: NameEncoding,
) -> Vec<String> {
    // Every name takes at least one byte, which bounds a bogus count.
    let capacity = u64::from(count).min(reader.remaining()) as usize;
    let mut names = Vec::with_capacity(capacity);

    for index in 0..count {
        let name = match encoding {
            NameEncoding::LengthPrefixed => read_prefixed_name(reader),
            NameEncoding::NulTerminated => read_terminated_name(reader),
        };
        match name {
            Ok(Some(name)) => names.push(name),
            Ok(None) => break,
            Err(e) => {
                warn!(index, "name table cut short: {e}");
                break;
            }
        }
    }
    names
}

fn read_prefixed_name<R: ReadAt + ?Sized>(
    reader: &mut ByteReader<'_, R>,
) -> Result<Option<String>> {
    let len = reader.read_u16("name length")?;
    let bytes = reader.read_vec(usize::from(len), "name")?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

fn read_terminated_name<R: ReadAt + ?Sized>(
    reader: &mut ByteReader<'_, R>,
) -> Result<Option<String>> {
    let offset = reader.position();
    let (bytes, terminated) = reader.read_cstr();
    if !terminated {
        return Err(Error::Truncated {
            what: "name",
            offset,
            needed: bytes.len() + 1,
        });
    }
    // An empty name marks the end of the table.
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Read one 44-byte entry record.
pub fn parse_entry_record<R: ReadAt + ?Sized>(
    reader: &mut ByteReader<'_, R>,
    index: usize,
    name: &str,
) -> Result<BundleEntry> {
    let tag = reader.read_array::<4>("entry tag")?;
    let metadata = reader.read_array::<32>("entry metadata")?;
    let size = reader.read_u32("entry size")?;
    let offset = reader.read_u32("entry offset")?;

    Ok(BundleEntry {
        index,
        name: name.to_string(),
        tag,
        metadata,
        size,
        offset,
    })
}

/// Parse a complete TOC descriptor.
///
/// Unlike bundle name tables, a truncated TOC table is an error: a partial
/// hash map would silently misplace files during relocation.
pub fn parse_toc<R: ReadAt + ?Sized>(source: &R) -> Result<TocDescriptor> {
    let mut reader = ByteReader::new(source);
    let signature = reader.read_array::<4>("toc signature")?;
    if &signature != TOC_SIGNATURE {
        return Err(Error::BadSignature { what: "toc" });
    }

    let count = reader.read_u16("toc entry count")?;
    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name_len = reader.read_u16("toc name length")?;
        let name = reader.read_vec(usize::from(name_len), "toc name")?;
        let size = reader.read_u32("toc entry size")?;
        let hash_len = reader.read_u16("toc hash length")?;
        let hash = reader.read_vec(usize::from(hash_len), "toc hash")?;

        entries.push(TocEntry {
            name: String::from_utf8_lossy(&name).into_owned(),
            size,
            hash: hash
                .iter()
                .filter(|b| b.is_ascii())
                .map(|&b| char::from(b))
                .collect(),
        });
    }
    Ok(TocDescriptor { entries })
}
