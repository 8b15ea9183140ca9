use std::fmt;

/// Signature of a compressed payload (`__ZN`), followed by a u32 xsize
pub const COMPRESSED_SIGNATURE: &[u8; 4] = b"__ZN";
/// Signature of a TOC descriptor
pub const TOC_SIGNATURE: &[u8; 4] = b"IB3N";
/// File-name component marking compressed content (`foo.tex.nz`)
pub const COMPRESSION_MARKER: &str = "nz";

/// How a bundle stores its entry names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameEncoding {
    /// u16 length followed by the name bytes
    LengthPrefixed,
    /// Name bytes up to a NUL terminator
    NulTerminated,
}

/// A known bundle signature and the name table layout it implies
#[derive(Debug, Clone, Copy)]
pub struct BundleMagic {
    pub signature: [u8; 8],
    pub names: NameEncoding,
}

/// Known bundle signatures. The encoding is tied to the exact signature;
/// there is no version field to derive it from.
pub const BUNDLE_MAGICS: &[BundleMagic] = &[
    BundleMagic {
        signature: *b"_B3NHB3N",
        names: NameEncoding::LengthPrefixed,
    },
    // Placeholder: no NUL-terminated bundle has been seen with a known
    // signature. Replace once a real sample turns up.
    BundleMagic {
        signature: *b"_B2NHB2N",
        names: NameEncoding::NulTerminated,
    },
];

/// Container kinds, in dispatch priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Whole file is one `__ZN` compressed payload
    SingleBlob,
    /// `IB3N` name/size/hash table without payload bytes
    TocDescriptor,
    /// Multi-entry bundle
    Bundle(NameEncoding),
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::SingleBlob => f.write_str("single"),
            ContainerKind::TocDescriptor => f.write_str("toc"),
            ContainerKind::Bundle(_) => f.write_str("bundle"),
        }
    }
}

/// Bundle header following the 8-byte signature - 16 bytes
#[derive(Debug, Clone, Copy)]
pub struct BundleHeader {
    pub entry_count: u32,
    pub reserved: u32,
    /// Never used by the extractor
    pub info_offset: u32,
    /// Added to every entry offset
    pub base_offset: u32,
}

impl BundleHeader {
    pub const SIZE: usize = 16;
    /// Offset of the name table
    pub const END: u64 = 8 + Self::SIZE as u64;
}

/// Per-entry record of a bundle - 44 bytes
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub index: usize,
    pub name: String,
    /// Opaque tag, not interpreted
    pub tag: [u8; 4],
    /// Opaque metadata block, not interpreted
    pub metadata: [u8; 32],
    /// Stored payload length, including the `__ZN` sub-header if compressed
    pub size: u32,
    /// Offset relative to the header's base offset
    pub offset: u32,
}

impl BundleEntry {
    pub const RECORD_SIZE: usize = 4 + 32 + 4 + 4;

    pub fn absolute_offset(&self, base_offset: u32) -> u64 {
        u64::from(base_offset) + u64::from(self.offset)
    }
}

/// Sub-header of a compressed payload - 8 bytes
#[derive(Debug, Clone, Copy)]
pub struct CompressedHeader {
    /// Exact decompressed length
    pub xsize: u32,
}

impl CompressedHeader {
    pub const SIZE: usize = 8;
}

/// One row of a TOC descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub name: String,
    pub size: u32,
    pub hash: String,
}

/// Parsed TOC descriptor
#[derive(Debug, Clone, Default)]
pub struct TocDescriptor {
    pub entries: Vec<TocEntry>,
}

impl TocDescriptor {
    /// Text rendering, one `index\tname\tsize\thash` line per entry.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{i}\t{}\t{}\t{}", e.name, e.size, e.hash))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Remove the `.nz` compression marker from the last path component.
///
/// `tex/a.dds.nz` becomes `tex/a.dds`; a marker followed by further
/// components (`a.dds.nz._9f3c`) is removed as well.
pub fn strip_compression_marker(name: &str) -> String {
    let (dir, file) = match name.rfind(['/', '\\']) {
        Some(i) => name.split_at(i + 1),
        None => ("", name),
    };

    let mut parts = file.split('.');
    let mut out = String::from(dir);
    if let Some(stem) = parts.next() {
        out.push_str(stem);
    }
    for part in parts {
        if part.eq_ignore_ascii_case(COMPRESSION_MARKER) {
            continue;
        }
        out.push('.');
        out.push_str(part);
    }
    out
}
