//! Resource container parsing and extraction.
//!
//! Three container kinds share the game's resource directories, and
//! none of them carries a meaningful file extension:
//!
//! - **Single blob**: `__ZN`, u32 xsize, deflate stream to end of file.
//! - **TOC descriptor**: `IB3N`, u16 count, then per entry a u16-prefixed
//!   name, u32 size and u16-prefixed ASCII hash. No payload bytes.
//! - **Bundle**: 8-byte signature, u32 entry count, two reserved u32s,
//!   u32 base offset, the name table, then one 44-byte record per name
//!   (4-byte tag, 32-byte metadata block, u32 size, u32 offset). A
//!   payload that starts with `__ZN` is compressed; anything else is
//!   stored verbatim.
//!
//! ## Architecture
//!
//! - [`structures`]: signatures, headers and records
//! - [`parser`]: recognition probes and table parsing
//! - [`extractor`]: writes payloads into the output tree, lists contents
//!
//! All integers are little-endian.

mod extractor;
mod parser;
mod structures;

pub use extractor::{
    BundleSummary, ContentRow, Contents, EntryOutcome, Extracted, Extractor, list_contents,
    single_output_path, toc_rendering_path,
};
pub use parser::{PROBES, parse_toc, recognize};
pub use structures::*;
