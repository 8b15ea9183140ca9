//! # nzextract
//!
//! Recovers original asset files from the nested resource containers of a
//! game client's packs.
//!
//! Every input file is recognized by its leading signature alone:
//!
//! - a single `__ZN` compressed payload,
//! - an `IB3N` TOC descriptor listing names, sizes and content hashes,
//! - a multi-entry bundle whose payloads are stored or `__ZN`-compressed.
//!
//! Files nothing recognizes are copied verbatim under `_unparsed/`. Once
//! every input is done, a relocation pass renames hash-suffixed outputs to
//! the logical paths recorded in TOC listings.
//!
//! ## Example
//!
//! ```no_run
//! use nzextract::{ExtractOptions, Session};
//!
//! let options = ExtractOptions::new("output").overwrite(false);
//! let report = Session::new("input", &options).run(&[]);
//! println!("{} bundles, {} files relocated", report.bundles, report.relocation.moved);
//! ```

pub mod batch;
pub mod cli;
pub mod codec;
pub mod error;
pub mod io;
pub mod listing;
pub mod nz;
pub mod output;
pub mod relocate;
pub mod sanitize;

pub use batch::{BatchReport, FileOutcome, Session};
pub use cli::Cli;
pub use codec::{Decompressed, Framing, decompress};
pub use error::{Error, Result};
pub use io::{ByteReader, LocalFile, ReadAt};
pub use listing::{Listing, ListingDiff, ListingRow, diff_listings, read_listing};
pub use nz::{ContainerKind, Contents, Extractor, list_contents, recognize};
pub use output::{ExtractOptions, OutputTree, WriteOutcome};
pub use relocate::{RelocationReport, relocate};
pub use sanitize::sanitize;
