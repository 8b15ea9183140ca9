//! Inflate with framing discovery.
//!
//! Compressed payloads carry a deflate stream whose framing (zlib header,
//! raw, gzip) was never recorded by the packer. [`decompress`] tries each
//! framing in a fixed order and accepts the first one that yields exactly
//! the expected number of bytes. When none does, an incremental decoder
//! salvages whatever prefix it can produce; that result is marked as
//! unverified so callers can tell it apart from a size match.

use std::io::{self, Read};

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use tracing::debug;

use crate::error::{Error, Result};

const SALVAGE_CHUNK: usize = 8 * 1024;

/// Deflate framing a payload was recovered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Zlib,
    Raw,
    Gzip,
    /// Best-effort incremental decode, length not verified
    Salvaged,
}

impl Framing {
    /// Strict strategies, in the order they are attempted.
    pub const STRICT: [Framing; 3] = [Framing::Zlib, Framing::Raw, Framing::Gzip];

    /// Decoder for this framing; `Salvaged` only labels results.
    fn decoder<'a>(self, compressed: &'a [u8]) -> Option<Box<dyn Read + 'a>> {
        match self {
            Framing::Zlib => Some(Box::new(ZlibDecoder::new(compressed))),
            Framing::Raw => Some(Box::new(DeflateDecoder::new(compressed))),
            Framing::Gzip => Some(Box::new(GzDecoder::new(compressed))),
            Framing::Salvaged => None,
        }
    }
}

/// Output of [`decompress`]
#[derive(Debug, Clone)]
pub struct Decompressed {
    pub data: Vec<u8>,
    pub framing: Framing,
    /// `true` when the output length matches the expected size
    pub verified: bool,
}

/// Inflate `compressed`, expecting exactly `expected_size` bytes of output.
///
/// # Errors
///
/// Returns [`Error::Decompression`] only if every strict framing fails and
/// the salvage pass produces no bytes at all.
pub fn decompress(compressed: &[u8], expected_size: u32) -> Result<Decompressed> {
    for framing in Framing::STRICT {
        match inflate_exact(framing, compressed, expected_size) {
            Ok(data) => {
                return Ok(Decompressed {
                    data,
                    framing,
                    verified: true,
                });
            }
            Err(e) => debug!(?framing, expected_size, "inflate failed: {e}"),
        }
    }

    let data = salvage(compressed, expected_size);
    if data.is_empty() {
        return Err(Error::Decompression {
            compressed: compressed.len(),
            expected: expected_size,
        });
    }

    let verified = expected_size > 0 && data.len() == expected_size as usize;
    debug!(
        produced = data.len(),
        expected_size, verified, "salvaged partial inflate"
    );
    Ok(Decompressed {
        data,
        framing: Framing::Salvaged,
        verified,
    })
}

/// Decode with one framing, stopping after `expected` bytes.
fn inflate_exact(framing: Framing, compressed: &[u8], expected: u32) -> io::Result<Vec<u8>> {
    let Some(mut decoder) = framing.decoder(compressed) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{framing:?} has no decoder"),
        ));
    };
    let mut out = Vec::with_capacity(expected as usize);

    if expected == 0 {
        // Nothing to stop at: the stream itself must be empty and well formed.
        decoder.read_to_end(&mut out)?;
        if !out.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} bytes produced, none expected", out.len()),
            ));
        }
        return Ok(out);
    }

    decoder.take(u64::from(expected)).read_to_end(&mut out)?;
    if out.len() != expected as usize {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} of {expected} bytes produced", out.len()),
        ));
    }
    Ok(out)
}

/// Keep every byte decoded before the stream ends or breaks.
fn salvage(compressed: &[u8], expected: u32) -> Vec<u8> {
    let limit = if expected == 0 {
        u64::MAX
    } else {
        u64::from(expected)
    };

    for framing in [Framing::Zlib, Framing::Raw] {
        let Some(decoder) = framing.decoder(compressed) else {
            continue;
        };
        let mut decoder = decoder.take(limit);
        let mut out = Vec::new();
        let mut chunk = [0u8; SALVAGE_CHUNK];
        loop {
            match decoder.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    debug!(?framing, produced = out.len(), "salvage stopped: {e}");
                    break;
                }
            }
        }
        if !out.is_empty() {
            return out;
        }
    }
    Vec::new()
}
