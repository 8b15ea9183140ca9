use std::fs;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::{DeflateEncoder, ZlibEncoder};
use nzextract::{ContainerKind, ExtractOptions, FileOutcome, LocalFile, Session, list_contents};

const BUNDLE_MAGIC: &[u8; 8] = b"_B3NHB3N";
const LEGACY_BUNDLE_MAGIC: &[u8; 8] = b"_B2NHB2N";

enum Payload<'a> {
    Stored(&'a [u8]),
    /// Compressed payload with the given xsize
    Packed(Vec<u8>, u32),
    /// Record pointing at an arbitrary relative offset
    Dangling { size: u32, offset: u32 },
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn raw_deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn packed(data: &[u8]) -> Payload<'static> {
    Payload::Packed(zlib(data), data.len() as u32)
}

/// Build a bundle whose payloads follow the record table; offsets are
/// stored relative to a base offset at the start of the payload area.
fn bundle(magic: &[u8; 8], entries: &[(&str, Payload<'_>)]) -> Vec<u8> {
    let prefixed = magic == BUNDLE_MAGIC;

    let mut names = Vec::new();
    for (name, _) in entries {
        if prefixed {
            names.extend_from_slice(&(name.len() as u16).to_le_bytes());
            names.extend_from_slice(name.as_bytes());
        } else {
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
    }

    let base = (8 + 16 + names.len() + 44 * entries.len()) as u32;
    let mut records = Vec::new();
    let mut payloads = Vec::new();
    for (_, payload) in entries {
        let (size, offset, bytes) = match payload {
            Payload::Stored(data) => (data.len() as u32, payloads.len() as u32, data.to_vec()),
            Payload::Packed(stream, xsize) => {
                let mut bytes = b"__ZN".to_vec();
                bytes.extend_from_slice(&xsize.to_le_bytes());
                bytes.extend_from_slice(stream);
                (bytes.len() as u32, payloads.len() as u32, bytes)
            }
            Payload::Dangling { size, offset } => (*size, *offset, Vec::new()),
        };
        records.extend_from_slice(b"TAG0");
        records.extend_from_slice(&[0xAB; 32]);
        records.extend_from_slice(&size.to_le_bytes());
        records.extend_from_slice(&offset.to_le_bytes());
        payloads.extend_from_slice(&bytes);
    }

    let mut out = magic.to_vec();
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&base.to_le_bytes());
    out.extend_from_slice(&names);
    out.extend_from_slice(&records);
    out.extend_from_slice(&payloads);
    out
}

fn toc(entries: &[(&str, u32, &str)]) -> Vec<u8> {
    let mut out = b"IB3N".to_vec();
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (name, size, hash) in entries {
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&(hash.len() as u16).to_le_bytes());
        out.extend_from_slice(hash.as_bytes());
    }
    out
}

fn put(root: &Path, rel: &str, data: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

struct Workspace {
    _dir: tempfile::TempDir,
    input: std::path::PathBuf,
    output: std::path::PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();
        Self {
            _dir: dir,
            input,
            output,
        }
    }

    fn session(&self) -> Session {
        Session::new(&self.input, &ExtractOptions::new(&self.output))
    }

    fn read(&self, rel: &str) -> Vec<u8> {
        fs::read(self.output.join(rel)).unwrap_or_else(|e| panic!("{rel}: {e}"))
    }
}

#[test]
fn bundle_with_stored_and_compressed_entries() {
    let ws = Workspace::new();
    let texture: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    put(
        &ws.input,
        "packs/ui.bin",
        &bundle(
            BUNDLE_MAGIC,
            &[
                ("textures/plain.dds", Payload::Stored(b"stored bytes")),
                ("textures/packed.dds.nz", packed(&texture)),
            ],
        ),
    );

    let report = ws.session().run(&[]);

    assert_eq!(report.bundles, 1);
    assert_eq!(report.entries_written, 2);
    assert_eq!(report.entries_degraded, 0);
    assert_eq!(ws.read("textures/plain.dds"), b"stored bytes");
    assert_eq!(ws.read("textures/packed.dds"), texture);
    assert!(!ws.output.join("textures/packed.dds.nz").exists());
}

#[test]
fn raw_deflate_payload_is_recovered() {
    let ws = Workspace::new();
    let data = b"raw framed payload, raw framed payload, raw framed payload".to_vec();
    put(
        &ws.input,
        "b.bin",
        &bundle(
            BUNDLE_MAGIC,
            &[("a/raw.bin.nz", Payload::Packed(raw_deflate(&data), data.len() as u32))],
        ),
    );

    ws.session().run(&[]);
    assert_eq!(ws.read("a/raw.bin"), data);
}

#[test]
fn undecodable_payload_is_dumped_raw() {
    let ws = Workspace::new();
    let garbage = vec![0xFFu8; 40];
    put(
        &ws.input,
        "b.bin",
        &bundle(
            BUNDLE_MAGIC,
            &[("broken/file.tex.nz", Payload::Packed(garbage.clone(), 500))],
        ),
    );

    let report = ws.session().run(&[]);
    assert_eq!(report.entries_written, 1);
    assert_eq!(report.entries_degraded, 1);
    assert_eq!(ws.read("broken/file.tex"), garbage);
}

#[test]
fn entry_past_end_of_file_is_empty() {
    let ws = Workspace::new();
    put(
        &ws.input,
        "b.bin",
        &bundle(
            BUNDLE_MAGIC,
            &[
                ("ok/first.bin", Payload::Stored(b"first")),
                (
                    "bad/far.bin",
                    Payload::Dangling {
                        size: 64,
                        offset: 0x7FFF_0000,
                    },
                ),
                ("ok/last.bin", Payload::Stored(b"last")),
            ],
        ),
    );

    let report = ws.session().run(&[]);
    assert_eq!(report.bundles, 1);
    assert_eq!(ws.read("ok/first.bin"), b"first");
    assert!(ws.read("bad/far.bin").is_empty());
    assert_eq!(ws.read("ok/last.bin"), b"last");
}

#[test]
fn truncated_record_table_keeps_earlier_entries() {
    let ws = Workspace::new();
    let full = bundle(
        BUNDLE_MAGIC,
        &[
            ("keep/one.bin", Payload::Stored(b"")),
            ("lost/two.bin", Payload::Stored(b"")),
        ],
    );
    // Cut inside the second record; both names and the first record survive.
    let names_len = (2 + "keep/one.bin".len()) + (2 + "lost/two.bin".len());
    let cut = 24 + names_len + 44 + 20;
    put(&ws.input, "b.bin", &full[..cut]);

    let report = ws.session().run(&[]);
    assert_eq!(report.bundles, 1);
    assert_eq!(report.entries_written, 1);
    assert!(ws.output.join("keep/one.bin").exists());
    assert!(!ws.output.join("lost/two.bin").exists());
}

#[test]
fn legacy_bundle_uses_terminated_names() {
    let ws = Workspace::new();
    put(
        &ws.input,
        "old.bin",
        &bundle(
            LEGACY_BUNDLE_MAGIC,
            &[
                ("legacy/a.txt", Payload::Stored(b"A")),
                ("legacy/b.txt.nz", packed(b"BBBB")),
            ],
        ),
    );

    ws.session().run(&[]);
    assert_eq!(ws.read("legacy/a.txt"), b"A");
    assert_eq!(ws.read("legacy/b.txt"), b"BBBB");
}

#[test]
fn single_blob_is_inflated_under_its_base_name() {
    let ws = Workspace::new();
    let data = b"single payload contents".to_vec();
    let mut blob = b"__ZN".to_vec();
    blob.extend_from_slice(&(data.len() as u32).to_le_bytes());
    blob.extend_from_slice(&zlib(&data));
    put(&ws.input, "ui/atlas.dds.nz", &blob);

    let report = ws.session().run(&[]);
    assert_eq!(report.singles, 1);
    assert_eq!(ws.read("atlas.dds"), data);
    assert!(!ws.output.join("ui").exists());
}

#[test]
fn unrecognized_files_are_archived_verbatim() {
    let ws = Workspace::new();
    put(&ws.input, "misc/readme.txt", b"not a container");
    // Recognized, but the header is cut short: archived instead of dropped.
    put(&ws.input, "misc/stub.bin", b"_B3NHB3N\x01\x00");

    let report = ws.session().run(&[]);
    assert_eq!(report.unparsed, 2);
    assert_eq!(ws.read("_unparsed/misc/readme.txt"), b"not a container");
    assert_eq!(ws.read("_unparsed/misc/stub.bin"), b"_B3NHB3N\x01\x00");
}

#[test]
fn truncated_toc_is_not_rendered() {
    let ws = Workspace::new();
    let full = toc(&[("foo/bar.tex", 100, "abc123")]);
    put(&ws.input, "index.toc", &full[..full.len() - 3]);

    let mut session = ws.session();
    let outcome = session.handle_file(&ws.input.join("index.toc"), "index.toc");
    assert_eq!(outcome, FileOutcome::Unparsed);
    assert!(!ws.output.join("_toc").exists());
}

#[test]
fn toc_relocates_hash_named_outputs() {
    let ws = Workspace::new();
    // The bundle sorts before the descriptor, so its outputs exist before
    // the map does.
    put(
        &ws.input,
        "a_bundle.bin",
        &bundle(
            BUNDLE_MAGIC,
            &[
                ("cache/data._abc123", Payload::Stored(b"texture bytes")),
                ("cache/other._def456", Payload::Stored(b"orphan bytes")),
            ],
        ),
    );
    put(
        &ws.input,
        "z_index.toc",
        &toc(&[("foo/bar.tex", 100, "abc123"), ("foo/baz.tex", 5, "999999")]),
    );

    let report = ws.session().run(&[]);

    assert_eq!(report.tocs, 1);
    assert_eq!(report.relocation.listings, 1);
    assert_eq!(report.relocation.mapped, 2);
    assert_eq!(report.relocation.moved, 1);
    assert_eq!(report.relocation.stripped, 1);

    assert_eq!(ws.read("foo/bar.tex"), b"texture bytes");
    assert!(!ws.output.join("cache/data._abc123").exists());

    assert_eq!(ws.read("cache/other"), b"orphan bytes");
    assert!(!ws.output.join("cache/other._def456").exists());

    // The rendering itself stays where it was written.
    let rendered: Vec<_> = fs::read_dir(ws.output.join("_toc"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].starts_with("z_index_"));
    assert!(rendered[0].ends_with(".toc.txt"));
}

#[test]
fn empty_hash_row_does_not_hide_the_rest_of_a_toc() {
    let ws = Workspace::new();
    put(
        &ws.input,
        "a_bundle.bin",
        &bundle(
            BUNDLE_MAGIC,
            &[("cache/data._abc123", Payload::Stored(b"texture bytes"))],
        ),
    );
    put(
        &ws.input,
        "z_index.toc",
        &toc(&[("dir/empty.bin", 0, ""), ("foo/bar.tex", 100, "abc123")]),
    );

    let report = ws.session().run(&[]);

    assert_eq!(report.relocation.listing_errors, 0);
    assert_eq!(report.relocation.malformed_lines, 0);
    assert_eq!(report.relocation.mapped, 1);
    assert_eq!(report.relocation.moved, 1);
    assert_eq!(report.relocation.stripped, 0);
    assert_eq!(ws.read("foo/bar.tex"), b"texture bytes");
    assert!(!ws.output.join("cache/data").exists());
}

#[test]
fn odd_lines_in_a_pipe_listing_are_skipped() {
    let ws = Workspace::new();
    put(
        &ws.output,
        "lists/client__toc.txt",
        b"path|type|hash|comment\nfoo/bar.tex|f|ABC123\nnot a row\n",
    );
    put(&ws.output, "cache/data._abc123", b"texture bytes");

    let report = nzextract::relocate(&ws.output).unwrap();

    assert_eq!(report.listings, 1);
    assert_eq!(report.malformed_lines, 2);
    assert_eq!(report.mapped, 1);
    assert_eq!(report.moved, 1);
    assert_eq!(ws.read("foo/bar.tex"), b"texture bytes");
}

#[test]
fn toc_rendering_is_stable_across_runs() {
    let ws = Workspace::new();
    put(&ws.input, "idx.toc", &toc(&[("a/b.c", 1, "0123ab")]));

    ws.session().run(&[]);
    ws.session().run(&[]);

    let entries: Vec<_> = fs::read_dir(ws.output.join("_toc")).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let text = fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
    assert_eq!(text, "0\ta/b.c\t1\t0123ab");
}

#[test]
fn never_overwrite_skips_existing_outputs() {
    let ws = Workspace::new();
    put(
        &ws.input,
        "b.bin",
        &bundle(BUNDLE_MAGIC, &[("x/kept.bin", Payload::Stored(b"new"))]),
    );
    put(&ws.output, "x/kept.bin", b"old");

    let options = ExtractOptions::new(&ws.output).overwrite(false);
    let report = Session::new(&ws.input, &options).run(&[]);

    assert_eq!(report.entries_skipped, 1);
    assert_eq!(ws.read("x/kept.bin"), b"old");
}

#[test]
fn listing_describes_bundle_without_writing() {
    let ws = Workspace::new();
    let path = ws.input.join("b.bin");
    put(
        &ws.input,
        "b.bin",
        &bundle(
            BUNDLE_MAGIC,
            &[
                ("one.bin", Payload::Stored(b"12345")),
                ("two.bin.nz", packed(b"abcdefgh")),
            ],
        ),
    );

    let file = LocalFile::open(&path).unwrap();
    let contents = list_contents(&file, "b.bin").unwrap().unwrap();
    assert_eq!(
        contents.kind,
        ContainerKind::Bundle(nzextract::nz::NameEncoding::LengthPrefixed)
    );
    assert_eq!(contents.rows.len(), 2);
    assert_eq!(contents.rows[0].name, "one.bin");
    assert_eq!(contents.rows[0].size, 5);
    assert_eq!(contents.rows[0].xsize, None);
    assert_eq!(contents.rows[1].xsize, Some(8));
    assert!(fs::read_dir(&ws.output).unwrap().next().is_none());
}
