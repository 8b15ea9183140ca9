//! Main entry point for the nzextract CLI application.
//!
//! Extracts every input through the container recognizers, then runs the
//! relocation pass once over the output tree.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use nzextract::{
    Cli, ContainerKind, Contents, ExtractOptions, LocalFile, Session, diff_listings, list_contents,
    read_listing,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Some(pair) = &cli.diff {
        let [old, new] = pair.as_slice() else {
            bail!("--diff takes exactly two listings");
        };
        return diff(old, new);
    }

    if cli.is_listing() {
        return list(&cli);
    }

    let options = ExtractOptions::new(&cli.extract_dir).overwrite(!cli.never_overwrite);
    std::fs::create_dir_all(&cli.extract_dir)
        .with_context(|| format!("creating {}", cli.extract_dir.display()))?;

    let report = Session::new(&cli.input_root, &options).run(&cli.inputs());

    if !cli.is_quiet() {
        eprintln!(
            "{} files: {} bundles, {} single, {} toc, {} unparsed, {} failed",
            report.files, report.bundles, report.singles, report.tocs, report.unparsed, report.failed
        );
        eprintln!(
            "{} entries written ({} degraded, {} skipped, {} failed)",
            report.entries_written,
            report.entries_degraded,
            report.entries_skipped,
            report.entries_failed
        );
        eprintln!(
            "relocation: {} moved, {} stripped, {} failed ({} hashes from {} listings)",
            report.relocation.moved,
            report.relocation.stripped,
            report.relocation.failed,
            report.relocation.mapped,
            report.relocation.listings
        );
    }

    Ok(())
}

/// Install the stderr subscriber. `RUST_LOG` wins over `-v` / `-q`, and
/// `NO_COLOR` turns off ANSI colours.
fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    let ansi = std::env::var_os("NO_COLOR").is_none_or(|v| v.is_empty());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print the differences between two TOC listings.
fn diff(old: &Path, new: &Path) -> Result<()> {
    let old_rows = read_listing(old)?.rows;
    let new_rows = read_listing(new)?.rows;
    print!("{}", diff_listings(&old_rows, &new_rows));
    Ok(())
}

/// List the contents of every input.
///
/// Supports two output formats:
/// - Simple format (`-l`): entry names, one per line
/// - Verbose format (`-v`): table with stored size, inflated size and offset
fn list(cli: &Cli) -> Result<()> {
    let inputs = cli.inputs();
    let roots = if inputs.is_empty() {
        vec![cli.input_root.clone()]
    } else {
        inputs
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for root in &roots {
        if !root.is_dir() {
            files.push(root.clone());
            continue;
        }
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", root.display()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }

    for path in files {
        let file = match LocalFile::open(&path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        let rel = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match list_contents(&file, &rel) {
            Ok(Some(contents)) => print_contents(&path, &contents, cli.verbose),
            Ok(None) => {
                if cli.verbose {
                    println!("{}: unrecognized ({})", path.display(), format_size(file.bytes().len() as u64));
                }
            }
            Err(e) => eprintln!("{}: {e}", path.display()),
        }
    }
    Ok(())
}

fn print_contents(path: &Path, contents: &Contents, verbose: bool) {
    if !verbose {
        for row in &contents.rows {
            println!("{}", row.name);
        }
        return;
    }

    println!("{} [{}]", path.display(), contents.kind);
    let hashed = contents.kind == ContainerKind::TocDescriptor;
    if hashed {
        println!("{:>10}  {:<32}  Name", "Size", "Hash");
    } else {
        println!("{:>10}  {:>10}  {:>10}  Name", "Stored", "Inflated", "Offset");
    }
    println!("{}", "-".repeat(70));

    let mut total_stored = 0u64;
    let mut total_inflated = 0u64;
    for row in &contents.rows {
        total_stored += row.size;
        if hashed {
            println!(
                "{:>10}  {:<32}  {}",
                row.size,
                row.hash.as_deref().unwrap_or(""),
                row.name
            );
            continue;
        }

        let inflated = row.xsize.map(u64::from).unwrap_or(row.size);
        total_inflated += inflated;
        let offset = row
            .offset
            .map(|o| format!("{o:#010x}"))
            .unwrap_or_default();
        let marker = if row.xsize.is_some() { "*" } else { " " };
        println!(
            "{:>10}  {:>10}{marker} {:>10}  {}",
            row.size, inflated, offset, row.name
        );
    }

    println!("{}", "-".repeat(70));
    if hashed {
        println!("{:>10}  {} entries", format_size(total_stored), contents.rows.len());
    } else {
        println!(
            "{:>10}  {:>10}   {} entries (* compressed)",
            format_size(total_stored),
            format_size(total_inflated),
            contents.rows.len()
        );
    }
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
