use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nzextract")]
#[command(version)]
#[command(about = "Recover game assets from __ZN / IB3N / _B3NHB3N resource containers", long_about = None)]
#[command(after_help = "Examples:\n  \
  nzextract                          extract everything under ./input into ./output\n  \
  nzextract -d out packs/ui.bin      extract one file into ./out\n  \
  nzextract -v packs/                list every container below packs/\n  \
  nzextract --diff old__toc new__toc compare two TOC listings")]
pub struct Cli {
    /// Files or directories to process (default: the whole input root; `all` is accepted too)
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Input root; relative paths of inputs below it are preserved
    #[arg(short = 'i', long = "input", value_name = "DIR", default_value = "input")]
    pub input_root: PathBuf,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR", default_value = "output")]
    pub extract_dir: PathBuf,

    /// List container contents (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely / log debug detail
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Compare two TOC listings and print added, removed and changed paths
    #[arg(long = "diff", num_args = 2, value_names = ["OLD", "NEW"])]
    pub diff: Option<Vec<PathBuf>>,
}

impl Cli {
    pub fn is_listing(&self) -> bool {
        self.list || self.verbose
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    /// Explicit inputs; empty means the whole input root.
    pub fn inputs(&self) -> Vec<PathBuf> {
        if self.paths.iter().any(|p| p.as_os_str() == "all") {
            return Vec::new();
        }
        self.paths.clone()
    }

    /// Default log filter derived from `-v` / `-q`.
    pub fn log_level(&self) -> &'static str {
        match (self.verbose, self.quiet) {
            (_, q) if q > 1 => "error",
            (_, 1) => "warn",
            (true, _) => "debug",
            _ => "info",
        }
    }
}
