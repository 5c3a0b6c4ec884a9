//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

/// gobb - merge many Go commands into one busybox-style binary
///
/// PATTERNS name the commands to embed: directories, filesystem globs,
/// Go package paths (with `...` or glob metacharacters), or shell brace
/// groups. A leading `-` on a pattern excludes what it matches.
#[derive(Parser)]
#[command(name = "gobb")]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the compiled busybox binary
    #[arg(short, long, default_value = "bb")]
    pub output: PathBuf,

    /// Directory to generate sources in (default: a fresh temp directory)
    #[arg(long, value_name = "DIR")]
    pub gen_dir: Option<PathBuf>,

    /// Generate sources but do not build them
    #[arg(short = 'g', long)]
    pub generate_only: bool,

    /// Keep the generated sources on success
    #[arg(short = 'k', long)]
    pub keep: bool,

    /// Fail on duplicate command names even when a tie-breaker could pick
    #[arg(long)]
    pub strict: bool,

    /// Prefer the locally rooted copy when two commands share a name
    #[arg(long)]
    pub tie_break_local: bool,

    /// Path to the Go compiler binary
    #[arg(long, value_name = "PATH")]
    pub go: Option<PathBuf>,

    /// Target operating system (GOOS)
    #[arg(long, value_name = "OS")]
    pub goos: Option<String>,

    /// Target architecture (GOARCH)
    #[arg(long, value_name = "ARCH")]
    pub goarch: Option<String>,

    /// Build tag (repeatable)
    #[arg(long = "tags", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Extra flags for the Go linker
    #[arg(long, value_name = "FLAGS")]
    pub ldflags: Option<String>,

    /// Do not strip symbols from the binary
    #[arg(long)]
    pub no_strip: bool,

    /// Remove filesystem paths from the binary
    #[arg(long)]
    pub trimpath: bool,

    /// Module download mode forwarded as -mod (e.g. vendor)
    #[arg(long = "mod", value_name = "MODE")]
    pub mod_flag: Option<String>,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Color output: auto, always, never
    #[arg(long, default_value = "auto")]
    pub color: String,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    pub completions: Option<Shell>,

    /// Command patterns
    #[arg(value_name = "PATTERN", allow_hyphen_values = true)]
    pub patterns: Vec<String>,
}
