use clap::{CommandFactory, Parser};
use std::path::PathBuf;

/// Flag reference used to render usage and help text. Actual scanning is
/// done by [`crate::options::parse_args`], which stops at the first input
/// file the way the dumper always has.
#[derive(Debug, Clone, Parser)]
#[command(name = "class-dump")]
#[command(version)]
#[command(about = "Dump Java class files, raw (.class) or hex-encoded text")]
pub struct Cli {
    /// Show the raw bytes of the input alongside the dump
    #[arg(long)]
    pub bytes: bool,

    /// Dump the basic blocks of each method
    #[arg(long)]
    pub basic_blocks: bool,

    /// Dump each method's block graph with predecessors and successors
    #[arg(long)]
    pub rop_blocks: bool,

    /// Request optimization (ignored with --ssa-blocks)
    #[arg(long)]
    pub optimize: bool,

    /// Dump dominator information used for SSA construction
    #[arg(long)]
    pub ssa_blocks: bool,

    /// Stop the SSA dump after the named step
    #[arg(long, value_name = "STEP", require_equals = true)]
    pub ssa_step: Option<String>,

    /// Print full error detail on parse failures
    #[arg(long)]
    pub debug: bool,

    /// Emit a DOT graph per method
    #[arg(long)]
    pub dot: bool,

    /// Reject trailing bytes and unsupported class file versions
    #[arg(long)]
    pub strict: bool,

    /// Column width for byte dumps
    #[arg(long, value_name = "N", require_equals = true, allow_negative_numbers = true)]
    pub width: Option<i32>,

    /// Only dump the method with this name
    #[arg(long, value_name = "NAME", require_equals = true)]
    pub method: Option<String>,

    /// Input files; names not ending in .class are read as hex text
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

pub fn usage() -> String {
    Cli::command().render_usage().to_string()
}

pub fn long_help() -> String {
    Cli::command().render_long_help().to_string()
}

pub fn version() -> String {
    Cli::command().render_version().to_string()
}
