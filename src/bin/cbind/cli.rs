//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cbind::util::shell::ColorChoice;

/// cbind - compile C sources into a loadable module exposing declared functions
#[derive(Parser)]
#[command(name = "cbind")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print toolchain commands and cache decisions
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the module described by Cbind.toml
    Build(BuildArgs),

    /// Validate Cbind.toml and show the build plan without compiling
    Check(CheckArgs),

    /// List the functions a built module exports
    Symbols(SymbolsArgs),

    /// Call an exported function taking and returning `int`
    Call(CallArgs),

    /// Write a starter Cbind.toml
    Init(InitArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Toolchain information
    Toolchain(ToolchainArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Path to Cbind.toml or its directory
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Build with optimizations
    #[arg(short, long)]
    pub release: bool,

    /// Output directory (default: .cbind/target next to the manifest)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Emit compile_commands.json into the output directory
    #[arg(long)]
    pub emit_compile_commands: bool,

    /// Rebuild everything, ignoring the fingerprint cache
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Path to Cbind.toml or its directory
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Plan a release build
    #[arg(short, long)]
    pub release: bool,

    /// Output directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct SymbolsArgs {
    /// Built module (.so, .dylib or .dll)
    pub artifact: PathBuf,

    /// Take declarations from this manifest instead of the module's export table
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Args)]
pub struct CallArgs {
    /// Built module (.so, .dylib or .dll)
    pub artifact: PathBuf,

    /// Function to call
    pub function: String,

    /// Integer arguments
    #[arg(allow_negative_numbers = true)]
    pub args: Vec<i64>,

    /// Take declarations from this manifest instead of the module's export table
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Args)]
pub struct InitArgs {
    /// Module name (defaults to directory name)
    #[arg(long)]
    pub name: Option<String>,

    /// Directory to initialize (defaults to current directory)
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Path to Cbind.toml or its directory
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Output directory to remove
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct ToolchainArgs {
    #[command(subcommand)]
    pub command: ToolchainCommands,
}

#[derive(Subcommand)]
pub enum ToolchainCommands {
    /// Show the detected toolchain
    Show(ToolchainShowArgs),
}

#[derive(Args)]
pub struct ToolchainShowArgs {
    /// Project whose .cbind/toolchain.toml applies (defaults to current directory)
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
