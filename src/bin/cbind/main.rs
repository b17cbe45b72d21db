//! cbind CLI - compile C sources into a loadable module

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cbind::core::manifest::ManifestError;
use cbind::util::diagnostic::{emit, suggestions, Diagnostic};
use cbind::util::Shell;
use cbind::BindError;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.color);

    if let Err(e) = run(cli, &shell) {
        report(&e, &shell);
        std::process::exit(1);
    }
}

fn run(cli: Cli, shell: &Shell) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("cbind=debug")
    } else if cli.quiet {
        EnvFilter::new("cbind=error")
    } else {
        EnvFilter::new("cbind=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, shell),
        Commands::Check(args) => commands::check::execute(args, shell),
        Commands::Symbols(args) => commands::symbols::execute(args, shell),
        Commands::Call(args) => commands::call::execute(args, shell),
        Commands::Init(args) => commands::init::execute(args, shell),
        Commands::Clean(args) => commands::clean::execute(args, shell),
        Commands::Toolchain(args) => commands::toolchain::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print an error, with suggestions when we know what went wrong.
fn report(err: &anyhow::Error, shell: &Shell) {
    if let Some(bind) = err.downcast_ref::<BindError>() {
        emit(&bind.to_diagnostic(), shell.use_color());
    } else if err.downcast_ref::<ManifestError>().is_some() {
        let diag = Diagnostic::error(err.to_string()).with_suggestion(suggestions::NO_MANIFEST);
        emit(&diag, shell.use_color());
    } else {
        eprintln!("error: {:#}", err);
    }
}
