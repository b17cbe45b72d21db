//! `cbind build` command

use anyhow::Result;

use super::load_manifest;
use crate::cli::BuildArgs;
use cbind::ops::generate::{generate, BuildOptions};
use cbind::util::Shell;

pub fn execute(args: BuildArgs, shell: &Shell) -> Result<()> {
    let manifest = load_manifest(args.manifest.as_deref())?;

    let opts = BuildOptions {
        release: args.release,
        out_dir: args.out_dir,
        emit_compile_commands: args.emit_compile_commands,
        force: args.force,
    };

    let outcome = generate(&manifest, &opts, shell)?;

    if shell.is_verbose() {
        for export in &outcome.exports {
            tracing::debug!("exported {}", export.signature);
        }
    }
    println!("{}", outcome.artifact.display());

    Ok(())
}
