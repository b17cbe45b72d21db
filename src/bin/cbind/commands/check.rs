//! `cbind check` command

use anyhow::Result;

use super::load_manifest;
use crate::cli::CheckArgs;
use cbind::ops::check::{check, format_report};
use cbind::ops::generate::BuildOptions;
use cbind::util::diagnostic::emit;
use cbind::util::shell::{Shell, Status};

pub fn execute(args: CheckArgs, shell: &Shell) -> Result<()> {
    let manifest = load_manifest(args.manifest.as_deref())?;

    let opts = BuildOptions {
        release: args.release,
        out_dir: args.out_dir,
        ..BuildOptions::default()
    };

    let report = check(&manifest, &opts)?;
    print!("{}", format_report(&report));
    for warning in &report.warnings {
        emit(warning, shell.use_color());
    }
    shell.status(Status::Finished, format!("`{}` is ready to build", report.module));

    Ok(())
}
