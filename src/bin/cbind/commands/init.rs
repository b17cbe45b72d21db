//! `cbind init` command

use anyhow::Result;

use super::current_dir;
use crate::cli::InitArgs;
use cbind::ops::init::{init_project, InitOptions};
use cbind::util::shell::{Shell, Status};

pub fn execute(args: InitArgs, shell: &Shell) -> Result<()> {
    let cwd = current_dir()?;
    let path = match args.path {
        Some(p) => cwd.join(p),
        None => cwd,
    };

    let result = init_project(&path, &InitOptions { name: args.name })?;

    shell.status(Status::Created, result.manifest.display());
    if let Some(source) = &result.source {
        shell.status(Status::Created, source.display());
    }

    Ok(())
}
