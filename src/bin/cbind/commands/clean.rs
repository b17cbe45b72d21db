//! `cbind clean` command

use anyhow::Result;

use super::load_manifest;
use crate::cli::CleanArgs;
use cbind::ops::generate::target_dir;
use cbind::util::fs::remove_dir_all_if_exists;
use cbind::util::shell::{Shell, Status};

pub fn execute(args: CleanArgs, shell: &Shell) -> Result<()> {
    let manifest = load_manifest(args.manifest.as_deref())?;
    let dir = target_dir(&manifest, args.out_dir.as_deref());

    if dir.exists() {
        remove_dir_all_if_exists(&dir)?;
        shell.status(Status::Removed, dir.display());
    } else {
        tracing::debug!("nothing to clean at {}", dir.display());
    }

    Ok(())
}
