//! `cbind symbols` command

use anyhow::Result;

use super::{current_dir, load_manifest};
use crate::cli::SymbolsArgs;
use cbind::ops::LoadedModule;
use cbind::util::shell::{Shell, Status};

pub fn execute(args: SymbolsArgs, shell: &Shell) -> Result<()> {
    let artifact = current_dir()?.join(&args.artifact);

    let module = match args.manifest.as_deref() {
        Some(path) => {
            let manifest = load_manifest(Some(path))?;
            LoadedModule::open(&artifact, &manifest.declarations()?)?
        }
        None => LoadedModule::open_self_described(&artifact)?,
    };

    if let Some(name) = module.module_name() {
        shell.status(Status::Info, format!("module `{}`", name));
    }
    for export in module.symbols() {
        println!("{}", export.signature);
    }

    Ok(())
}
