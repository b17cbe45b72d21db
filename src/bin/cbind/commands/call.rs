//! `cbind call` command

use anyhow::Result;

use super::{current_dir, load_manifest};
use crate::cli::CallArgs;
use cbind::ops::LoadedModule;
use cbind::util::Shell;

pub fn execute(args: CallArgs, _shell: &Shell) -> Result<()> {
    let artifact = current_dir()?.join(&args.artifact);

    let module = match args.manifest.as_deref() {
        Some(path) => {
            let manifest = load_manifest(Some(path))?;
            LoadedModule::open(&artifact, &manifest.declarations()?)?
        }
        None => LoadedModule::open_self_described(&artifact)?,
    };

    let value = module.call(&args.function, &args.args)?;
    println!("{}", value);

    Ok(())
}
