//! Command implementations

pub mod build;
pub mod call;
pub mod check;
pub mod clean;
pub mod completions;
pub mod init;
pub mod symbols;
pub mod toolchain;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use cbind::core::manifest::locate_manifest;
use cbind::Manifest;

/// Load the manifest named by `--manifest`, or the nearest one above the
/// current directory.
pub fn load_manifest(explicit: Option<&Path>) -> Result<Manifest> {
    let cwd = current_dir()?;
    let path = locate_manifest(explicit, &cwd)?;
    tracing::debug!("using manifest {}", path.display());
    Manifest::load(&path)
}

pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("failed to determine the current directory")
}
