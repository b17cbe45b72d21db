//! High-level operations.
//!
//! This module contains the implementation of cbind commands.

pub mod check;
pub mod generate;
pub mod init;
pub mod loader;

pub use check::{check, format_report, CheckReport};
pub use generate::{generate, target_dir, BuildOptions, BuildOutcome};
pub use init::{init_project, InitOptions, InitResult};
pub use loader::{ExportEntry, LoadedModule, ModuleMetadata};
