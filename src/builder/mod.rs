//! C build driver.
//!
//! This module turns declarations and a descriptor into a plan of compile
//! and link commands, and runs it.

pub mod bindings;
pub mod depfile;
pub mod errors;
pub mod executor;
pub mod fingerprint;
pub mod glue;
pub mod plan;
pub mod toolchain;

pub use errors::{BindError, ErrorKind};
pub use executor::{BuildExecutor, ExecutionSummary};
pub use plan::{BuildPlan, Profile};
pub use toolchain::{
    detect_toolchain, CommandSpec, DetectedToolchain, GccToolchain, MsvcToolchain, Toolchain,
    ToolchainPlatform,
};
