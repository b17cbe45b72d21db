//! Core data model: declarations, build descriptor and manifest.

pub mod declaration;
pub mod descriptor;
pub mod manifest;

pub use declaration::Declarations;
pub use descriptor::{BuildDescriptor, ResolvedDescriptor};
pub use manifest::Manifest;
