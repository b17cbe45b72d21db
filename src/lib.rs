//! cbind - a binding generator for C code
//!
//! This crate turns a list of C function declarations and a build descriptor
//! into a loadable shared module exporting those functions, by driving the
//! system C toolchain.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

pub use builder::{BindError, ErrorKind};
pub use core::{declaration::Declarations, descriptor::BuildDescriptor, manifest::Manifest};
pub use ops::LoadedModule;
