//! Declared C functions: the type model and the prototype parser.

pub mod parser;
pub mod types;

pub use parser::DeclarationParser;
pub use types::{CFunction, CParam, CType};
