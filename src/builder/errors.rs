//! Build error types and diagnostics.
//!
//! Every failure falls into one of three kinds: configuration (bad paths or
//! declarations), compilation (missing or broken sources) and link
//! (unresolved or unexported symbols).

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Coarse classification of a [`BindError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Compilation,
    Link,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration error"),
            ErrorKind::Compilation => write!(f, "compilation error"),
            ErrorKind::Link => write!(f, "link error"),
        }
    }
}

/// Which descriptor directory list a path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirKind {
    Include,
    Library,
}

impl fmt::Display for DirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirKind::Include => write!(f, "include"),
            DirKind::Library => write!(f, "library"),
        }
    }
}

/// Error while generating a module.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BindError {
    #[error("invalid declaration `{text}`: {reason}")]
    #[diagnostic(code(cbind::config))]
    InvalidDeclaration { text: String, reason: String },

    #[error("conflicting declarations for `{name}`")]
    #[diagnostic(code(cbind::config))]
    ConflictingDeclaration {
        name: String,
        first: String,
        second: String,
    },

    #[error("no functions declared in `cdef`")]
    #[diagnostic(code(cbind::config))]
    NoDeclarations,

    #[error("invalid module name `{name}`")]
    #[diagnostic(code(cbind::config), help("module names must be valid C identifiers"))]
    InvalidModuleName { name: String },

    #[error("invalid define `{define}`")]
    #[diagnostic(code(cbind::config))]
    InvalidDefine { define: String },

    #[error("invalid library name `{name}`")]
    #[diagnostic(code(cbind::config))]
    InvalidLibrary { name: String },

    #[error("invalid source pattern `{pattern}`: {message}")]
    #[diagnostic(code(cbind::config))]
    InvalidSourcePattern { pattern: String, message: String },

    #[error("{kind} directory does not exist: {}", path.display())]
    #[diagnostic(code(cbind::config))]
    MissingDirectory { kind: DirKind, path: PathBuf },

    #[error("source file not found: {}", path.display())]
    #[diagnostic(code(cbind::compile))]
    MissingSource { path: PathBuf },

    #[error("failed to compile {}", source_file.display())]
    #[diagnostic(code(cbind::compile))]
    Compile {
        source_file: PathBuf,
        command: String,
        output: String,
    },

    #[error("failed to link `{module}`")]
    #[diagnostic(code(cbind::link))]
    Link {
        module: String,
        command: String,
        output: String,
    },

    #[error("failed to load {}: {message}", artifact.display())]
    #[diagnostic(code(cbind::link))]
    Load { artifact: PathBuf, message: String },

    #[error("declared symbol `{symbol}` is not exported by {}", artifact.display())]
    #[diagnostic(code(cbind::link))]
    MissingSymbol { symbol: String, artifact: PathBuf },
}

impl BindError {
    /// The error kind reported to the user.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BindError::InvalidDeclaration { .. }
            | BindError::ConflictingDeclaration { .. }
            | BindError::NoDeclarations
            | BindError::InvalidModuleName { .. }
            | BindError::InvalidDefine { .. }
            | BindError::InvalidLibrary { .. }
            | BindError::InvalidSourcePattern { .. }
            | BindError::MissingDirectory { .. } => ErrorKind::Configuration,
            BindError::MissingSource { .. } | BindError::Compile { .. } => ErrorKind::Compilation,
            BindError::Link { .. } | BindError::Load { .. } | BindError::MissingSymbol { .. } => {
                ErrorKind::Link
            }
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(format!("{}: {}", self.kind(), self));

        match self {
            BindError::InvalidDeclaration { .. } => diag.with_suggestion(
                "Write each declaration as a C prototype ending in `;`, e.g. `int addme(int a, int b);`",
            ),

            BindError::ConflictingDeclaration {
                first, second, ..
            } => diag
                .with_context(format!("first declared as `{}`", first))
                .with_context(format!("then declared as `{}`", second))
                .with_suggestion("Remove one of the declarations from `cdef`"),

            BindError::NoDeclarations => diag
                .with_suggestion("Add at least one prototype to `cdef`, e.g. `int addme(int a, int b);`"),

            BindError::InvalidModuleName { .. } => diag
                .with_suggestion("Use letters, digits and underscores, not starting with a digit"),

            BindError::InvalidDefine { .. } => {
                diag.with_suggestion("Write defines as `NAME` or `NAME=VALUE`, without `-D`")
            }

            BindError::InvalidLibrary { .. } => diag.with_suggestion(
                "List libraries by name only, e.g. `mw` for libmw.a, and their directory in `library-dirs`",
            ),

            BindError::InvalidSourcePattern { .. } => {
                diag.with_suggestion("Check the glob syntax in `sources`")
            }

            BindError::MissingDirectory { kind, path } => {
                let key = match kind {
                    DirKind::Include => "include-dirs",
                    DirKind::Library => "library-dirs",
                };
                diag.with_location(path)
                    .with_suggestion(format!("Create the directory or fix `{}` in Cbind.toml", key))
            }

            BindError::MissingSource { path } => diag
                .with_location(path)
                .with_suggestion("Fix the path in `sources`; relative paths start at the manifest directory"),

            BindError::Compile {
                command, output, ..
            } => diag
                .with_context(output.clone())
                .with_context(format!("command: {}", command))
                .with_suggestion(suggestions::BUILD_FAILED),

            BindError::Link {
                command, output, ..
            } => diag
                .with_context(output.clone())
                .with_context(format!("command: {}", command))
                .with_suggestion("Check that every declared function is defined in `sources` or `libraries`")
                .with_suggestion(suggestions::BUILD_FAILED),

            BindError::Load { .. } => diag
                .with_suggestion("Check that every library the module links against can be found at load time"),

            BindError::MissingSymbol { symbol, .. } => diag.with_suggestion(format!(
                "Define `{}` in one of the sources, or remove it from `cdef`",
                symbol
            )),
        }
    }
}
