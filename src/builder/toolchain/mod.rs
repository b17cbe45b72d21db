//! Toolchain abstraction for C compilers.
//!
//! This module provides a unified interface for generating compile and
//! shared-library link commands across different toolchains (GCC, Clang,
//! MSVC).
//!
//! Toolchain detection priority:
//! 1. Toolchain config file (`.cbind/toolchain.toml` or `~/.cbind/toolchain.toml`)
//! 2. The `CC` environment variable
//! 3. MSVC (Windows only)
//! 4. Auto-detection (searching PATH for common compilers)

use std::fmt;
use std::path::{Path, PathBuf};

use crate::builder::plan::Profile;

mod detect;
mod gcc;
mod msvc;

pub use detect::{detect_toolchain, DetectedToolchain, ToolchainOrigin};
pub use gcc::GccToolchain;
pub use msvc::MsvcToolchain;

/// A command to execute, with program, arguments, and environment.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run (e.g., "gcc", "cl.exe")
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.display().to_string());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Input for a compile step.
#[derive(Debug, Clone)]
pub struct CompileInput {
    /// Source file to compile
    pub source: PathBuf,
    /// Output object file
    pub output: PathBuf,
    /// Include directories
    pub include_dirs: Vec<PathBuf>,
    /// Preprocessor defines (name, optional value)
    pub defines: Vec<(String, Option<String>)>,
    /// Additional compiler flags
    pub cflags: Vec<String>,
    /// Where a Makefile-style dependency file should be written
    pub depfile: Option<PathBuf>,
}

/// Input for linking a loadable module.
#[derive(Debug, Clone)]
pub struct LinkInput {
    /// Object files to link
    pub objects: Vec<PathBuf>,
    /// Output shared library
    pub output: PathBuf,
    /// Library search paths
    pub lib_dirs: Vec<PathBuf>,
    /// Libraries to link (without -l prefix)
    pub libs: Vec<String>,
    /// Symbols the module must export
    pub exports: Vec<String>,
    /// File restricting the exported symbols, see [`Toolchain::export_list`]
    pub export_list: Option<PathBuf>,
    /// Directories recorded in the module's runtime search path
    pub rpath: Vec<PathBuf>,
    /// Additional linker flags
    pub ldflags: Vec<String>,
}

/// Contents of a linker input that limits a module's dynamic symbol table
/// to the declared functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportList {
    /// File extension the linker driver expects
    pub extension: &'static str,
    pub contents: String,
}

/// How a compiler reports the headers a translation unit included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyFormat {
    /// `-MMD -MF <file>`: a Makefile rule written next to the object
    Makefile,
    /// `/showIncludes`: one `Note: including file:` line per header on stdout
    ShowIncludes,
}

/// The platform/family of a toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainPlatform {
    /// GCC (GNU Compiler Collection)
    Gcc,
    /// Clang/LLVM
    Clang,
    /// Apple Clang (macOS)
    AppleClang,
    /// Microsoft Visual C++
    Msvc,
}

impl ToolchainPlatform {
    /// Get the platform name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainPlatform::Gcc => "gcc",
            ToolchainPlatform::Clang => "clang",
            ToolchainPlatform::AppleClang => "apple-clang",
            ToolchainPlatform::Msvc => "msvc",
        }
    }
}

impl fmt::Display for ToolchainPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for toolchain implementations.
///
/// Each toolchain knows how to generate commands for its specific compiler.
pub trait Toolchain: Send + Sync {
    /// Get the toolchain platform.
    fn platform(&self) -> ToolchainPlatform;

    /// Get the C compiler path.
    fn compiler_path(&self) -> &Path;

    /// Generate a command compiling one source to a position-independent object.
    fn compile_command(&self, input: &CompileInput) -> CommandSpec;

    /// Generate a command linking objects into a loadable shared library.
    ///
    /// Unresolved symbols must fail the link where the linker allows it.
    fn link_shared_command(&self, input: &LinkInput) -> CommandSpec;

    /// Linker input exporting exactly `exports`, if this toolchain needs one.
    ///
    /// Toolchains that export through command-line flags return `None`.
    fn export_list(&self, exports: &[String]) -> Option<ExportList>;

    /// How header dependencies are reported.
    fn dependency_format(&self) -> DependencyFormat;

    /// Compiler flags implied by a build profile.
    fn profile_cflags(&self, profile: Profile) -> Vec<String>;

    /// Get the object file extension.
    fn object_extension(&self) -> &str;

    /// Get the shared library extension.
    fn shared_lib_extension(&self) -> &str;
}

/// A generic wrapper that injects environment variables into all commands.
///
/// Used for MSVC, whose tools only work inside the environment captured
/// from `vcvarsall.bat`.
#[derive(Debug, Clone)]
pub struct EnvWrapper<T> {
    inner: T,
    env_vars: Vec<(String, String)>,
}

impl<T> EnvWrapper<T> {
    /// Create a new environment wrapper.
    pub fn new(inner: T, env_vars: Vec<(String, String)>) -> Self {
        EnvWrapper { inner, env_vars }
    }

    fn inject_env(&self, mut cmd: CommandSpec) -> CommandSpec {
        for (key, value) in &self.env_vars {
            cmd = cmd.env(key, value);
        }
        cmd
    }
}

impl<T: Toolchain> Toolchain for EnvWrapper<T> {
    fn platform(&self) -> ToolchainPlatform {
        self.inner.platform()
    }

    fn compiler_path(&self) -> &Path {
        self.inner.compiler_path()
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        self.inject_env(self.inner.compile_command(input))
    }

    fn link_shared_command(&self, input: &LinkInput) -> CommandSpec {
        self.inject_env(self.inner.link_shared_command(input))
    }

    fn export_list(&self, exports: &[String]) -> Option<ExportList> {
        self.inner.export_list(exports)
    }

    fn dependency_format(&self) -> DependencyFormat {
        self.inner.dependency_format()
    }

    fn profile_cflags(&self, profile: Profile) -> Vec<String> {
        self.inner.profile_cflags(profile)
    }

    fn object_extension(&self) -> &str {
        self.inner.object_extension()
    }

    fn shared_lib_extension(&self) -> &str {
        self.inner.shared_lib_extension()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_compile() -> CompileInput {
        CompileInput {
            source: PathBuf::from("main.c"),
            output: PathBuf::from("obj/main.o"),
            include_dirs: vec![PathBuf::from("os"), PathBuf::from("mw")],
            defines: vec![],
            cflags: vec![],
            depfile: Some(PathBuf::from("obj/main.d")),
        }
    }

    fn sample_link() -> LinkInput {
        LinkInput {
            objects: vec![PathBuf::from("obj/main.obj")],
            output: PathBuf::from("demo.dll"),
            lib_dirs: vec![],
            libs: vec![],
            exports: vec!["addme".to_string()],
            export_list: None,
            rpath: vec![],
            ldflags: vec![],
        }
    }

    #[test]
    fn test_env_wrapper_injects_env() {
        let wrapped = EnvWrapper::new(
            MsvcToolchain::new(PathBuf::from("cl.exe"), PathBuf::from("link.exe")),
            vec![("INCLUDE".to_string(), "C:\\VC\\include".to_string())],
        );

        let cmd = wrapped.compile_command(&sample_compile());
        assert_eq!(cmd.program, PathBuf::from("cl.exe"));
        assert!(cmd
            .env
            .contains(&("INCLUDE".to_string(), "C:\\VC\\include".to_string())));
        assert_eq!(wrapped.platform(), ToolchainPlatform::Msvc);
        assert_eq!(wrapped.dependency_format(), DependencyFormat::ShowIncludes);
        assert!(wrapped.export_list(&["addme".to_string()]).is_none());
        assert!(wrapped
            .link_shared_command(&sample_link())
            .program
            .ends_with("link.exe"));
    }

    #[test]
    fn test_argv_starts_with_program() {
        let cmd = CommandSpec::new("cc").arg("-c").args(["main.c", "-o", "main.o"]);
        assert_eq!(cmd.argv(), vec!["cc", "-c", "main.c", "-o", "main.o"]);
    }

    #[test]
    fn test_platform_names() {
        assert_eq!(ToolchainPlatform::AppleClang.to_string(), "apple-clang");
        assert_eq!(ToolchainPlatform::Gcc.as_str(), "gcc");
    }
}
