//! GCC/Clang toolchain implementation.

use std::path::{Path, PathBuf};

use crate::builder::plan::Profile;

use super::{
    CommandSpec, CompileInput, DependencyFormat, ExportList, LinkInput, Toolchain,
    ToolchainPlatform,
};

/// GCC/Clang toolchain (Unix-like systems, MinGW).
#[derive(Debug, Clone)]
pub struct GccToolchain {
    /// Path to the C compiler, also used as the linker driver
    pub cc: PathBuf,
    /// Compiler family (gcc, clang, apple-clang)
    pub family: ToolchainPlatform,
}

impl GccToolchain {
    /// Create a new GCC-style toolchain.
    pub fn new(cc: PathBuf, family: ToolchainPlatform) -> Self {
        GccToolchain { cc, family }
    }

    /// Whether the linker understands `--no-undefined`.
    ///
    /// Apple's ld64 rejects it but already errors on undefined symbols.
    fn supports_no_undefined(&self) -> bool {
        !self.targets_apple()
    }

    fn targets_apple(&self) -> bool {
        self.family == ToolchainPlatform::AppleClang || cfg!(target_os = "macos")
    }

    /// Flag handing an export list to the linker.
    fn export_list_arg(&self, path: &Path) -> String {
        if self.targets_apple() {
            format!("-Wl,-exported_symbols_list,{}", path.display())
        } else if cfg!(windows) {
            // A .def file is passed like an input file
            path.display().to_string()
        } else {
            format!("-Wl,--version-script={}", path.display())
        }
    }
}

impl Toolchain for GccToolchain {
    fn platform(&self) -> ToolchainPlatform {
        self.family
    }

    fn compiler_path(&self) -> &Path {
        &self.cc
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cc);

        // Compile only
        cmd = cmd.arg("-c");

        // Every object ends up in a shared library
        if !cfg!(windows) {
            cmd = cmd.arg("-fPIC");
        }

        // Include directories
        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("-I{}", dir.display()));
        }

        // Defines
        for (name, value) in &input.defines {
            match value {
                Some(v) => cmd = cmd.arg(format!("-D{}={}", name, v)),
                None => cmd = cmd.arg(format!("-D{}", name)),
            }
        }

        // Custom flags
        cmd = cmd.args(input.cflags.iter().cloned());

        // Header dependencies, without system headers
        if let Some(depfile) = &input.depfile {
            cmd = cmd.arg("-MMD");
            cmd = cmd.arg("-MF");
            cmd = cmd.arg(depfile.display().to_string());
        }

        // Input and output
        cmd = cmd.arg(input.source.display().to_string());
        cmd = cmd.arg("-o");
        cmd = cmd.arg(input.output.display().to_string());

        cmd
    }

    fn link_shared_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cc);

        // Shared library flag
        cmd = cmd.arg("-shared");

        if self.supports_no_undefined() {
            cmd = cmd.arg("-Wl,--no-undefined");
        }

        if let Some(list) = &input.export_list {
            cmd = cmd.arg(self.export_list_arg(list));
        }

        // Output
        cmd = cmd.arg("-o");
        cmd = cmd.arg(input.output.display().to_string());

        // Object files
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        // Library search paths
        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("-L{}", dir.display()));
        }

        // Libraries
        for lib in &input.libs {
            cmd = cmd.arg(format!("-l{}", lib));
        }

        // Shared libraries from `library-dirs` must be found again at load time
        if !cfg!(windows) {
            for dir in &input.rpath {
                cmd = cmd.arg(format!("-Wl,-rpath,{}", dir.display()));
            }
        }

        // Custom flags
        cmd = cmd.args(input.ldflags.iter().cloned());

        cmd
    }

    fn export_list(&self, exports: &[String]) -> Option<ExportList> {
        let list = if self.targets_apple() {
            // Mach-O symbols carry a leading underscore
            ExportList {
                extension: "exp",
                contents: exports.iter().map(|name| format!("_{}\n", name)).collect(),
            }
        } else if cfg!(windows) {
            let mut contents = String::from("EXPORTS\n");
            for name in exports {
                contents.push_str(&format!("    {}\n", name));
            }
            ExportList {
                extension: "def",
                contents,
            }
        } else {
            let mut contents = String::from("{\n  global:\n");
            for name in exports {
                contents.push_str(&format!("    {};\n", name));
            }
            contents.push_str("  local:\n    *;\n};\n");
            ExportList {
                extension: "map",
                contents,
            }
        };
        Some(list)
    }

    fn dependency_format(&self) -> DependencyFormat {
        DependencyFormat::Makefile
    }

    fn profile_cflags(&self, profile: Profile) -> Vec<String> {
        match profile {
            Profile::Debug => vec!["-g".to_string(), "-O0".to_string()],
            Profile::Release => vec!["-O2".to_string()],
        }
    }

    fn object_extension(&self) -> &str {
        "o"
    }

    fn shared_lib_extension(&self) -> &str {
        if cfg!(target_os = "macos") {
            "dylib"
        } else if cfg!(windows) {
            "dll"
        } else {
            "so"
        }
    }
}
