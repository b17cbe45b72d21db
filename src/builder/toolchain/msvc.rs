//! MSVC toolchain implementation.

use std::path::{Path, PathBuf};

use crate::builder::plan::Profile;

use super::{
    CommandSpec, CompileInput, DependencyFormat, ExportList, LinkInput, Toolchain,
    ToolchainPlatform,
};

/// MSVC toolchain (Windows).
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    /// Path to cl.exe (compiler)
    pub cl: PathBuf,
    /// Path to link.exe (linker)
    pub link: PathBuf,
}

impl MsvcToolchain {
    /// Create a new MSVC toolchain.
    pub fn new(cl: PathBuf, link: PathBuf) -> Self {
        MsvcToolchain { cl, link }
    }
}

impl Toolchain for MsvcToolchain {
    fn platform(&self) -> ToolchainPlatform {
        ToolchainPlatform::Msvc
    }

    fn compiler_path(&self) -> &Path {
        &self.cl
    }

    fn compile_command(&self, input: &CompileInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.cl);

        // Quiet logo, compile only
        cmd = cmd.arg("/nologo");
        cmd = cmd.arg("/c");

        // Include directories
        for dir in &input.include_dirs {
            cmd = cmd.arg(format!("/I{}", dir.display()));
        }

        // Defines
        for (name, value) in &input.defines {
            match value {
                Some(v) => cmd = cmd.arg(format!("/D{}={}", name, v)),
                None => cmd = cmd.arg(format!("/D{}", name)),
            }
        }

        // Custom flags
        cmd = cmd.args(input.cflags.iter().cloned());

        // Headers are listed on stdout; cl.exe has no dependency file
        if input.depfile.is_some() {
            cmd = cmd.arg("/showIncludes");
        }

        // Input
        cmd = cmd.arg(input.source.display().to_string());

        // Output
        cmd = cmd.arg(format!("/Fo{}", input.output.display()));

        cmd
    }

    fn link_shared_command(&self, input: &LinkInput) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.link);

        cmd = cmd.arg("/nologo");
        cmd = cmd.arg("/DLL");
        cmd = cmd.arg(format!("/OUT:{}", input.output.display()));

        // DLLs export nothing unless asked
        for symbol in &input.exports {
            cmd = cmd.arg(format!("/EXPORT:{}", symbol));
        }

        // Object files
        for obj in &input.objects {
            cmd = cmd.arg(obj.display().to_string());
        }

        // Library search paths
        for dir in &input.lib_dirs {
            cmd = cmd.arg(format!("/LIBPATH:{}", dir.display()));
        }

        // Libraries
        for lib in &input.libs {
            cmd = cmd.arg(format!("{}.lib", lib));
        }

        // Custom flags
        cmd = cmd.args(input.ldflags.iter().cloned());

        cmd
    }

    fn export_list(&self, _exports: &[String]) -> Option<ExportList> {
        // `/EXPORT:` flags already name every export
        None
    }

    fn dependency_format(&self) -> DependencyFormat {
        DependencyFormat::ShowIncludes
    }

    fn profile_cflags(&self, profile: Profile) -> Vec<String> {
        match profile {
            Profile::Debug => vec!["/Zi".to_string(), "/Od".to_string()],
            Profile::Release => vec!["/O2".to_string()],
        }
    }

    fn object_extension(&self) -> &str {
        "obj"
    }

    fn shared_lib_extension(&self) -> &str {
        "dll"
    }
}
