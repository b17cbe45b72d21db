//! Toolchain detection functions.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::util::config::{
    global_toolchain_config_path, load_toolchain_config, project_toolchain_config_path,
    ToolchainConfig,
};
use crate::util::diagnostic::suggestions;

#[cfg(target_os = "windows")]
use super::{EnvWrapper, MsvcToolchain};
use super::{GccToolchain, Toolchain, ToolchainPlatform};

/// Where the detected compiler came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainOrigin {
    /// `toolchain.toml`
    Config,
    /// The `CC` environment variable
    Environment,
    /// Visual Studio installation
    Msvc,
    /// Found on PATH
    Path,
}

impl fmt::Display for ToolchainOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolchainOrigin::Config => write!(f, "toolchain.toml"),
            ToolchainOrigin::Environment => write!(f, "CC environment variable"),
            ToolchainOrigin::Msvc => write!(f, "Visual Studio"),
            ToolchainOrigin::Path => write!(f, "PATH"),
        }
    }
}

/// A toolchain plus the extra flags configured for it.
pub struct DetectedToolchain {
    pub toolchain: Box<dyn Toolchain>,
    pub origin: ToolchainOrigin,
    /// Appended to every compile
    pub cflags: Vec<String>,
    /// Appended to every link
    pub ldflags: Vec<String>,
}

impl fmt::Debug for DetectedToolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectedToolchain")
            .field("platform", &self.toolchain.platform())
            .field("compiler", &self.toolchain.compiler_path())
            .field("origin", &self.origin)
            .field("cflags", &self.cflags)
            .field("ldflags", &self.ldflags)
            .finish()
    }
}

/// Load toolchain configuration for a project.
///
/// Project config (`.cbind/toolchain.toml` under `project_root`) takes
/// precedence over the global one (`~/.cbind/toolchain.toml`).
fn load_toolchain_config_from_files(project_root: &Path) -> ToolchainConfig {
    let project_path = project_toolchain_config_path(project_root);
    let global_path = global_toolchain_config_path();
    load_toolchain_config(global_path.as_deref(), &project_path)
}

/// Detect the available toolchain for the project rooted at `project_root`.
///
/// Tries to find a C compiler with the following priority:
/// 1. Toolchain config file (`.cbind/toolchain.toml` or `~/.cbind/toolchain.toml`)
/// 2. The `CC` environment variable
/// 3. On Windows with MSVC: Uses cl.exe and link.exe
/// 4. `cc`, `gcc` or `clang` on PATH
pub fn detect_toolchain(project_root: &Path) -> Result<DetectedToolchain> {
    let config = load_toolchain_config_from_files(project_root);

    let (toolchain, origin) = find_compiler(&config)?;
    tracing::info!(
        "using {} toolchain {} (from {})",
        toolchain.platform(),
        toolchain.compiler_path().display(),
        origin
    );

    Ok(DetectedToolchain {
        toolchain,
        origin,
        cflags: config.toolchain.cflags,
        ldflags: config.toolchain.ldflags,
    })
}

fn find_compiler(config: &ToolchainConfig) -> Result<(Box<dyn Toolchain>, ToolchainOrigin)> {
    if config.has_compiler_override() {
        if let Some(toolchain) = try_detect_from_config(config)? {
            return Ok((toolchain, ToolchainOrigin::Config));
        }
    }

    if let Some(toolchain) = try_detect_from_env()? {
        return Ok((toolchain, ToolchainOrigin::Environment));
    }

    if let Some(toolchain) = try_detect_msvc()? {
        return Ok((toolchain, ToolchainOrigin::Msvc));
    }

    if let Some(toolchain) = try_detect_gcc()? {
        return Ok((toolchain, ToolchainOrigin::Path));
    }

    bail!(
        "no C compiler found (looked for cc, gcc, clang and cl)\n\
         hint: {}",
        suggestions::NO_COMPILER
    )
}

/// Try to create a toolchain from config file settings.
fn try_detect_from_config(config: &ToolchainConfig) -> Result<Option<Box<dyn Toolchain>>> {
    let Some(cc) = &config.toolchain.cc else {
        return Ok(None);
    };

    let Some(cc) = resolve_program(cc) else {
        tracing::warn!("configured C compiler not found: {}", cc.display());
        return Ok(None);
    };

    let family = detect_compiler_family(&cc)?;
    Ok(Some(Box::new(GccToolchain::new(cc, family))))
}

/// Try the `CC` environment variable.
fn try_detect_from_env() -> Result<Option<Box<dyn Toolchain>>> {
    let Ok(cc_env) = std::env::var("CC") else {
        return Ok(None);
    };
    if cc_env.trim().is_empty() {
        return Ok(None);
    }

    let Some(cc) = resolve_program(Path::new(cc_env.trim())) else {
        tracing::warn!("CC is set to `{}` but it cannot be found", cc_env);
        return Ok(None);
    };

    let family = detect_compiler_family(&cc)?;
    Ok(Some(Box::new(GccToolchain::new(cc, family))))
}

/// Accept either an existing path or a bare program name on PATH.
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.exists() {
        return Some(program.to_path_buf());
    }
    if program.components().count() == 1 {
        return which::which(program).ok();
    }
    None
}

/// Try to detect MSVC toolchain.
#[cfg(target_os = "windows")]
fn try_detect_msvc() -> Result<Option<Box<dyn Toolchain>>> {
    use which::which;

    // Already inside a Developer Command Prompt
    if let Ok(cl) = which("cl") {
        if std::env::var("INCLUDE").is_ok() && std::env::var("LIB").is_ok() {
            let link = which("link")
                .map_err(|_| anyhow::anyhow!("MSVC cl.exe found but link.exe not in PATH"))?;
            return Ok(Some(Box::new(MsvcToolchain::new(cl, link))));
        }
    }

    try_auto_detect_msvc()
}

#[cfg(not(target_os = "windows"))]
fn try_detect_msvc() -> Result<Option<Box<dyn Toolchain>>> {
    Ok(None)
}

/// Try to auto-detect MSVC using vswhere.exe and vcvarsall.bat.
#[cfg(target_os = "windows")]
fn try_auto_detect_msvc() -> Result<Option<Box<dyn Toolchain>>> {
    use std::collections::HashMap;

    use crate::util::process::ProcessBuilder;

    let Some(vswhere) = find_vswhere() else {
        tracing::debug!("vswhere.exe not found, cannot auto-detect MSVC");
        return Ok(None);
    };

    let output = ProcessBuilder::new(&vswhere)
        .args([
            "-latest",
            "-requires",
            "Microsoft.VisualStudio.Component.VC.Tools.x86.x64",
            "-property",
            "installationPath",
            "-format",
            "value",
        ])
        .exec();

    let vs_path = match output {
        Ok(out) if out.status.success() => {
            let path = String::from_utf8_lossy(&out.stdout).trim().to_string();
            if path.is_empty() {
                tracing::debug!("vswhere returned empty path");
                return Ok(None);
            }
            PathBuf::from(path)
        }
        Ok(out) => {
            tracing::debug!("vswhere failed: {}", String::from_utf8_lossy(&out.stderr));
            return Ok(None);
        }
        Err(e) => {
            tracing::debug!("failed to run vswhere: {:#}", e);
            return Ok(None);
        }
    };

    let vcvarsall = vs_path
        .join("VC")
        .join("Auxiliary")
        .join("Build")
        .join("vcvarsall.bat");
    if !vcvarsall.exists() {
        tracing::debug!("vcvarsall.bat not found at: {}", vcvarsall.display());
        return Ok(None);
    }

    let arch = match std::env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "x86",
        "aarch64" => "arm64",
        other => {
            tracing::debug!("unsupported architecture for MSVC auto-detection: {}", other);
            return Ok(None);
        }
    };

    // A batch file sidesteps cmd.exe quoting rules
    let temp_batch = std::env::temp_dir().join("cbind_vcvars.bat");
    let batch_content = format!(
        "@echo off\r\ncall \"{}\" {} >nul 2>&1\r\nif errorlevel 1 exit /b 1\r\nset\r\n",
        vcvarsall.display(),
        arch
    );
    if let Err(e) = std::fs::write(&temp_batch, &batch_content) {
        tracing::debug!("failed to write temp batch file: {}", e);
        return Ok(None);
    }

    let output = ProcessBuilder::new("cmd").arg("/c").arg(&temp_batch).exec();
    let _ = std::fs::remove_file(&temp_batch);

    let env_output = match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).to_string(),
        Ok(out) => {
            tracing::warn!("vcvarsall.bat failed: {}", String::from_utf8_lossy(&out.stderr));
            return Ok(None);
        }
        Err(e) => {
            tracing::warn!("failed to run vcvarsall.bat: {:#}", e);
            return Ok(None);
        }
    };

    let env_vars: HashMap<String, String> = env_output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_uppercase(), v.to_string()))
        .collect();

    let Some(path_value) = env_vars.get("PATH").filter(|p| !p.is_empty()) else {
        tracing::warn!("vcvarsall.bat produced empty PATH");
        return Ok(None);
    };

    let (Some(cl), Some(link)) = find_msvc_tools_in_path(path_value) else {
        tracing::debug!("could not find MSVC tools in captured PATH");
        return Ok(None);
    };

    let important_vars = ["PATH", "INCLUDE", "LIB", "LIBPATH"];
    let captured_env: Vec<(String, String)> = important_vars
        .iter()
        .filter_map(|&key| env_vars.get(key).map(|v| (key.to_string(), v.clone())))
        .collect();

    Ok(Some(Box::new(EnvWrapper::new(
        MsvcToolchain::new(cl, link),
        captured_env,
    ))))
}

#[cfg(target_os = "windows")]
fn find_vswhere() -> Option<PathBuf> {
    let program_files_x86 = std::env::var("ProgramFiles(x86)")
        .unwrap_or_else(|_| "C:\\Program Files (x86)".to_string());

    let standard_path = PathBuf::from(&program_files_x86)
        .join("Microsoft Visual Studio")
        .join("Installer")
        .join("vswhere.exe");

    if standard_path.exists() {
        return Some(standard_path);
    }

    which::which("vswhere").ok()
}

/// Find cl.exe and link.exe in a PATH string.
#[cfg(target_os = "windows")]
fn find_msvc_tools_in_path(path: &str) -> (Option<PathBuf>, Option<PathBuf>) {
    let mut cl = None;
    let mut link = None;

    for dir in path.split(';').map(PathBuf::from) {
        if cl.is_none() && dir.join("cl.exe").exists() {
            cl = Some(dir.join("cl.exe"));
        }
        if link.is_none() && dir.join("link.exe").exists() {
            link = Some(dir.join("link.exe"));
        }
        if cl.is_some() && link.is_some() {
            break;
        }
    }

    (cl, link)
}

/// Try to find a GCC-style compiler on PATH.
fn try_detect_gcc() -> Result<Option<Box<dyn Toolchain>>> {
    use which::which;

    let cc = match which("cc")
        .or_else(|_| which("gcc"))
        .or_else(|_| which("clang"))
    {
        Ok(p) => p,
        Err(_) => return Ok(None),
    };

    let family = detect_compiler_family(&cc)?;
    Ok(Some(Box::new(GccToolchain::new(cc, family))))
}

/// Detect whether the compiler is GCC, Clang, or Apple Clang.
fn detect_compiler_family(cc: &Path) -> Result<ToolchainPlatform> {
    let name = cc
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    if name.contains("clang") {
        return Ok(detect_clang_variant(cc));
    } else if name.contains("gcc") {
        return Ok(ToolchainPlatform::Gcc);
    }

    let output = std::process::Command::new(cc).arg("--version").output();
    if let Ok(output) = output {
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        if stdout.contains("clang") {
            return Ok(detect_clang_variant(cc));
        } else if stdout.contains("gcc") || stdout.contains("free software foundation") {
            return Ok(ToolchainPlatform::Gcc);
        }
    }

    Ok(ToolchainPlatform::Gcc)
}

/// Detect if Clang is Apple Clang or regular Clang.
fn detect_clang_variant(cc: &Path) -> ToolchainPlatform {
    let output = std::process::Command::new(cc).arg("--version").output();

    if let Ok(output) = output {
        let stdout = String::from_utf8_lossy(&output.stdout).to_lowercase();
        if stdout.contains("apple") {
            return ToolchainPlatform::AppleClang;
        }
    }

    ToolchainPlatform::Clang
}
