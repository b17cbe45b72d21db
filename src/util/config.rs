//! Configuration file support for cbind.
//!
//! Two kinds of files are read, each from two locations:
//! - `config.toml`: build defaults
//! - `toolchain.toml`: compiler overrides
//!
//! Global files live in `~/.cbind/`, project files in `.cbind/` next to the
//! manifest. Project settings take precedence over global ones.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Build defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub build: BuildConfig,
}

/// `[build]` section of `config.toml`.
///
/// Keys are kebab-case, like `Cbind.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Output directory, relative to the manifest directory
    pub out_dir: Option<PathBuf>,

    /// Always emit compile_commands.json
    pub emit_compile_commands: bool,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.out_dir.is_some() {
            self.build.out_dir = other.build.out_dir;
        }
        if other.build.emit_compile_commands {
            self.build.emit_compile_commands = true;
        }
    }
}

/// Toolchain overrides, kept apart from `config.toml` so a compiler can be
/// swapped without touching other settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub toolchain: ToolchainSettings,
}

/// `[toolchain]` section of `toolchain.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the C compiler (e.g., /usr/bin/clang)
    pub cc: Option<PathBuf>,

    /// Extra flags appended to every compile
    pub cflags: Vec<String>,

    /// Extra flags appended to every link
    pub ldflags: Vec<String>,
}

impl ToolchainConfig {
    /// Load toolchain configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read toolchain config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse toolchain config: {}", path.display()))
    }

    /// Load toolchain configuration with fallback to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to load toolchain config from {}: {:#}",
                    path.display(),
                    e
                );
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Whether a compiler override is configured.
    pub fn has_compiler_override(&self) -> bool {
        self.toolchain.cc.is_some()
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolchainConfig) {
        if other.toolchain.cc.is_some() {
            self.toolchain.cc = other.toolchain.cc;
        }
        if !other.toolchain.cflags.is_empty() {
            self.toolchain.cflags = other.toolchain.cflags;
        }
        if !other.toolchain.ldflags.is_empty() {
            self.toolchain.ldflags = other.toolchain.ldflags;
        }
    }
}

/// Load merged build configuration.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();
    if let Some(global) = global_path {
        config.merge(Config::load_or_default(global));
    }
    config.merge(Config::load_or_default(project_path));
    config
}

/// Load merged toolchain configuration.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.cbind/toolchain.toml)
/// 2. Global config (~/.cbind/toolchain.toml)
/// 3. Defaults
pub fn load_toolchain_config(global_path: Option<&Path>, project_path: &Path) -> ToolchainConfig {
    let mut config = ToolchainConfig::default();
    if let Some(global) = global_path {
        config.merge(ToolchainConfig::load_or_default(global));
    }
    config.merge(ToolchainConfig::load_or_default(project_path));
    config
}

/// Get the global cbind config directory (~/.cbind).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".cbind"))
}

/// Get the global config path (~/.cbind/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the global toolchain config path (~/.cbind/toolchain.toml).
pub fn global_toolchain_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("toolchain.toml"))
}

/// Get the project config path (.cbind/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".cbind").join("config.toml")
}

/// Get the project toolchain config path (.cbind/toolchain.toml).
pub fn project_toolchain_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".cbind").join("toolchain.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_toolchain_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");

        std::fs::write(
            &global,
            "[toolchain]\ncc = \"/usr/bin/gcc\"\ncflags = [\"-Wall\"]\n",
        )
        .unwrap();
        std::fs::write(&project, "[toolchain]\ncc = \"/usr/bin/clang\"\n").unwrap();

        let config = load_toolchain_config(Some(&global), &project);
        assert_eq!(config.toolchain.cc, Some(PathBuf::from("/usr/bin/clang")));
        assert_eq!(config.toolchain.cflags, vec!["-Wall".to_string()]);
        assert!(config.has_compiler_override());
    }

    #[test]
    fn test_missing_files_give_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_toolchain_config(None, &tmp.path().join("absent.toml"));
        assert!(!config.has_compiler_override());

        let build = load_config(None, &tmp.path().join("absent.toml"));
        assert!(build.build.out_dir.is_none());
        assert!(!build.build.emit_compile_commands);
    }

    #[test]
    fn test_broken_config_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[build\nout-dir = ").unwrap();

        let config = Config::load_or_default(&path);
        assert!(config.build.out_dir.is_none());
    }

    #[test]
    fn test_build_config_merge() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("config.toml");
        std::fs::write(
            &project,
            "[build]\nout-dir = \"build\"\nemit-compile-commands = true\n",
        )
        .unwrap();

        let config = load_config(None, &project);
        assert_eq!(config.build.out_dir, Some(PathBuf::from("build")));
        assert!(config.build.emit_compile_commands);
    }

    #[test]
    fn test_build_config_keys_are_kebab_case() {
        let config: Config = toml::from_str("[build]\nout_dir = \"build\"\n").unwrap();
        assert!(config.build.out_dir.is_none());

        let config: Config = toml::from_str("[build]\nout-dir = \"build\"\n").unwrap();
        assert_eq!(config.build.out_dir, Some(PathBuf::from("build")));
    }
}
