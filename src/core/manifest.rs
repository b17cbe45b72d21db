//! Cbind.toml manifest parsing and schema.
//!
//! The manifest is the on-disk form of a module: its declarations and its
//! build descriptor.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::declaration::Declarations;
use crate::core::descriptor::BuildDescriptor;

/// Manifest file name.
pub const MANIFEST_NAME: &str = "Cbind.toml";

/// Error locating a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not find `Cbind.toml` in `{}` or any parent directory", dir.display())]
    NotFound { dir: PathBuf },
}

/// One or more `cdef` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cdef {
    Single(String),
    Many(Vec<String>),
}

impl Cdef {
    pub fn as_slice(&self) -> &[String] {
        match self {
            Cdef::Single(s) => std::slice::from_ref(s),
            Cdef::Many(v) => v,
        }
    }
}

impl Default for Cdef {
    fn default() -> Self {
        Cdef::Many(Vec::new())
    }
}

/// `[module]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ModuleConfig {
    pub name: String,

    #[serde(default)]
    pub cdef: Cdef,

    #[serde(default)]
    pub preamble: String,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub libraries: Vec<String>,

    #[serde(default)]
    pub library_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub defines: Vec<String>,

    #[serde(default)]
    pub cflags: Vec<String>,

    #[serde(default)]
    pub ldflags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    module: ModuleConfig,
}

/// The parsed Cbind.toml manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub module: ModuleConfig,

    /// Path of the manifest file
    path: PathBuf,
}

impl Manifest {
    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawManifest = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(Manifest {
            module: raw.module,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative paths are resolved against.
    pub fn root(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Parse the `cdef` strings.
    pub fn declarations(&self) -> Result<Declarations> {
        Ok(Declarations::parse(self.module.cdef.as_slice())?)
    }

    /// Build descriptor for this module, rooted at the manifest directory.
    pub fn descriptor(&self) -> BuildDescriptor {
        let m = &self.module;
        BuildDescriptor {
            module_name: m.name.clone(),
            preamble: m.preamble.clone(),
            sources: m.sources.clone(),
            include_dirs: m.include_dirs.clone(),
            libraries: m.libraries.clone(),
            library_dirs: m.library_dirs.clone(),
            defines: m.defines.clone(),
            cflags: m.cflags.clone(),
            ldflags: m.ldflags.clone(),
            root: self.root().to_path_buf(),
        }
    }
}

/// Find `Cbind.toml` in `start` or the nearest parent directory.
pub fn find_manifest(start: &Path) -> Result<PathBuf, ManifestError> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(MANIFEST_NAME);
        if candidate.is_file() {
            return Ok(candidate);
        }
        if !current.pop() {
            return Err(ManifestError::NotFound {
                dir: start.to_path_buf(),
            });
        }
    }
}

/// Use an explicit manifest path, or search upward from `cwd`.
///
/// An explicit directory is taken to contain the manifest.
pub fn locate_manifest(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    match explicit {
        Some(path) => {
            let path = cwd.join(path);
            let path = if path.is_dir() {
                path.join(MANIFEST_NAME)
            } else {
                path
            };
            if !path.is_file() {
                anyhow::bail!("manifest not found: {}", path.display());
            }
            Ok(path)
        }
        None => Ok(find_manifest(cwd)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REFERENCE: &str = r#"
[module]
name = "python_and_c_interpreter"
cdef = ["int addme(int a, int b);", "int multiplyme(int a, int b);", "int main();"]
preamble = '''
#include "mw/mw_can.h"
#include "os/types.h"
'''
sources = ["main.c", "flags.c", "can1.c"]
include-dirs = ["os", "mw"]
libraries = ["mw"]
library-dirs = ["mw"]
defines = ["NATIVE_COMPILE"]
"#;

    #[test]
    fn test_parse_reference_manifest() {
        let manifest = Manifest::parse(REFERENCE, Path::new("/project/Cbind.toml")).unwrap();

        assert_eq!(manifest.module.name, "python_and_c_interpreter");
        assert_eq!(manifest.module.cdef.as_slice().len(), 3);
        assert_eq!(manifest.root(), Path::new("/project"));

        let desc = manifest.descriptor();
        assert_eq!(desc.include_dirs, vec![PathBuf::from("os"), PathBuf::from("mw")]);
        assert_eq!(desc.root, PathBuf::from("/project"));
        assert!(desc.preamble.contains("mw/mw_can.h"));

        let decls = manifest.declarations().unwrap();
        assert_eq!(decls.names(), vec!["addme", "multiplyme", "main"]);
    }

    #[test]
    fn test_single_cdef_string() {
        let content = "[module]\nname = \"m\"\ncdef = \"int addme(int a, int b); int main();\"\n";
        let manifest = Manifest::parse(content, Path::new("Cbind.toml")).unwrap();
        assert_eq!(manifest.declarations().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let content = "[module]\nname = \"m\"\ninclude_dirs = [\"os\"]\n";
        assert!(Manifest::parse(content, Path::new("Cbind.toml")).is_err());

        let content = "[module]\nname = \"m\"\n[package]\nname = \"m\"\n";
        assert!(Manifest::parse(content, Path::new("Cbind.toml")).is_err());
    }

    #[test]
    fn test_find_manifest_searches_upward() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), REFERENCE).unwrap();
        let nested = tmp.path().join("os").join("drivers");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_manifest(&nested).unwrap(), tmp.path().join(MANIFEST_NAME));
    }

    #[test]
    fn test_locate_explicit_directory() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_NAME), REFERENCE).unwrap();

        let found = locate_manifest(Some(tmp.path()), Path::new("/")).unwrap();
        assert_eq!(found, tmp.path().join(MANIFEST_NAME));

        let empty = TempDir::new().unwrap();
        assert!(locate_manifest(Some(empty.path()), Path::new("/")).is_err());
    }
}
