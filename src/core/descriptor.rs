//! Build descriptor: what to compile and link into a module.
//!
//! A [`BuildDescriptor`] holds paths as written by the user. Validation
//! resolves them against the manifest directory and checks that they exist,
//! producing a [`ResolvedDescriptor`] the planner can use directly.

use std::path::{Path, PathBuf};

use crate::builder::bindings::types::is_identifier;
use crate::builder::errors::{BindError, DirKind};
use crate::util::fs::{glob_files, is_glob_pattern, resolve_against};

/// Everything needed to build one module, as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildDescriptor {
    /// Module name; also the artifact's file stem
    pub module_name: String,

    /// C text placed at the top of the glue source
    pub preamble: String,

    /// Source files or glob patterns
    pub sources: Vec<String>,

    pub include_dirs: Vec<PathBuf>,

    /// Library names without `lib` prefix or extension
    pub libraries: Vec<String>,

    pub library_dirs: Vec<PathBuf>,

    /// `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,

    pub cflags: Vec<String>,

    pub ldflags: Vec<String>,

    /// Base directory for relative paths
    pub root: PathBuf,
}

/// A validated descriptor with absolute, existing paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDescriptor {
    pub module_name: String,
    pub preamble: String,
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub library_dirs: Vec<PathBuf>,
    pub defines: Vec<(String, Option<String>)>,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub root: PathBuf,
}

impl BuildDescriptor {
    /// Create an empty descriptor for `module_name`, rooted at `root`.
    pub fn new(module_name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        BuildDescriptor {
            module_name: module_name.into(),
            root: root.into(),
            ..Default::default()
        }
    }

    /// Validate names and paths.
    ///
    /// Every configuration problem is reported before any source is looked
    /// at, so a missing include or library directory always wins over a
    /// missing source file.
    pub fn validate(&self) -> Result<ResolvedDescriptor, BindError> {
        if !is_identifier(&self.module_name) {
            return Err(BindError::InvalidModuleName {
                name: self.module_name.clone(),
            });
        }

        let defines = self
            .defines
            .iter()
            .map(|d| parse_define(d))
            .collect::<Result<Vec<_>, _>>()?;

        for lib in &self.libraries {
            if !is_valid_library_name(lib) {
                return Err(BindError::InvalidLibrary { name: lib.clone() });
            }
        }

        let include_dirs = self.resolve_dirs(&self.include_dirs, DirKind::Include)?;
        let library_dirs = self.resolve_dirs(&self.library_dirs, DirKind::Library)?;
        let sources = self.resolve_sources()?;

        Ok(ResolvedDescriptor {
            module_name: self.module_name.clone(),
            preamble: self.preamble.clone(),
            sources,
            include_dirs,
            libraries: self.libraries.clone(),
            library_dirs,
            defines,
            cflags: self.cflags.clone(),
            ldflags: self.ldflags.clone(),
            root: self.root.clone(),
        })
    }

    fn resolve_dirs(&self, dirs: &[PathBuf], kind: DirKind) -> Result<Vec<PathBuf>, BindError> {
        let mut resolved = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let path = resolve_against(&self.root, dir);
            if !path.is_dir() {
                return Err(BindError::MissingDirectory { kind, path });
            }
            if !resolved.contains(&path) {
                resolved.push(path);
            }
        }
        Ok(resolved)
    }

    /// Expand sources in listed order. A pattern that matches nothing is a
    /// missing source.
    fn resolve_sources(&self) -> Result<Vec<PathBuf>, BindError> {
        let mut resolved: Vec<PathBuf> = Vec::new();

        for source in &self.sources {
            let matches = if is_glob_pattern(source) {
                glob_files(&self.root, source).map_err(|e| BindError::InvalidSourcePattern {
                    pattern: source.clone(),
                    message: format!("{:#}", e),
                })?
            } else {
                let path = resolve_against(&self.root, Path::new(source));
                if path.is_file() {
                    vec![path]
                } else {
                    Vec::new()
                }
            };

            if matches.is_empty() {
                return Err(BindError::MissingSource {
                    path: resolve_against(&self.root, Path::new(source)),
                });
            }

            for path in matches {
                if !resolved.contains(&path) {
                    resolved.push(path);
                }
            }
        }

        Ok(resolved)
    }
}

/// Split `NAME` or `NAME=VALUE`.
pub fn parse_define(define: &str) -> Result<(String, Option<String>), BindError> {
    let (name, value) = match define.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.to_string())),
        None => (define.trim(), None),
    };

    if !is_identifier(name) {
        return Err(BindError::InvalidDefine {
            define: define.to_string(),
        });
    }
    Ok((name.to_string(), value))
}

fn is_valid_library_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::errors::ErrorKind;
    use tempfile::TempDir;

    /// Lay out the reference project: three sources, `os/` and `mw/`.
    fn project() -> (TempDir, BuildDescriptor) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("os")).unwrap();
        std::fs::create_dir_all(root.join("mw")).unwrap();
        for name in ["main.c", "flags.c", "can1.c"] {
            std::fs::write(root.join(name), "").unwrap();
        }

        let mut desc = BuildDescriptor::new("python_and_c_interpreter", root);
        desc.sources = vec!["main.c".into(), "flags.c".into(), "can1.c".into()];
        desc.include_dirs = vec![PathBuf::from("os"), PathBuf::from("mw")];
        desc.libraries = vec!["mw".into()];
        desc.library_dirs = vec![PathBuf::from("mw")];
        (tmp, desc)
    }

    #[test]
    fn test_valid_descriptor_resolves_paths() {
        let (tmp, desc) = project();
        let resolved = desc.validate().unwrap();

        assert_eq!(resolved.sources.len(), 3);
        assert_eq!(resolved.sources[0], tmp.path().join("main.c"));
        assert_eq!(resolved.include_dirs[1], tmp.path().join("mw"));
        assert_eq!(resolved.library_dirs, vec![tmp.path().join("mw")]);
    }

    #[test]
    fn test_missing_library_dir_is_configuration_error() {
        let (tmp, desc) = project();
        std::fs::remove_dir_all(tmp.path().join("mw")).unwrap();

        let err = desc.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(err, BindError::MissingDirectory { kind: DirKind::Include, .. }));
    }

    #[test]
    fn test_missing_dir_wins_over_missing_source() {
        let (tmp, mut desc) = project();
        desc.library_dirs = vec![PathBuf::from("lib")];
        std::fs::remove_file(tmp.path().join("can1.c")).unwrap();

        let err = desc.validate().unwrap_err();
        assert!(matches!(err, BindError::MissingDirectory { kind: DirKind::Library, .. }));
    }

    #[test]
    fn test_missing_source_is_compilation_error() {
        let (tmp, desc) = project();
        std::fs::remove_file(tmp.path().join("flags.c")).unwrap();

        let err = desc.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compilation);
        match err {
            BindError::MissingSource { path } => assert_eq!(path, tmp.path().join("flags.c")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_glob_sources() {
        let (tmp, mut desc) = project();
        std::fs::create_dir_all(tmp.path().join("can")).unwrap();
        std::fs::write(tmp.path().join("can").join("can2.c"), "").unwrap();
        std::fs::write(tmp.path().join("can").join("can3.c"), "").unwrap();
        desc.sources.push("can/*.c".into());
        desc.sources.push("main.c".into());

        let resolved = desc.validate().unwrap();
        assert_eq!(resolved.sources.len(), 5);
        assert_eq!(resolved.sources[3], tmp.path().join("can").join("can2.c"));

        desc.sources.push("drivers/*.c".into());
        assert!(matches!(
            desc.validate().unwrap_err(),
            BindError::MissingSource { .. }
        ));
    }

    #[test]
    fn test_invalid_names() {
        let (_tmp, mut desc) = project();
        desc.module_name = "python-and-c".into();
        assert!(matches!(
            desc.validate().unwrap_err(),
            BindError::InvalidModuleName { .. }
        ));

        let (_tmp, mut desc) = project();
        desc.libraries = vec!["-lmw".into()];
        assert!(matches!(desc.validate().unwrap_err(), BindError::InvalidLibrary { .. }));
    }

    #[test]
    fn test_parse_define() {
        assert_eq!(
            parse_define("NATIVE_COMPILE").unwrap(),
            ("NATIVE_COMPILE".to_string(), None)
        );
        assert_eq!(
            parse_define("CAN_BAUD=500000").unwrap(),
            ("CAN_BAUD".to_string(), Some("500000".to_string()))
        );
        assert!(parse_define("-DFOO").is_err());
        assert!(parse_define("=1").is_err());
    }
}
