//! Implementation of `cbind init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::builder::bindings::types::{is_identifier, is_keyword};
use crate::core::manifest::MANIFEST_NAME;

/// Options for `cbind init`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Module name; defaults to the directory name
    pub name: Option<String>,
}

/// What `init` wrote.
#[derive(Debug)]
pub struct InitResult {
    pub manifest: PathBuf,
    /// Starter source, if one was created
    pub source: Option<PathBuf>,
    pub name: String,
}

/// Write a starter `Cbind.toml` (and a starter source) into `path`.
pub fn init_project(path: &Path, opts: &InitOptions) -> Result<InitResult> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }

    let manifest_path = path.join(MANIFEST_NAME);
    if manifest_path.exists() {
        bail!("`{}` already exists in `{}`", MANIFEST_NAME, path.display());
    }

    let name = match &opts.name {
        Some(name) => name.clone(),
        None => default_module_name(path),
    };
    if !is_identifier(&name) || is_keyword(&name) {
        bail!(
            "`{}` is not a valid module name\n\
             hint: use --name with a C identifier, e.g. `my_module`",
            name
        );
    }

    let source_rel = format!("src/{}.c", name);
    let source_path = path.join(&source_rel);
    let source = if source_path.exists() {
        None
    } else {
        let src_dir = path.join("src");
        fs::create_dir_all(&src_dir).with_context(|| "failed to create src directory")?;
        fs::write(&source_path, starter_source())
            .with_context(|| format!("failed to write {}", source_path.display()))?;
        Some(source_path)
    };

    fs::write(&manifest_path, starter_manifest(&name, &source_rel))
        .with_context(|| format!("failed to write {}", MANIFEST_NAME))?;

    Ok(InitResult {
        manifest: manifest_path,
        source,
        name,
    })
}

/// Derive a C identifier from a directory name.
fn default_module_name(path: &Path) -> String {
    let dir = path
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "module".to_string());

    let mut name: String = dir
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

fn starter_manifest(name: &str, source: &str) -> String {
    format!(
        r#"[module]
name = "{name}"
cdef = ["int addme(int a, int b);"]
sources = ["{source}"]

# preamble = '''
# #include "mylib.h"
# '''
# include-dirs = ["include"]
# libraries = ["mylib"]
# library-dirs = ["lib"]
# defines = ["NATIVE_COMPILE"]
"#
    )
}

fn starter_source() -> &'static str {
    "int addme(int a, int b)\n{\n    return a + b;\n}\n"
}
