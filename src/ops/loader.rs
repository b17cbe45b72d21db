//! Loading built modules.
//!
//! Opens a module with the platform's dynamic loader, checks that declared
//! symbols are present, and calls functions with plain `int` signatures.
//!
//! A module exports only its declared functions, so it cannot describe
//! itself. `cbind build` writes a [`ModuleMetadata`] file next to it instead,
//! which lets `cbind symbols` and `cbind call` work without a manifest.

use std::ffi::{c_int, c_void};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use libloading::{Library, Symbol};
use serde::{Deserialize, Serialize};

use crate::builder::bindings::{CFunction, DeclarationParser};
use crate::builder::errors::BindError;
use crate::core::declaration::Declarations;
use crate::util::fs::write_if_changed;

/// Most arguments [`LoadedModule::call`] can pass.
pub const MAX_CALL_ARGS: usize = 4;

/// Suffix of the metadata file, which replaces the module's extension.
pub const METADATA_EXTENSION: &str = "cbind.json";

/// One function exported by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub name: String,
    pub signature: String,
}

/// What a built module exports, stored beside it as
/// `<module>.cbind.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Module name from the manifest
    pub module: String,

    /// Exports in declaration order
    pub exports: Vec<ExportEntry>,
}

impl ModuleMetadata {
    /// Metadata file for the module at `artifact`.
    pub fn path_for(artifact: &Path) -> PathBuf {
        artifact.with_extension(METADATA_EXTENSION)
    }

    /// Read the metadata of the module at `artifact`.
    pub fn load(artifact: &Path) -> Result<Self> {
        let path = Self::path_for(artifact);
        if !path.exists() {
            bail!(
                "no module metadata at {}\n\
                 hint: rebuild the module with `cbind build`, or pass --manifest",
                path.display()
            );
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Write the metadata beside the module at `artifact`.
    pub fn save(&self, artifact: &Path) -> Result<()> {
        let path = Self::path_for(artifact);
        let content = serde_json::to_string_pretty(self)?;
        write_if_changed(&path, &content)?;
        Ok(())
    }
}

/// A module opened with the dynamic loader.
pub struct LoadedModule {
    library: Library,
    path: PathBuf,
    functions: Vec<CFunction>,
    /// Module name, when opened from its metadata
    module: Option<String>,
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("path", &self.path)
            .field("functions", &self.functions.len())
            .finish()
    }
}

impl LoadedModule {
    /// Open `path` and resolve every declared symbol.
    pub fn open(path: &Path, declarations: &Declarations) -> Result<Self, BindError> {
        let module = LoadedModule {
            library: load_library(path)?,
            path: path.to_path_buf(),
            functions: declarations.iter().cloned().collect(),
            module: None,
        };
        module.check_symbols()?;
        Ok(module)
    }

    /// Open `path` without a manifest, taking the declarations from the
    /// metadata file `cbind build` wrote next to it.
    pub fn open_self_described(path: &Path) -> Result<Self> {
        let metadata = ModuleMetadata::load(path)?;

        let parser = DeclarationParser::new();
        let mut functions = Vec::with_capacity(metadata.exports.len());
        for entry in &metadata.exports {
            let mut parsed = parser
                .parse(&format!("{};", entry.signature))
                .with_context(|| format!("bad signature in module metadata: {}", entry.signature))?;
            functions.append(&mut parsed);
        }

        let module = LoadedModule {
            library: load_library(path)?,
            path: path.to_path_buf(),
            functions,
            module: Some(metadata.module),
        };
        module.check_symbols()?;
        Ok(module)
    }

    fn check_symbols(&self) -> Result<(), BindError> {
        for function in &self.functions {
            if !self.has_symbol(&function.name) {
                return Err(BindError::MissingSymbol {
                    symbol: function.name.clone(),
                    artifact: self.path.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the module exports `name`.
    pub fn has_symbol(&self, name: &str) -> bool {
        // SAFETY: only the address is read; the symbol is never called.
        unsafe { self.library.get::<*const c_void>(name.as_bytes()) }.is_ok()
    }

    /// Exported functions in declaration order.
    pub fn symbols(&self) -> Vec<ExportEntry> {
        self.functions
            .iter()
            .map(|f| ExportEntry {
                name: f.name.clone(),
                signature: f.signature(),
            })
            .collect()
    }

    /// Module name, known when the module was opened from its metadata.
    pub fn module_name(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Metadata describing this module's exports.
    pub fn metadata(&self, module: &str) -> ModuleMetadata {
        ModuleMetadata {
            module: module.to_string(),
            exports: self.symbols(),
        }
    }

    /// Call an exported function whose parameters are all `int`.
    ///
    /// The function must return `int` or `void`; a `void` function yields 0.
    pub fn call(&self, name: &str, args: &[i64]) -> Result<i64> {
        let function = self
            .functions
            .iter()
            .find(|f| f.name == name)
            .with_context(|| format!("`{}` is not a declared function of {}", name, self.path.display()))?;

        check_callable(function, args.len())?;

        let mut ints = Vec::with_capacity(args.len());
        for &arg in args {
            let value = c_int::try_from(arg)
                .with_context(|| format!("argument {} does not fit in a C int", arg))?;
            ints.push(value);
        }

        let returns_void = function.return_type.is_void();
        tracing::debug!("calling {}", function.signature());

        // SAFETY: `check_callable` verified that the declared signature
        // matches the function pointer type used for each arm, and the
        // declaration was checked against the headers when the module was
        // built.
        let value = unsafe {
            match (returns_void, ints.as_slice()) {
                (false, []) => self.symbol::<unsafe extern "C" fn() -> c_int>(name)?(),
                (false, &[a]) => self.symbol::<unsafe extern "C" fn(c_int) -> c_int>(name)?(a),
                (false, &[a, b]) => {
                    self.symbol::<unsafe extern "C" fn(c_int, c_int) -> c_int>(name)?(a, b)
                }
                (false, &[a, b, c]) => self
                    .symbol::<unsafe extern "C" fn(c_int, c_int, c_int) -> c_int>(name)?(
                    a, b, c,
                ),
                (false, &[a, b, c, d]) => self
                    .symbol::<unsafe extern "C" fn(c_int, c_int, c_int, c_int) -> c_int>(name)?(
                    a, b, c, d,
                ),
                (true, []) => {
                    self.symbol::<unsafe extern "C" fn()>(name)?();
                    0
                }
                (true, &[a]) => {
                    self.symbol::<unsafe extern "C" fn(c_int)>(name)?(a);
                    0
                }
                (true, &[a, b]) => {
                    self.symbol::<unsafe extern "C" fn(c_int, c_int)>(name)?(a, b);
                    0
                }
                (true, &[a, b, c]) => {
                    self.symbol::<unsafe extern "C" fn(c_int, c_int, c_int)>(name)?(a, b, c);
                    0
                }
                (true, &[a, b, c, d]) => {
                    self.symbol::<unsafe extern "C" fn(c_int, c_int, c_int, c_int)>(name)?(
                        a, b, c, d,
                    );
                    0
                }
                _ => bail!("`{}` takes more than {} arguments", name, MAX_CALL_ARGS),
            }
        };

        Ok(i64::from(value))
    }

    /// Copy a function pointer of type `F` out of the library.
    ///
    /// # Safety
    ///
    /// `F` must match the symbol's real type.
    unsafe fn symbol<F: Copy>(&self, name: &str) -> Result<F> {
        let sym: Symbol<F> = self
            .library
            .get(name.as_bytes())
            .with_context(|| format!("symbol `{}` not found in {}", name, self.path.display()))?;
        Ok(*sym)
    }
}

fn load_library(path: &Path) -> Result<Library, BindError> {
    // SAFETY: loading runs the module's initializers. Modules are built
    // from the user's own sources.
    unsafe { Library::new(path) }.map_err(|e| BindError::Load {
        artifact: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Check that `function` can be called with `argc` `int` arguments.
pub fn check_callable(function: &CFunction, argc: usize) -> Result<()> {
    if function.variadic {
        bail!("`{}` is variadic and cannot be called", function.signature());
    }
    if !function.return_type.is_c_int() && !function.return_type.is_void() {
        bail!(
            "`{}` returns `{}`; only `int` and `void` returns can be called",
            function.name,
            function.return_type
        );
    }
    if let Some(param) = function.params.iter().find(|p| !p.param_type.is_c_int()) {
        bail!(
            "`{}` takes a `{}` parameter; only `int` parameters can be passed",
            function.name,
            param.param_type
        );
    }
    if function.params.len() > MAX_CALL_ARGS {
        bail!(
            "`{}` takes {} parameters; at most {} are supported",
            function.name,
            function.params.len(),
            MAX_CALL_ARGS
        );
    }
    if function.params.len() != argc {
        bail!(
            "`{}` takes {} argument(s) but {} were given",
            function.name,
            function.params.len(),
            argc
        );
    }
    Ok(())
}
