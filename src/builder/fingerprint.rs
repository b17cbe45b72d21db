//! Build fingerprinting for incremental builds.
//!
//! Fingerprints capture all inputs to a build step, allowing us to skip
//! rebuilding when nothing has changed.
//!
//! The headers of a compile step are not known up front. The compiler
//! reports them (see [`crate::builder::depfile`]) and they are stored with
//! the step's fingerprint; the next build re-hashes that recorded set.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::hash::{sha256_file, Fingerprint as HashFingerprint};

/// File name of the cache inside the profile output directory.
pub const CACHE_FILE: &str = ".fingerprints.json";

/// Fingerprint for a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileFingerprint {
    /// Source file hash
    pub source_hash: String,

    /// Compiler path
    pub compiler: String,

    /// Effective flags hash
    pub flags_hash: String,

    /// Hashes of the headers the last successful compile included
    pub header_hashes: BTreeMap<PathBuf, String>,
}

impl CompileFingerprint {
    /// Create a fingerprint for a source file.
    ///
    /// `flags` should be the full argument list handed to the compiler.
    /// A header in `headers` that no longer exists is left out, which makes
    /// the fingerprint differ from one recorded while it existed.
    pub fn for_source(
        source: &Path,
        compiler: &str,
        flags: &[String],
        headers: &[PathBuf],
    ) -> Result<Self> {
        let source_hash = sha256_file(source)?;

        let mut fp = HashFingerprint::new();
        fp.update_strs(flags.iter().map(String::as_str));
        let flags_hash = fp.finish_short();

        let mut header_hashes = BTreeMap::new();
        for header in headers {
            if header.exists() {
                header_hashes.insert(header.clone(), sha256_file(header)?);
            }
        }

        Ok(CompileFingerprint {
            source_hash,
            compiler: compiler.to_string(),
            flags_hash,
            header_hashes,
        })
    }

    /// Check if the fingerprint matches (nothing has changed).
    pub fn matches(&self, other: &CompileFingerprint) -> bool {
        self == other
    }
}

/// Fingerprint for a link step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkFingerprint {
    /// Object file hashes
    pub object_hashes: BTreeMap<PathBuf, String>,

    /// Hashes of other link inputs: library files and the export list
    pub input_hashes: BTreeMap<PathBuf, String>,

    /// Linker program
    pub linker: String,

    /// Hash of the link arguments
    pub flags_hash: String,
}

impl LinkFingerprint {
    /// Create a fingerprint for a link step.
    pub fn for_link(
        objects: &[PathBuf],
        inputs: &[PathBuf],
        linker: &str,
        flags: &[String],
    ) -> Result<Self> {
        let mut object_hashes = BTreeMap::new();
        for obj in objects {
            if obj.exists() {
                object_hashes.insert(obj.clone(), sha256_file(obj)?);
            }
        }

        let mut input_hashes = BTreeMap::new();
        for input in inputs {
            if input.exists() {
                input_hashes.insert(input.clone(), sha256_file(input)?);
            }
        }

        let mut fp = HashFingerprint::new();
        fp.update_strs(flags.iter().map(String::as_str));
        let flags_hash = fp.finish_short();

        Ok(LinkFingerprint {
            object_hashes,
            input_hashes,
            linker: linker.to_string(),
            flags_hash,
        })
    }

    /// Check if the fingerprint matches.
    pub fn matches(&self, other: &LinkFingerprint) -> bool {
        self == other
    }
}

/// Fingerprint cache for one output directory.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FingerprintCache {
    /// Compile fingerprints by source path
    pub compile: BTreeMap<PathBuf, CompileFingerprint>,

    /// Link fingerprints by module name
    pub link: BTreeMap<String, LinkFingerprint>,
}

impl FingerprintCache {
    /// Load fingerprint cache from a file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(FingerprintCache::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cache: FingerprintCache = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cache)
    }

    /// Load the cache, starting fresh if it is unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("ignoring fingerprint cache: {:#}", e);
            FingerprintCache::default()
        })
    }

    /// Save fingerprint cache to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Check if a source file needs recompilation.
    pub fn needs_compile(&self, source: &Path, current: &CompileFingerprint) -> bool {
        match self.compile.get(source) {
            Some(cached) => !cached.matches(current),
            None => true,
        }
    }

    /// Check if a module needs relinking.
    pub fn needs_link(&self, module: &str, current: &LinkFingerprint) -> bool {
        match self.link.get(module) {
            Some(cached) => !cached.matches(current),
            None => true,
        }
    }

    /// Headers recorded for `source` by its last successful compile.
    pub fn recorded_headers(&self, source: &Path) -> Vec<PathBuf> {
        self.compile
            .get(source)
            .map(|fp| fp.header_hashes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Update compile fingerprint.
    pub fn update_compile(&mut self, source: PathBuf, fingerprint: CompileFingerprint) {
        self.compile.insert(source, fingerprint);
    }

    /// Update link fingerprint.
    pub fn update_link(&mut self, module: String, fingerprint: LinkFingerprint) {
        self.link.insert(module, fingerprint);
    }

    /// Forget a source, so the next build recompiles it.
    pub fn invalidate_compile(&mut self, source: &Path) {
        self.compile.remove(source);
    }
}
