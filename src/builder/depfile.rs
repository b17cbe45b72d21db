//! Header dependencies reported by the compiler.
//!
//! After a successful compile the executor asks the compiler which headers
//! the translation unit pulled in, at any depth, and fingerprints exactly
//! those. GCC and Clang write a Makefile rule (`-MMD -MF`); MSVC prints
//! `/showIncludes` notes on stdout.

use std::path::{Path, PathBuf};

use crate::builder::toolchain::DependencyFormat;
use crate::util::fs::resolve_against;

/// Prefix of an MSVC `/showIncludes` line.
const SHOW_INCLUDES_PREFIX: &str = "Note: including file:";

/// Headers a compile of `source` depended on.
///
/// Relative paths are resolved against `cwd`, the directory the compiler ran
/// in. A missing or unreadable dependency file yields no headers, so the
/// next build simply recompiles.
pub fn read_dependencies(
    format: DependencyFormat,
    source: &Path,
    depfile: &Path,
    stdout: &str,
    cwd: &Path,
) -> Vec<PathBuf> {
    let headers = match format {
        DependencyFormat::Makefile => match std::fs::read_to_string(depfile) {
            Ok(content) => parse_makefile_deps(&content),
            Err(e) => {
                tracing::debug!("no dependency file {}: {}", depfile.display(), e);
                Vec::new()
            }
        },
        DependencyFormat::ShowIncludes => parse_show_includes(stdout),
    };

    let mut resolved: Vec<PathBuf> = headers
        .into_iter()
        .map(|h| resolve_against(cwd, &h))
        .filter(|h| h != source)
        .collect();
    resolved.sort();
    resolved.dedup();
    resolved
}

/// Prerequisites of every rule in a Makefile-style dependency file.
pub fn parse_makefile_deps(content: &str) -> Vec<PathBuf> {
    let joined = content.replace("\\\r\n", " ").replace("\\\n", " ");
    let mut deps = Vec::new();

    for line in joined.lines() {
        let Some(prereqs) = rule_prerequisites(line) else {
            continue;
        };
        deps.extend(split_escaped(prereqs).into_iter().map(PathBuf::from));
    }

    deps
}

/// Text after the rule's `:` separator.
///
/// A colon followed by a path character is a drive letter (`C:\`), not the
/// separator.
fn rule_prerequisites(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b':' {
            continue;
        }
        match bytes.get(i + 1) {
            None => return Some(""),
            Some(c) if c.is_ascii_whitespace() => return Some(&line[i + 1..]),
            Some(_) => {}
        }
    }
    None
}

/// Split on whitespace, honoring `\ ` and `$$` escapes.
fn split_escaped(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                current.push(' ');
                chars.next();
            }
            '$' if chars.peek() == Some(&'$') => {
                current.push('$');
                chars.next();
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}

/// Headers named by `/showIncludes` notes.
pub fn parse_show_includes(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(SHOW_INCLUDES_PREFIX))
        .map(|path| PathBuf::from(path.trim()))
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}
