//! Implementation of `cbind check`.
//!
//! Runs every validation `cbind build` runs before spawning a compiler and
//! reports the plan it would execute. Nothing is written to disk.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;

use crate::builder::toolchain::ToolchainOrigin;
use crate::builder::{detect_toolchain, BuildPlan, ToolchainPlatform};
use crate::core::Manifest;
use crate::ops::generate::{target_dir, BuildOptions};
use crate::util::diagnostic::Diagnostic;

/// What `cbind build` would do.
#[derive(Debug)]
pub struct CheckReport {
    pub module: String,
    pub signatures: Vec<String>,
    pub compiler: PathBuf,
    pub platform: ToolchainPlatform,
    pub origin: ToolchainOrigin,
    pub glue_source: PathBuf,
    pub objects: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub artifact: PathBuf,
    /// Problems that do not stop the build
    pub warnings: Vec<Diagnostic>,
}

/// Validate `manifest` and plan its build without running it.
pub fn check(manifest: &Manifest, opts: &BuildOptions) -> Result<CheckReport> {
    let declarations = manifest.declarations()?;
    let descriptor = manifest.descriptor().validate()?;
    let toolchain = detect_toolchain(manifest.root())?;

    let profile = opts.profile();
    let out_dir = target_dir(manifest, opts.out_dir.as_deref()).join(profile.as_str());
    let plan = BuildPlan::new(&descriptor, &declarations, &toolchain, profile, &out_dir);

    let warnings = plan
        .link_step
        .unresolved_libraries()
        .into_iter()
        .map(|lib| {
            Diagnostic::warning(format!("library `{}` not found in `library-dirs`", lib))
                .with_context("the linker will look for it in its default search path")
                .with_suggestion(format!(
                    "Add the directory containing lib{}.a to `library-dirs` if it is not a system library",
                    lib
                ))
        })
        .collect();

    Ok(CheckReport {
        module: plan.module.clone(),
        signatures: declarations.iter().map(|f| f.signature()).collect(),
        compiler: toolchain.toolchain.compiler_path().to_path_buf(),
        platform: toolchain.toolchain.platform(),
        origin: toolchain.origin,
        glue_source: plan.glue_source.clone(),
        objects: plan.link_step.objects.clone(),
        libraries: plan.link_step.libs.clone(),
        artifact: plan.artifact().to_path_buf(),
        warnings,
    })
}

/// Render a report for the terminal.
pub fn format_report(report: &CheckReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "module:    {}", report.module);
    let _ = writeln!(
        out,
        "toolchain: {} ({}, from {})",
        report.compiler.display(),
        report.platform,
        report.origin
    );
    let _ = writeln!(out, "glue:      {}", report.glue_source.display());
    let _ = writeln!(out, "artifact:  {}", report.artifact.display());

    let _ = writeln!(out, "exports:");
    for sig in &report.signatures {
        let _ = writeln!(out, "  {}", sig);
    }

    let _ = writeln!(out, "objects:");
    for obj in &report.objects {
        let _ = writeln!(out, "  {}", obj.display());
    }

    if !report.libraries.is_empty() {
        let _ = writeln!(out, "libraries: {}", report.libraries.join(", "));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BindError, ErrorKind};
    use tempfile::TempDir;

    #[test]
    fn test_check_rejects_conflicting_declarations() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Cbind.toml");
        std::fs::write(
            &path,
            r#"
[module]
name = "demo"
cdef = ["int addme(int a, int b);", "long addme(long a, long b);"]
"#,
        )
        .unwrap();
        let manifest = Manifest::load(&path).unwrap();

        let err = check(&manifest, &BuildOptions::default()).unwrap_err();
        let bind = err.downcast_ref::<BindError>().unwrap();
        assert_eq!(bind.kind(), ErrorKind::Configuration);
        assert!(matches!(bind, BindError::ConflictingDeclaration { .. }));
    }

    #[test]
    fn test_format_report() {
        let report = CheckReport {
            module: "demo".to_string(),
            signatures: vec!["int addme(int a, int b)".to_string()],
            compiler: PathBuf::from("/usr/bin/cc"),
            platform: ToolchainPlatform::Gcc,
            origin: ToolchainOrigin::Path,
            glue_source: PathBuf::from("out/demo_bind.c"),
            objects: vec![PathBuf::from("out/obj/demo_bind.o")],
            libraries: vec!["mw".to_string()],
            artifact: PathBuf::from("out/demo.so"),
            warnings: Vec::new(),
        };

        let text = format_report(&report);
        assert!(text.contains("module:    demo"));
        assert!(text.contains("  int addme(int a, int b)"));
        assert!(text.contains("libraries: mw"));
        assert!(text.contains("/usr/bin/cc (gcc"));
    }
}
