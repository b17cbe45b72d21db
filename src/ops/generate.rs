//! Implementation of `cbind build`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};

use crate::builder::glue::generate_glue;
use crate::builder::{detect_toolchain, BuildExecutor, BuildPlan, Profile};
use crate::core::descriptor::ResolvedDescriptor;
use crate::core::Manifest;
use crate::ops::loader::{ExportEntry, LoadedModule, ModuleMetadata};
use crate::util::config::{global_config_path, load_config, project_config_path};
use crate::util::fs::{ensure_dir, resolve_against, write_if_changed};
use crate::util::shell::{format_duration, Shell, Status};

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Build in release mode
    pub release: bool,

    /// Output directory (the profile sub-directory is appended)
    pub out_dir: Option<PathBuf>,

    /// Emit compile_commands.json
    pub emit_compile_commands: bool,

    /// Ignore the fingerprint cache
    pub force: bool,
}

impl BuildOptions {
    pub fn profile(&self) -> Profile {
        Profile::from_release(self.release)
    }
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildOutcome {
    /// The built module
    pub artifact: PathBuf,

    /// Exported functions, in declaration order
    pub exports: Vec<ExportEntry>,

    /// Number of sources the compiler actually ran on
    pub compiled: usize,

    /// Number of sources that were up to date
    pub skipped: usize,

    /// Nothing needed rebuilding
    pub fresh: bool,
}

/// Output directory root for `manifest`: `--out-dir`, then `config.toml`,
/// then `.cbind/target`.
pub fn target_dir(manifest: &Manifest, explicit: Option<&Path>) -> PathBuf {
    let root = manifest.root();
    if let Some(dir) = explicit {
        return resolve_against(root, dir);
    }

    let global = global_config_path();
    let config = load_config(global.as_deref(), &project_config_path(root));
    match config.build.out_dir {
        Some(dir) => resolve_against(root, &dir),
        None => root.join(".cbind").join("target"),
    }
}

/// Build the module described by `manifest`.
pub fn generate(manifest: &Manifest, opts: &BuildOptions, shell: &Shell) -> Result<BuildOutcome> {
    let start = Instant::now();
    let profile = opts.profile();

    // Everything that can be checked without a compiler is checked first.
    let declarations = manifest.declarations()?;
    let descriptor = manifest.descriptor().validate()?;

    let toolchain = detect_toolchain(manifest.root())?;

    let out_dir = target_dir(manifest, opts.out_dir.as_deref()).join(profile.as_str());
    ensure_dir(&out_dir)?;

    let plan = BuildPlan::new(&descriptor, &declarations, &toolchain, profile, &out_dir);

    let glue = generate_glue(&descriptor.module_name, &descriptor.preamble, &declarations);
    if write_if_changed(&plan.glue_source, &glue)? {
        shell.status(Status::Generating, plan.glue_source.display());
    } else {
        tracing::debug!("glue source unchanged: {}", plan.glue_source.display());
    }

    if let Some(list) = &plan.link_step.export_list {
        write_if_changed(&list.path, &list.contents)?;
    }

    if opts.emit_compile_commands || emit_by_config(manifest.root()) {
        let cc_path = out_dir.join("compile_commands.json");
        plan.emit_compile_commands(&toolchain, &cc_path)
            .with_context(|| format!("failed to write {}", cc_path.display()))?;
        tracing::info!("Wrote {}", cc_path.display());
    }

    let summary = BuildExecutor::new(&toolchain, shell)?
        .force(opts.force)
        .execute(&plan)?;

    let exports = verify_exports(&descriptor, &declarations, plan.artifact(), shell)?;

    let elapsed = format_duration(start.elapsed());
    if summary.is_fresh() {
        shell.status(
            Status::Fresh,
            format!(
                "{} ({}), {}",
                descriptor.module_name,
                profile,
                summary.describe()
            ),
        );
    } else {
        shell.status(
            Status::Finished,
            format!(
                "{} [{}] in {} ({})",
                profile,
                descriptor.module_name,
                elapsed,
                summary.describe()
            ),
        );
    }

    Ok(BuildOutcome {
        artifact: plan.artifact().to_path_buf(),
        exports,
        compiled: summary.compiled,
        skipped: summary.skipped,
        fresh: summary.is_fresh(),
    })
}

fn emit_by_config(root: &Path) -> bool {
    let global = global_config_path();
    load_config(global.as_deref(), &project_config_path(root))
        .build
        .emit_compile_commands
}

/// Load the artifact, check that every declared symbol resolves, and
/// record its exports in the metadata file beside it.
fn verify_exports(
    descriptor: &ResolvedDescriptor,
    declarations: &crate::core::Declarations,
    artifact: &Path,
    shell: &Shell,
) -> Result<Vec<ExportEntry>> {
    if shell.is_verbose() {
        shell.status(Status::Verifying, artifact.display());
    }

    let module = LoadedModule::open(artifact, declarations)?;
    let metadata: ModuleMetadata = module.metadata(&descriptor.module_name);
    metadata.save(artifact)?;

    Ok(metadata.exports)
}
