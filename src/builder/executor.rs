//! Build executor with progress reporting.
//!
//! Runs a [`BuildPlan`] one step at a time, skipping steps whose fingerprint
//! is unchanged, and turns toolchain failures into [`BindError`]s.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::depfile::read_dependencies;
use crate::builder::errors::BindError;
use crate::builder::fingerprint::{CompileFingerprint, FingerprintCache, LinkFingerprint};
use crate::builder::plan::{BuildPlan, CompileStep};
use crate::builder::toolchain::DetectedToolchain;
use crate::util::fs::ensure_dir;
use crate::util::process::{output_text, ProcessBuilder};
use crate::util::shell::{Progress, Shell, Status};

/// What the executor actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionSummary {
    /// Compile steps that ran
    pub compiled: usize,
    /// Compile steps skipped as up to date
    pub skipped: usize,
    /// Whether the link step ran
    pub linked: bool,
}

impl ExecutionSummary {
    /// Nothing ran at all.
    pub fn is_fresh(&self) -> bool {
        self.compiled == 0 && !self.linked
    }

    /// Account of the compile steps for the final status line.
    pub fn describe(&self) -> String {
        match (self.compiled, self.skipped) {
            (0, skipped) => format!("{} source(s) up to date", skipped),
            (compiled, 0) => format!("{} compiled", compiled),
            (compiled, skipped) => format!("{} compiled, {} up to date", compiled, skipped),
        }
    }
}

/// Build executor with progress tracking.
pub struct BuildExecutor<'a> {
    toolchain: &'a DetectedToolchain,
    shell: &'a Shell,
    force: bool,
    /// Directory the compiler runs in, for relative dependency paths
    cwd: PathBuf,
}

impl<'a> BuildExecutor<'a> {
    /// Create a new build executor.
    pub fn new(toolchain: &'a DetectedToolchain, shell: &'a Shell) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(BuildExecutor {
            toolchain,
            shell,
            force: false,
            cwd,
        })
    }

    /// Ignore the fingerprint cache and rebuild everything.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Execute a build plan.
    ///
    /// The fingerprint cache is saved even when a step fails, so work that
    /// succeeded is not repeated.
    pub fn execute(&self, plan: &BuildPlan) -> Result<ExecutionSummary> {
        if let Some(step) = plan.compile_steps.first() {
            if let Some(obj_dir) = step.output.parent() {
                ensure_dir(obj_dir)?;
            }
        }

        let cache_path = plan.fingerprint_path();
        let mut cache = if self.force {
            FingerprintCache::default()
        } else {
            FingerprintCache::load_or_default(&cache_path)
        };

        let result = self.run(plan, &mut cache);
        cache.save(&cache_path)?;
        result
    }

    fn run(&self, plan: &BuildPlan, cache: &mut FingerprintCache) -> Result<ExecutionSummary> {
        let mut summary = ExecutionSummary::default();

        let progress = self.shell.progress(plan.compile_count() as u64, "Compiling");
        for step in &plan.compile_steps {
            let ran = self.compile(step, cache, &progress);
            progress.inc(1);
            match ran {
                Ok(true) => summary.compiled += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    progress.finish();
                    return Err(e);
                }
            }
        }
        progress.finish();

        summary.linked = self.link(plan, cache, summary.compiled > 0)?;
        Ok(summary)
    }

    /// Compile one step. Returns whether the compiler ran.
    fn compile(
        &self,
        step: &CompileStep,
        cache: &mut FingerprintCache,
        progress: &Progress,
    ) -> Result<bool> {
        let tc = self.toolchain.toolchain.as_ref();
        let spec = tc.compile_command(&step.input());
        let compiler = tc.compiler_path().display().to_string();

        let fingerprint = CompileFingerprint::for_source(
            &step.source,
            &compiler,
            &spec.args,
            &cache.recorded_headers(&step.source),
        )?;

        if step.output.exists() && !cache.needs_compile(&step.source, &fingerprint) {
            tracing::debug!("{} is up to date", step.source.display());
            return Ok(false);
        }

        let display_name = if step.generated {
            format!("{} (generated)", file_name(&step.source))
        } else {
            file_name(&step.source)
        };
        progress.println(self.shell, Status::Compiling, display_name);

        let cmd = ProcessBuilder::from_spec(&spec);
        let output = cmd.exec()?;

        if !output.status.success() {
            cache.invalidate_compile(&step.source);
            return Err(BindError::Compile {
                source_file: step.source.clone(),
                command: cmd.display_command(),
                output: output_text(&output),
            }
            .into());
        }

        // Record the headers this compile actually included
        let headers = read_dependencies(
            tc.dependency_format(),
            &step.source,
            &step.depfile,
            &String::from_utf8_lossy(&output.stdout),
            &self.cwd,
        );
        tracing::debug!("{} includes {} header(s)", step.source.display(), headers.len());

        let fingerprint =
            CompileFingerprint::for_source(&step.source, &compiler, &spec.args, &headers)?;
        cache.update_compile(step.source.clone(), fingerprint);
        Ok(true)
    }

    /// Link the module. Returns whether the linker ran.
    fn link(&self, plan: &BuildPlan, cache: &mut FingerprintCache, compiled: bool) -> Result<bool> {
        let tc = self.toolchain.toolchain.as_ref();
        let step = &plan.link_step;
        let spec = tc.link_shared_command(&step.input());

        let fingerprint = LinkFingerprint::for_link(
            &step.objects,
            &step.link_inputs(),
            &spec.program.display().to_string(),
            &spec.args,
        )?;

        if !compiled && step.output.exists() && !cache.needs_link(&plan.module, &fingerprint) {
            tracing::debug!("{} is up to date", step.output.display());
            return Ok(false);
        }

        self.shell
            .status(Status::Linking, file_name(&step.output));

        let cmd = ProcessBuilder::from_spec(&spec);
        let output = cmd.exec()?;

        if !output.status.success() {
            cache.link.remove(&plan.module);
            return Err(BindError::Link {
                module: plan.module.clone(),
                command: cmd.display_command(),
                output: output_text(&output),
            }
            .into());
        }

        cache.update_link(plan.module.clone(), fingerprint);
        Ok(true)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
