//! Build plan generation.
//!
//! A BuildPlan describes every compile step and the single link step needed
//! to turn a validated descriptor into a loadable module.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::builder::fingerprint::CACHE_FILE;
use crate::builder::glue::glue_file_name;
use crate::builder::toolchain::{CompileInput, DetectedToolchain, LinkInput};
use crate::core::declaration::Declarations;
use crate::core::descriptor::ResolvedDescriptor;
use crate::util::hash::Fingerprint;

/// Build profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Debug,
    Release,
}

impl Profile {
    /// Profile name, also the output sub-directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Debug => "debug",
            Profile::Release => "release",
        }
    }

    /// Pick a profile from a `--release` flag.
    pub fn from_release(release: bool) -> Self {
        if release {
            Profile::Release
        } else {
            Profile::Debug
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single compilation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileStep {
    /// Source file
    pub source: PathBuf,

    /// Output object file
    pub output: PathBuf,

    /// Include directories
    pub include_dirs: Vec<PathBuf>,

    /// Preprocessor defines
    pub defines: Vec<(String, Option<String>)>,

    /// Full compiler flags: profile, toolchain config, then descriptor
    pub cflags: Vec<String>,

    /// Dependency file listing the headers this step included
    pub depfile: PathBuf,

    /// Whether this is the generated glue source
    pub generated: bool,
}

impl CompileStep {
    /// Toolchain input for this step.
    pub fn input(&self) -> CompileInput {
        CompileInput {
            source: self.source.clone(),
            output: self.output.clone(),
            include_dirs: self.include_dirs.clone(),
            defines: self.defines.clone(),
            cflags: self.cflags.clone(),
            depfile: Some(self.depfile.clone()),
        }
    }
}

/// The link step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStep {
    /// Object files to link
    pub objects: Vec<PathBuf>,

    /// Output module
    pub output: PathBuf,

    /// Library search paths
    pub lib_dirs: Vec<PathBuf>,

    /// Libraries to link
    pub libs: Vec<String>,

    /// Declared symbols
    pub exports: Vec<String>,

    /// Linker input limiting the exports to `exports`
    pub export_list: Option<ExportListFile>,

    /// Library directories holding a shared library the module links
    pub rpath: Vec<PathBuf>,

    /// Linker flags: toolchain config, then descriptor
    pub ldflags: Vec<String>,
}

/// An export list written next to the glue source before linking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportListFile {
    pub path: PathBuf,
    pub contents: String,
}

impl LinkStep {
    /// Toolchain input for this step.
    pub fn input(&self) -> LinkInput {
        LinkInput {
            objects: self.objects.clone(),
            output: self.output.clone(),
            lib_dirs: self.lib_dirs.clone(),
            libs: self.libs.clone(),
            exports: self.exports.clone(),
            export_list: self.export_list.as_ref().map(|list| list.path.clone()),
            rpath: self.rpath.clone(),
            ldflags: self.ldflags.clone(),
        }
    }

    /// Files the link reads besides the objects, for fingerprinting.
    pub fn link_inputs(&self) -> Vec<PathBuf> {
        let mut inputs = self.library_files();
        inputs.extend(self.export_list.as_ref().map(|list| list.path.clone()));
        inputs
    }

    /// Library files the linker may pick up, for fingerprinting.
    pub fn library_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in &self.lib_dirs {
            for lib in &self.libs {
                for name in library_file_names(lib) {
                    let path = dir.join(name);
                    if path.is_file() {
                        files.push(path);
                    }
                }
            }
        }
        files
    }

    /// Libraries with no matching file in any library directory.
    ///
    /// These are left to the linker's default search path.
    pub fn unresolved_libraries(&self) -> Vec<&str> {
        self.libs
            .iter()
            .filter(|lib| {
                !self.lib_dirs.iter().any(|dir| {
                    library_file_names(lib)
                        .iter()
                        .any(|name| dir.join(name).is_file())
                })
            })
            .map(String::as_str)
            .collect()
    }
}

/// Directories in `lib_dirs` holding a shared build of one of `libs`.
fn shared_library_dirs(lib_dirs: &[PathBuf], libs: &[String]) -> Vec<PathBuf> {
    lib_dirs
        .iter()
        .filter(|dir| {
            libs.iter().any(|lib| {
                [format!("lib{}.so", lib), format!("lib{}.dylib", lib)]
                    .iter()
                    .any(|name| dir.join(name).is_file())
            })
        })
        .cloned()
        .collect()
}

/// Candidate file names for library `lib` across platforms.
fn library_file_names(lib: &str) -> [String; 5] {
    [
        format!("lib{}.a", lib),
        format!("lib{}.so", lib),
        format!("lib{}.dylib", lib),
        format!("{}.lib", lib),
        format!("lib{}.dll.a", lib),
    ]
}

/// A complete build plan for one module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Module name
    pub module: String,

    pub profile: Profile,

    /// Profile output directory
    pub out_dir: PathBuf,

    /// Generated glue source
    pub glue_source: PathBuf,

    /// Glue first, then sources in descriptor order
    pub compile_steps: Vec<CompileStep>,

    pub link_step: LinkStep,
}

impl BuildPlan {
    /// Plan the build of `descriptor` into `out_dir`.
    ///
    /// `out_dir` is the profile directory, e.g. `.cbind/target/debug`.
    pub fn new(
        descriptor: &ResolvedDescriptor,
        declarations: &Declarations,
        toolchain: &DetectedToolchain,
        profile: Profile,
        out_dir: &Path,
    ) -> Self {
        let tc = toolchain.toolchain.as_ref();
        let obj_dir = out_dir.join("obj");
        let obj_ext = tc.object_extension();

        let mut cflags = tc.profile_cflags(profile);
        cflags.extend(toolchain.cflags.iter().cloned());
        cflags.extend(descriptor.cflags.iter().cloned());

        let glue_source = out_dir.join(glue_file_name(&descriptor.module_name));

        // Preamble includes are written relative to the manifest directory
        let mut glue_includes = vec![descriptor.root.clone()];
        glue_includes.extend(descriptor.include_dirs.iter().cloned());

        let glue_object = obj_dir.join(format!("{}_bind.{}", descriptor.module_name, obj_ext));
        let mut compile_steps = vec![CompileStep {
            source: glue_source.clone(),
            depfile: glue_object.with_extension("d"),
            output: glue_object,
            include_dirs: glue_includes,
            defines: descriptor.defines.clone(),
            cflags: cflags.clone(),
            generated: true,
        }];

        for source in &descriptor.sources {
            let output = obj_dir.join(object_name(source, obj_ext));
            compile_steps.push(CompileStep {
                source: source.clone(),
                depfile: output.with_extension("d"),
                output,
                include_dirs: descriptor.include_dirs.clone(),
                defines: descriptor.defines.clone(),
                cflags: cflags.clone(),
                generated: false,
            });
        }

        let mut ldflags = toolchain.ldflags.clone();
        ldflags.extend(descriptor.ldflags.iter().cloned());

        let exports: Vec<String> = declarations.names().into_iter().map(String::from).collect();
        let export_list = tc.export_list(&exports).map(|list| ExportListFile {
            path: out_dir.join(format!("{}.{}", descriptor.module_name, list.extension)),
            contents: list.contents,
        });

        let link_step = LinkStep {
            objects: compile_steps.iter().map(|s| s.output.clone()).collect(),
            output: out_dir.join(format!(
                "{}.{}",
                descriptor.module_name,
                tc.shared_lib_extension()
            )),
            lib_dirs: descriptor.library_dirs.clone(),
            libs: descriptor.libraries.clone(),
            exports,
            export_list,
            rpath: shared_library_dirs(&descriptor.library_dirs, &descriptor.libraries),
            ldflags,
        };

        BuildPlan {
            module: descriptor.module_name.clone(),
            profile,
            out_dir: out_dir.to_path_buf(),
            glue_source,
            compile_steps,
            link_step,
        }
    }

    /// Path of the module this plan produces.
    pub fn artifact(&self) -> &Path {
        &self.link_step.output
    }

    /// Path of the fingerprint cache.
    pub fn fingerprint_path(&self) -> PathBuf {
        self.out_dir.join(CACHE_FILE)
    }

    /// Emit compile_commands.json for IDE integration.
    pub fn emit_compile_commands(&self, toolchain: &DetectedToolchain, path: &Path) -> Result<()> {
        let commands: Vec<CompileCommand> = self
            .compile_steps
            .iter()
            .map(|step| {
                let spec = toolchain.toolchain.compile_command(&step.input());

                CompileCommand {
                    directory: step
                        .source
                        .parent()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| ".".to_string()),
                    file: step.source.display().to_string(),
                    arguments: spec.argv(),
                    output: Some(step.output.display().to_string()),
                }
            })
            .collect();

        let json = serde_json::to_string_pretty(&commands)?;
        std::fs::write(path, json)?;

        Ok(())
    }

    /// Get the number of compile steps.
    pub fn compile_count(&self) -> usize {
        self.compile_steps.len()
    }
}

/// compile_commands.json entry.
#[derive(Debug, Serialize, Deserialize)]
struct CompileCommand {
    directory: String,
    file: String,
    arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

/// Object file name for `source`: its stem plus a short hash of its path,
/// so `a/can.c` and `b/can.c` do not collide.
fn object_name(source: &Path, ext: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());

    let mut fp = Fingerprint::new();
    fp.update_str(&source.to_string_lossy());
    let hash = fp.finish_short();

    format!("{}-{}.{}", stem, &hash[..8], ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{GccToolchain, ToolchainOrigin, ToolchainPlatform};
    use tempfile::TempDir;

    fn gcc() -> DetectedToolchain {
        DetectedToolchain {
            toolchain: Box::new(GccToolchain::new(PathBuf::from("cc"), ToolchainPlatform::Gcc)),
            origin: ToolchainOrigin::Path,
            cflags: vec!["-Wall".to_string()],
            ldflags: vec![],
        }
    }

    fn descriptor(root: &Path) -> ResolvedDescriptor {
        ResolvedDescriptor {
            module_name: "python_and_c_interpreter".to_string(),
            preamble: String::new(),
            sources: vec![root.join("main.c"), root.join("flags.c"), root.join("can1.c")],
            include_dirs: vec![root.join("os"), root.join("mw")],
            libraries: vec!["mw".to_string()],
            library_dirs: vec![root.join("mw")],
            defines: vec![("NATIVE_COMPILE".to_string(), None)],
            cflags: vec!["-std=c99".to_string()],
            ldflags: vec![],
            root: root.to_path_buf(),
        }
    }

    fn declarations() -> Declarations {
        Declarations::parse(&["int addme(int a, int b); int multiplyme(int a, int b); int main();"])
            .unwrap()
    }

    #[test]
    fn test_plan_layout() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("target").join("debug");
        let plan = BuildPlan::new(
            &descriptor(tmp.path()),
            &declarations(),
            &gcc(),
            Profile::Debug,
            &out,
        );

        assert_eq!(plan.compile_count(), 4);
        assert!(plan.compile_steps[0].generated);
        assert_eq!(plan.compile_steps[0].source, out.join("python_and_c_interpreter_bind.c"));
        assert_eq!(plan.compile_steps[0].include_dirs[0], tmp.path());
        assert_eq!(plan.compile_steps[1].source, tmp.path().join("main.c"));
        assert!(plan.compile_steps[1].output.starts_with(out.join("obj")));

        #[cfg(target_os = "linux")]
        assert_eq!(plan.artifact(), out.join("python_and_c_interpreter.so"));

        assert_eq!(plan.link_step.objects.len(), 4);
        assert_eq!(plan.link_step.exports, vec!["addme", "multiplyme", "main"]);
    }

    #[test]
    fn test_flag_order() {
        let tmp = TempDir::new().unwrap();
        let plan = BuildPlan::new(
            &descriptor(tmp.path()),
            &declarations(),
            &gcc(),
            Profile::Release,
            tmp.path(),
        );

        assert_eq!(plan.compile_steps[1].cflags, vec!["-O2", "-Wall", "-std=c99"]);
    }

    #[test]
    fn test_object_names_do_not_collide() {
        let a = object_name(Path::new("/p/a/can.c"), "o");
        let b = object_name(Path::new("/p/b/can.c"), "o");
        assert_ne!(a, b);
        assert!(a.starts_with("can-") && a.ends_with(".o"));
    }

    #[test]
    fn test_emit_compile_commands() {
        let tmp = TempDir::new().unwrap();
        let plan = BuildPlan::new(
            &descriptor(tmp.path()),
            &declarations(),
            &gcc(),
            Profile::Debug,
            tmp.path(),
        );

        let path = tmp.path().join("compile_commands.json");
        plan.emit_compile_commands(&gcc(), &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1]["arguments"][0], "cc");
        assert!(entries[1]["file"].as_str().unwrap().ends_with("main.c"));
    }

    #[test]
    fn test_library_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("mw")).unwrap();
        std::fs::write(tmp.path().join("mw").join("libmw.a"), "").unwrap();

        let plan = BuildPlan::new(
            &descriptor(tmp.path()),
            &declarations(),
            &gcc(),
            Profile::Debug,
            tmp.path(),
        );

        assert_eq!(plan.link_step.library_files(), vec![tmp.path().join("mw").join("libmw.a")]);
        assert!(plan.link_step.unresolved_libraries().is_empty());
        // A static archive needs nothing at load time
        assert!(plan.link_step.rpath.is_empty());
    }

    #[test]
    fn test_shared_library_dir_is_recorded_for_load_time() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("mw")).unwrap();
        std::fs::write(tmp.path().join("mw").join("libmw.so"), "").unwrap();

        let plan = BuildPlan::new(
            &descriptor(tmp.path()),
            &declarations(),
            &gcc(),
            Profile::Debug,
            tmp.path(),
        );

        assert_eq!(plan.link_step.rpath, vec![tmp.path().join("mw")]);
        assert_eq!(plan.link_step.input().rpath, vec![tmp.path().join("mw")]);
    }

    #[test]
    fn test_export_list_and_depfiles() {
        let tmp = TempDir::new().unwrap();
        let plan = BuildPlan::new(
            &descriptor(tmp.path()),
            &declarations(),
            &gcc(),
            Profile::Debug,
            tmp.path(),
        );

        let list = plan.link_step.export_list.as_ref().unwrap();
        assert!(list.path.starts_with(tmp.path()));
        assert!(list.contents.contains("addme"));
        assert!(list.contents.contains("multiplyme"));
        assert!(list.contents.contains("main"));
        assert!(plan.link_step.link_inputs().contains(&list.path));

        for step in &plan.compile_steps {
            assert_eq!(step.depfile, step.output.with_extension("d"));
            assert_eq!(step.input().depfile.as_ref(), Some(&step.depfile));
        }
    }

    #[test]
    fn test_unresolved_libraries() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("mw")).unwrap();

        let mut desc = descriptor(tmp.path());
        desc.libraries.push("m".to_string());
        let plan = BuildPlan::new(&desc, &declarations(), &gcc(), Profile::Debug, tmp.path());

        assert_eq!(plan.link_step.unresolved_libraries(), vec!["mw", "m"]);
    }
}
