//! CLI integration tests for cbind.
//!
//! These tests build real C projects with the system compiler. Tests that
//! need a compiler skip themselves when none is installed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const MODULE: &str = "python_and_c_interpreter";

/// Get the cbind binary command.
fn cbind() -> Command {
    Command::cargo_bin("cbind").unwrap()
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

/// A C compiler and archiver, if both are installed.
fn c_tools() -> Option<(PathBuf, PathBuf)> {
    if cfg!(windows) {
        return None;
    }
    let cc = ["cc", "gcc", "clang"]
        .iter()
        .find_map(|name| which::which(name).ok())?;
    let ar = which::which("ar").ok()?;
    Some((cc, ar))
}

macro_rules! require_c_tools {
    () => {
        match c_tools() {
            Some(tools) => tools,
            None => {
                eprintln!("skipping: no C compiler or archiver found");
                return;
            }
        }
    };
}

fn write(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn run(cmd: &mut Command) {
    let output = cmd.output().unwrap();
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        cmd,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Lay out the reference project: three sources, `os` and `mw` include
/// directories, and a static `libmw.a` in `mw`.
fn reference_project(dir: &Path, cc: &Path, ar: &Path) {
    write(
        dir,
        "Cbind.toml",
        &format!(
            r#"[module]
name = "{MODULE}"
cdef = ["int addme(int a, int b);", "int multiplyme(int a, int b);", "int main();"]
preamble = '''
#include "mw/mw_can.h"
#include "os/types.h"
#include "os/flags.h"
#include "c_declarations.h"
'''
sources = ["main.c", "flags.c", "can1.c"]
include-dirs = ["os", "mw"]
libraries = ["mw"]
library-dirs = ["mw"]
defines = ["NATIVE_COMPILE"]
"#
        ),
    );

    write(
        dir,
        "os/types.h",
        "#ifndef TYPES_H\n#define TYPES_H\n#include <stdint.h>\ntypedef float tF32S;\n#endif\n",
    );
    write(
        dir,
        "os/flags.h",
        "#ifndef FLAGS_H\n#define FLAGS_H\n#include \"types.h\"\n\
         typedef uint32_t flags_mask_t;\nint flags_count(flags_mask_t mask);\n#endif\n",
    );
    write(
        dir,
        "mw/mw_can.h",
        "#ifndef MW_CAN_H\n#define MW_CAN_H\nint mw_can_scale(int value);\n#endif\n",
    );
    write(
        dir,
        "c_declarations.h",
        "int addme(int a, int b);\nint multiplyme(int a, int b);\nint main();\n",
    );

    write(
        dir,
        "main.c",
        r#"#include "flags.h"
#include "mw_can.h"
#include "c_declarations.h"

#ifndef NATIVE_COMPILE
#error "NATIVE_COMPILE must be defined"
#endif

int multiplyme(int a, int b)
{
    return (a * b);
}

int addme(int a, int b)
{
    return (a + b);
}

int main()
{
    return flags_count(3) + mw_can_scale(0);
}
"#,
    );
    write(
        dir,
        "flags.c",
        r#"#include "flags.h"

int flags_count(flags_mask_t mask)
{
    int n = 0;
    while (mask) {
        n += (int) (mask & 1u);
        mask >>= 1;
    }
    return n;
}
"#,
    );
    write(
        dir,
        "can1.c",
        "#include \"mw_can.h\"\n#include \"types.h\"\n\nint can1_speed(void)\n{\n    return mw_can_scale(2);\n}\n",
    );

    // libmw.a, built outside cbind
    write(
        dir,
        "mw/mw_can.c",
        "#include \"mw_can.h\"\n\nint mw_can_scale(int value)\n{\n    return value * 10;\n}\n",
    );
    run(Command::new(cc)
        .args(["-c", "-fPIC", "mw_can.c", "-o", "mw_can.o"])
        .current_dir(dir.join("mw")));
    run(Command::new(ar)
        .args(["rcs", "libmw.a", "mw_can.o"])
        .current_dir(dir.join("mw")));
}

fn artifact(dir: &Path) -> PathBuf {
    dir.join(".cbind")
        .join("target")
        .join("debug")
        .join(format!("{}.{}", MODULE, std::env::consts::DLL_EXTENSION))
}

fn build(dir: &Path) -> assert_cmd::assert::Assert {
    cbind().args(["build"]).current_dir(dir).assert()
}

// ============================================================================
// cbind build
// ============================================================================

#[test]
fn test_build_reference_project() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);

    build(tmp.path())
        .success()
        .stdout(predicate::str::contains(MODULE))
        .stderr(predicate::str::contains("Compiling"))
        .stderr(predicate::str::contains("Finished"));

    assert!(artifact(tmp.path()).is_file());
    assert!(tmp
        .path()
        .join(".cbind/target/debug")
        .join(format!("{}_bind.c", MODULE))
        .is_file());
}

#[test]
fn test_second_build_is_fresh() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);

    build(tmp.path()).success();
    build(tmp.path())
        .success()
        .stderr(predicate::str::contains("Fresh"))
        .stderr(predicate::str::contains("Compiling").not());

    // A touched source is recompiled alone
    let main_c = tmp.path().join("main.c");
    let mut contents = fs::read_to_string(&main_c).unwrap();
    contents.push_str("\n/* changed */\n");
    fs::write(&main_c, contents).unwrap();

    build(tmp.path())
        .success()
        .stderr(predicate::str::contains("main.c"))
        .stderr(predicate::str::contains("flags.c").not());
}

#[test]
fn test_build_release_and_out_dir() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);

    cbind()
        .args(["build", "--release", "--out-dir", "out", "--emit-compile-commands"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let release = tmp.path().join("out").join("release");
    assert!(release
        .join(format!("{}.{}", MODULE, std::env::consts::DLL_EXTENSION))
        .is_file());

    let commands = fs::read_to_string(release.join("compile_commands.json")).unwrap();
    assert!(commands.contains("flags.c"));
    assert!(commands.contains("-O2"));
}

#[test]
fn test_missing_source_is_compilation_error() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);
    fs::remove_file(tmp.path().join("flags.c")).unwrap();

    build(tmp.path())
        .failure()
        .stderr(predicate::str::contains("compilation error"))
        .stderr(predicate::str::contains("flags.c"));
}

#[test]
fn test_source_that_does_not_compile_is_compilation_error() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);
    write(tmp.path(), "can1.c", "int can1_speed(void) { return }\n");

    build(tmp.path())
        .failure()
        .stderr(predicate::str::contains("compilation error"))
        .stderr(predicate::str::contains("can1.c"));
}

#[test]
fn test_missing_library_dir_is_configuration_error() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);
    fs::rename(tmp.path().join("mw"), tmp.path().join("mw_moved")).unwrap();

    build(tmp.path())
        .failure()
        .stderr(predicate::str::contains("configuration error"));

    // Rejected before any compiler ran
    assert!(!tmp.path().join(".cbind/target/debug/obj").exists());
}

#[test]
fn test_undefined_symbol_is_link_error() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);

    let manifest = tmp.path().join("Cbind.toml");
    let contents = fs::read_to_string(&manifest).unwrap().replace(
        r#""int main();"]"#,
        r#""int main();", "int divideme(int a, int b);"]"#,
    );
    fs::write(&manifest, contents).unwrap();

    build(tmp.path())
        .failure()
        .stderr(predicate::str::contains("link error"))
        .stderr(predicate::str::contains("divideme"));
}

/// Defined dynamic symbols of `module`, without reserved `_` names.
#[cfg(target_os = "linux")]
fn dynamic_symbols(module: &Path) -> Option<Vec<String>> {
    let nm = which::which("nm").ok()?;
    let output = Command::new(nm)
        .args(["-D", "--defined-only"])
        .arg(module)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let mut names: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .filter(|name| !name.starts_with('_'))
        .map(|name| name.split('@').next().unwrap_or(name).to_string())
        .collect();
    names.sort();
    names.dedup();
    Some(names)
}

#[test]
#[cfg(target_os = "linux")]
fn test_module_exports_exactly_the_declared_symbols() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);

    let main_c = tmp.path().join("main.c");
    let mut contents = fs::read_to_string(&main_c).unwrap();
    contents.push_str("\nvoid skrivut(void)\n{\n}\n");
    fs::write(&main_c, contents).unwrap();

    build(tmp.path()).success();

    let Some(symbols) = dynamic_symbols(&artifact(tmp.path())) else {
        eprintln!("skipping: nm not available");
        return;
    };
    assert_eq!(symbols, vec!["addme", "main", "multiplyme"]);
}

#[test]
#[cfg(target_os = "linux")]
fn test_shared_library_in_library_dirs() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);

    // Replace the archive with a shared build of the same library
    let mw = tmp.path().join("mw");
    fs::remove_file(mw.join("libmw.a")).unwrap();
    run(Command::new(&cc)
        .args(["-shared", "-fPIC", "mw_can.c", "-o", "libmw.so"])
        .current_dir(&mw));

    build(tmp.path()).success();

    // libmw.so is found at load time without LD_LIBRARY_PATH
    cbind()
        .arg("call")
        .arg(artifact(tmp.path()))
        .arg("main")
        .env_remove("LD_LIBRARY_PATH")
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn test_nested_header_change_rebuilds() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);

    write(tmp.path(), "os/can/can.h", "#define CAN_K 1\n");
    let main_c = tmp.path().join("main.c");
    let contents = fs::read_to_string(&main_c)
        .unwrap()
        .replace("return (a + b);", "return (a + b) * CAN_K;");
    fs::write(&main_c, format!("#include \"can/can.h\"\n{}", contents)).unwrap();

    build(tmp.path()).success();
    cbind()
        .arg("call")
        .arg(artifact(tmp.path()))
        .args(["addme", "2", "3"])
        .assert()
        .success()
        .stdout("5\n");

    write(tmp.path(), "os/can/can.h", "#define CAN_K 100\n");

    build(tmp.path())
        .success()
        .stderr(predicate::str::contains("Fresh").not())
        .stderr(predicate::str::contains("main.c"))
        .stderr(predicate::str::contains("flags.c").not());
    cbind()
        .arg("call")
        .arg(artifact(tmp.path()))
        .args(["addme", "2", "3"])
        .assert()
        .success()
        .stdout("500\n");
}

#[test]
fn test_conflicting_declarations_are_rejected() {
    let tmp = temp_dir();
    write(
        tmp.path(),
        "Cbind.toml",
        "[module]\nname = \"demo\"\ncdef = [\"int addme(int a, int b);\", \"long addme(long a, long b);\"]\n",
    );

    build(tmp.path())
        .failure()
        .stderr(predicate::str::contains("configuration error"))
        .stderr(predicate::str::contains("addme"));
}

#[test]
fn test_build_fails_without_manifest() {
    let tmp = temp_dir();

    build(tmp.path())
        .failure()
        .stderr(predicate::str::contains("Cbind.toml"))
        .stderr(predicate::str::contains("cbind init"));
}

// ============================================================================
// cbind call / symbols
// ============================================================================

#[test]
fn test_call_exported_functions() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);
    build(tmp.path()).success();
    let module = artifact(tmp.path());

    cbind()
        .arg("call")
        .arg(&module)
        .args(["addme", "2", "3"])
        .assert()
        .success()
        .stdout("5\n");

    cbind()
        .arg("call")
        .arg(&module)
        .args(["multiplyme", "2", "3"])
        .assert()
        .success()
        .stdout("6\n");

    cbind()
        .arg("call")
        .arg(&module)
        .args(["addme", "-7", "3"])
        .assert()
        .success()
        .stdout("-4\n");

    // main() reaches into flags.c and libmw.a
    cbind()
        .arg("call")
        .arg(&module)
        .arg("main")
        .args(["--manifest", "Cbind.toml"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout("2\n");
}

#[test]
fn test_call_rejects_bad_arguments() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);
    build(tmp.path()).success();
    let module = artifact(tmp.path());

    cbind()
        .arg("call")
        .arg(&module)
        .args(["addme", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("takes 2 argument(s) but 1 were given"));

    cbind()
        .arg("call")
        .arg(&module)
        .args(["addme", "2", "99999999999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not fit in a C int"));

    cbind()
        .arg("call")
        .arg(&module)
        .args(["can1_speed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a declared function"));
}

#[test]
fn test_symbols_lists_exports_in_order() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);
    build(tmp.path()).success();

    cbind()
        .arg("symbols")
        .arg(artifact(tmp.path()))
        .assert()
        .success()
        .stdout("int addme(int a, int b)\nint multiplyme(int a, int b)\nint main(void)\n");
}

#[test]
fn test_symbols_without_metadata_needs_manifest() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);
    build(tmp.path()).success();

    let module = artifact(tmp.path());
    let metadata = module.with_extension("cbind.json");
    assert!(metadata.is_file());
    fs::remove_file(&metadata).unwrap();

    cbind()
        .arg("symbols")
        .arg(&module)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--manifest"));

    cbind()
        .arg("symbols")
        .arg(&module)
        .args(["--manifest", "Cbind.toml"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("int addme(int a, int b)"));
}

// ============================================================================
// cbind init / check / clean
// ============================================================================

#[test]
fn test_init_then_check() {
    let tmp = temp_dir();

    cbind()
        .args(["init", "--name", "demo"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Created"));

    assert!(tmp.path().join("Cbind.toml").is_file());
    assert!(tmp.path().join("src/demo.c").is_file());

    if c_tools().is_none() {
        return;
    }
    cbind()
        .args(["check"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("module:    demo"))
        .stdout(predicate::str::contains("int addme(int a, int b)"));

    // check writes nothing
    assert!(!tmp.path().join(".cbind").exists());
}

#[test]
fn test_init_fails_if_manifest_exists() {
    let tmp = temp_dir();
    fs::write(tmp.path().join("Cbind.toml"), "[module]\nname = \"x\"\n").unwrap();

    cbind()
        .args(["init"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_clean_removes_target_dir() {
    let (cc, ar) = require_c_tools!();
    let tmp = temp_dir();
    reference_project(tmp.path(), &cc, &ar);
    build(tmp.path()).success();
    assert!(artifact(tmp.path()).exists());

    cbind()
        .args(["clean"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed"));

    assert!(!tmp.path().join(".cbind/target").exists());
}

// ============================================================================
// cbind toolchain / completions
// ============================================================================

#[test]
fn test_toolchain_show() {
    if c_tools().is_none() {
        return;
    }
    let tmp = temp_dir();

    cbind()
        .args(["toolchain", "show"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("CC:"));
}

#[test]
fn test_completions_bash() {
    cbind()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cbind"));
}
