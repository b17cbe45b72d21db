//! `cbind toolchain` command

use anyhow::Result;

use super::current_dir;
use crate::cli::{ToolchainArgs, ToolchainCommands};
use cbind::builder::detect_toolchain;
use cbind::core::manifest::locate_manifest;
use cbind::util::process::ProcessBuilder;

pub fn execute(args: ToolchainArgs) -> Result<()> {
    match args.command {
        ToolchainCommands::Show(show) => show_toolchain(show.manifest.as_deref()),
    }
}

fn show_toolchain(manifest: Option<&std::path::Path>) -> Result<()> {
    let cwd = current_dir()?;
    let root = match locate_manifest(manifest, &cwd) {
        Ok(path) => path.parent().map(|p| p.to_path_buf()).unwrap_or(cwd),
        Err(_) => cwd,
    };

    let detected = detect_toolchain(&root)?;
    let tc = detected.toolchain.as_ref();

    println!("Toolchain:");
    println!();
    println!("  CC:       {}", tc.compiler_path().display());

    // First line of `--version`, where the compiler understands it
    if let Ok(output) = ProcessBuilder::new(tc.compiler_path()).arg("--version").exec() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first_line) = stdout.lines().next() {
            println!("            {}", first_line.trim());
        }
    }

    println!("  Family:   {}", tc.platform());
    println!("  Source:   {}", detected.origin);
    println!("  Objects:  .{}", tc.object_extension());
    println!("  Modules:  .{}", tc.shared_lib_extension());
    if !detected.cflags.is_empty() {
        println!("  CFLAGS:   {}", detected.cflags.join(" "));
    }
    if !detected.ldflags.is_empty() {
        println!("  LDFLAGS:  {}", detected.ldflags.join(" "));
    }

    println!();
    println!("Environment:");
    if let Ok(cc) = std::env::var("CC") {
        println!("  CC={}", cc);
    }

    Ok(())
}
