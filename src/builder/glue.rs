//! Glue source generation.
//!
//! The glue file is compiled alongside the user sources. It re-states every
//! declared prototype after the preamble, so the compiler checks each
//! declaration against the real headers, and takes the address of every
//! declared function, so the linker must resolve all of them.
//!
//! The glue defines no external symbols of its own. A module exports the
//! declared functions and nothing else; what it exports is described by the
//! metadata file written next to it (see [`crate::ops::loader`]).

use std::fmt::Write as _;

use crate::core::declaration::Declarations;

/// File-local table referencing every declared function.
const REFERENCES: &str = "cbind_references";

/// File name of the glue source for `module`.
pub fn glue_file_name(module: &str) -> String {
    format!("{}_bind.c", module)
}

/// Generate the glue C source for a module.
pub fn generate_glue(module: &str, preamble: &str, declarations: &Declarations) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "/* Generated by cbind for module `{}`. Do not edit. */", module);
    out.push_str("#include <stddef.h>\n\n");

    let preamble = preamble.trim();
    if !preamble.is_empty() {
        for line in preamble.lines() {
            let _ = writeln!(out, "{}", line.trim_start());
        }
        out.push('\n');
    }

    out.push_str("/* Declared functions */\n");
    for function in declarations {
        let _ = writeln!(out, "{};", function.signature());
    }
    out.push('\n');

    out.push_str(
        "#if defined(__GNUC__) || defined(__clang__)\n\
         #define CBIND_USED __attribute__((used))\n\
         #else\n\
         #define CBIND_USED\n\
         #endif\n\n",
    );

    let _ = writeln!(
        out,
        "CBIND_USED static void (*const {}[])(void) = {{",
        REFERENCES
    );
    for function in declarations {
        let _ = writeln!(out, "    (void (*)(void)){},", function.name);
    }
    out.push_str("    NULL\n};\n");

    out
}
