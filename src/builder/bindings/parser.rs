//! Parser for C function prototypes.
//!
//! Accepts the subset of C used in `cdef` strings: one or more function
//! prototypes, each terminated by `;`, with optional `extern` storage class
//! and comments. Anything else is rejected, so a typo surfaces as a
//! configuration error instead of a confusing compiler message later.

use std::sync::OnceLock;

use regex::Regex;

use super::types::{is_identifier, is_keyword, CFunction, CParam, CType};
use crate::builder::errors::BindError;

fn prototype_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:extern\s+)?([\w\s*]+?)\s*\b(\w+)\s*\(([^()]*)\)$")
            .expect("prototype regex is valid")
    })
}

/// Parser for `cdef` declaration text.
#[derive(Debug, Default)]
pub struct DeclarationParser;

impl DeclarationParser {
    /// Create a new declaration parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every prototype in `content`, in source order.
    pub fn parse(&self, content: &str) -> Result<Vec<CFunction>, BindError> {
        let preprocessed = preprocess(content);
        let mut functions = Vec::new();

        let mut statements: Vec<&str> = preprocessed.split(';').collect();
        let trailing = statements.pop().unwrap_or("").trim();
        if !trailing.is_empty() {
            return Err(invalid(trailing, "missing `;` after declaration"));
        }

        for statement in statements {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }

            functions.push(self.parse_prototype(statement)?);
        }

        Ok(functions)
    }

    /// Parse one prototype without its trailing semicolon.
    fn parse_prototype(&self, text: &str) -> Result<CFunction, BindError> {
        if text.starts_with('#') {
            return Err(invalid(text, "preprocessor directives belong in the preamble"));
        }
        if text.starts_with("typedef") || text.contains('{') {
            return Err(invalid(text, "only function prototypes can be declared"));
        }
        if text.starts_with("static ") {
            return Err(invalid(text, "static functions cannot be exported"));
        }

        let caps = prototype_regex()
            .captures(text)
            .ok_or_else(|| invalid(text, "not a function prototype"))?;

        let return_type_str = caps.get(1).map_or("", |m| m.as_str());
        let name = caps.get(2).map_or("", |m| m.as_str());
        let params_str = caps.get(3).map_or("", |m| m.as_str());

        if !is_identifier(name) {
            return Err(invalid(text, &format!("`{}` is not a valid function name", name)));
        }
        if is_keyword(name) {
            return Err(invalid(text, "function name is a C keyword"));
        }

        let return_type = CType::parse(return_type_str)
            .ok_or_else(|| invalid(text, &format!("unknown return type `{}`", return_type_str.trim())))?;

        let (params, variadic) = parse_params(text, params_str)?;

        Ok(CFunction {
            name: name.to_string(),
            return_type,
            params,
            variadic,
        })
    }
}

/// Strip comments and collapse whitespace.
fn preprocess(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
            out.push(' ');
        } else if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |end| &after[end..]);
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a parameter list. `()` and `(void)` both mean no parameters.
fn parse_params(text: &str, params_str: &str) -> Result<(Vec<CParam>, bool), BindError> {
    let params_str = params_str.trim();
    if params_str.is_empty() || params_str == "void" {
        return Ok((Vec::new(), false));
    }

    let mut params = Vec::new();
    let mut variadic = false;

    let items: Vec<&str> = params_str.split(',').map(str::trim).collect();
    for (i, param) in items.iter().enumerate() {
        if *param == "..." {
            if i + 1 != items.len() || i == 0 {
                return Err(invalid(text, "`...` must follow at least one parameter and come last"));
            }
            variadic = true;
            continue;
        }

        let param = split_param(param)
            .ok_or_else(|| invalid(text, &format!("cannot parse parameter `{}`", param)))?;
        if param.param_type.is_void() {
            return Err(invalid(text, "`void` can only appear alone in a parameter list"));
        }
        params.push(param);
    }

    Ok((params, variadic))
}

/// Split a parameter into type and optional name.
fn split_param(param: &str) -> Option<CParam> {
    // `const int a[]` decays to `const int *a`
    let (param, array_suffix) = match param.find('[') {
        Some(idx) if param.ends_with(']') => (param[..idx].trim(), " *"),
        Some(_) => return None,
        None => (param, ""),
    };

    if let Some(idx) = param.rfind(|c: char| c.is_whitespace() || c == '*') {
        let (type_part, name) = (param[..=idx].trim(), param[idx + 1..].trim());
        if is_identifier(name) && !is_keyword(name) {
            if let Some(ty) = CType::parse(&format!("{}{}", type_part, array_suffix)) {
                return Some(CParam::new(name, ty));
            }
        }
    }

    CType::parse(&format!("{}{}", param, array_suffix)).map(|ty| CParam::new("", ty))
}

fn invalid(text: &str, reason: &str) -> BindError {
    BindError::InvalidDeclaration {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}
