//! Type definitions for declared C functions.
//!
//! Types keep their C spelling: `long` stays `long` and `int32_t` stays a
//! named type, so a declaration can be re-emitted into the glue source and
//! checked by the compiler against the real headers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A declared C function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CFunction {
    /// Function name
    pub name: String,

    /// Return type
    pub return_type: CType,

    /// Function parameters
    pub params: Vec<CParam>,

    /// Whether this is a variadic function
    pub variadic: bool,
}

impl CFunction {
    /// Create a new function with the given name and return type.
    pub fn new(name: impl Into<String>, return_type: CType) -> Self {
        CFunction {
            name: name.into(),
            return_type,
            params: Vec::new(),
            variadic: false,
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, param: CParam) -> Self {
        self.params.push(param);
        self
    }

    /// Render the prototype without the trailing semicolon,
    /// e.g. `int addme(int a, int b)`.
    pub fn signature(&self) -> String {
        let mut params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        if self.variadic {
            params.push("...".to_string());
        }
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };

        format!("{} {}({})", self.return_type, self.name, params)
    }

    /// Whether two declarations describe the same C function type.
    /// Parameter names do not matter.
    pub fn same_signature(&self, other: &CFunction) -> bool {
        self.name == other.name
            && self.return_type == other.return_type
            && self.variadic == other.variadic
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.param_type == b.param_type)
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CParam {
    /// Parameter name (may be empty for unnamed params)
    pub name: String,

    /// Parameter type
    pub param_type: CType,
}

impl CParam {
    /// Create a new parameter.
    pub fn new(name: impl Into<String>, param_type: CType) -> Self {
        CParam {
            name: name.into(),
            param_type,
        }
    }
}

impl fmt::Display for CParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.param_type)
        } else if self.param_type.is_pointer() {
            write!(f, "{}{}", self.param_type, self.name)
        } else {
            write!(f, "{} {}", self.param_type, self.name)
        }
    }
}

/// C type representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CType {
    Void,
    Bool,

    /// Character types
    Char,
    SChar,
    UChar,

    /// Integer types in their C spelling
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,

    /// Floating point types
    Float,
    Double,
    LongDouble,

    /// Pointer to another type
    Pointer(Box<CType>),

    /// Pointer to a const-qualified type
    ConstPointer(Box<CType>),

    /// `struct name`
    Struct(String),

    /// `enum name`
    Enum(String),

    /// A typedef name such as `int32_t` or `flags_t`
    Named(String),
}

impl CType {
    /// Parse a C type string.
    ///
    /// Top-level qualifiers are dropped since they do not change the function
    /// type. Returns `None` for text that is not a type.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        // `char * const`: const on the pointer itself is top-level
        if let Some(rest) = s.strip_suffix("const") {
            let rest = rest.trim_end();
            if rest.ends_with('*') {
                return CType::parse(rest);
            }
        }

        if let Some(inner) = s.strip_suffix('*') {
            let inner = inner.trim();
            let const_pointee = if inner.ends_with('*') {
                None
            } else {
                inner
                    .strip_suffix(" const")
                    .or_else(|| inner.strip_prefix("const "))
            };
            return match const_pointee {
                Some(pointee) => Some(CType::ConstPointer(Box::new(CType::parse(pointee)?))),
                None => Some(CType::Pointer(Box::new(CType::parse(inner)?))),
            };
        }

        let words: Vec<&str> = s
            .split_whitespace()
            .filter(|w| !matches!(*w, "const" | "volatile" | "register"))
            .collect();
        if words.is_empty() {
            return None;
        }

        let unsigned = words.contains(&"unsigned");
        let signed = words.contains(&"signed");
        let base: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| !matches!(*w, "unsigned" | "signed" | "int"))
            .collect();
        let has_int = words.contains(&"int");

        let ty = match (base.as_slice(), unsigned) {
            ([], false) => CType::Int,
            ([], true) => CType::UInt,
            (["void"], false) if !signed => CType::Void,
            (["_Bool"] | ["bool"], false) if !signed => CType::Bool,
            (["char"], false) if signed && !has_int => CType::SChar,
            (["char"], false) if !has_int => CType::Char,
            (["char"], true) if !has_int => CType::UChar,
            (["short"], false) => CType::Short,
            (["short"], true) => CType::UShort,
            (["long"], false) => CType::Long,
            (["long"], true) => CType::ULong,
            (["long", "long"], false) => CType::LongLong,
            (["long", "long"], true) => CType::ULongLong,
            (["float"], false) if !signed && !has_int => CType::Float,
            (["double"], false) if !signed && !has_int => CType::Double,
            (["long", "double"], false) if !signed && !has_int => CType::LongDouble,
            (["struct", name], false) if !signed && !has_int && is_identifier(name) => {
                CType::Struct(name.to_string())
            }
            (["enum", name], false) if !signed && !has_int && is_identifier(name) => {
                CType::Enum(name.to_string())
            }
            ([name], false) if !signed && !has_int && is_identifier(name) && !is_keyword(name) => {
                CType::Named(name.to_string())
            }
            _ => return None,
        };

        Some(ty)
    }

    /// Check if this is a pointer type.
    pub fn is_pointer(&self) -> bool {
        matches!(self, CType::Pointer(_) | CType::ConstPointer(_))
    }

    /// Check if this is a void type.
    pub fn is_void(&self) -> bool {
        matches!(self, CType::Void)
    }

    /// Whether values of this type are passed as a C `int`.
    pub fn is_c_int(&self) -> bool {
        match self {
            CType::Int => true,
            CType::Named(name) => name == "int32_t",
            _ => false,
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Bool => write!(f, "_Bool"),
            CType::Char => write!(f, "char"),
            CType::SChar => write!(f, "signed char"),
            CType::UChar => write!(f, "unsigned char"),
            CType::Short => write!(f, "short"),
            CType::UShort => write!(f, "unsigned short"),
            CType::Int => write!(f, "int"),
            CType::UInt => write!(f, "unsigned int"),
            CType::Long => write!(f, "long"),
            CType::ULong => write!(f, "unsigned long"),
            CType::LongLong => write!(f, "long long"),
            CType::ULongLong => write!(f, "unsigned long long"),
            CType::Float => write!(f, "float"),
            CType::Double => write!(f, "double"),
            CType::LongDouble => write!(f, "long double"),
            CType::Pointer(inner) if inner.is_pointer() => write!(f, "{}*", inner),
            CType::Pointer(inner) => write!(f, "{} *", inner),
            CType::ConstPointer(inner) if inner.is_pointer() => write!(f, "{} const *", inner),
            CType::ConstPointer(inner) => write!(f, "const {} *", inner),
            CType::Struct(name) => write!(f, "struct {}", name),
            CType::Enum(name) => write!(f, "enum {}", name),
            CType::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Whether `s` is a valid C identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reserved words that can never name a type or function.
pub fn is_keyword(s: &str) -> bool {
    matches!(
        s,
        "auto"
            | "break"
            | "case"
            | "char"
            | "const"
            | "continue"
            | "default"
            | "do"
            | "double"
            | "else"
            | "enum"
            | "extern"
            | "float"
            | "for"
            | "goto"
            | "if"
            | "inline"
            | "int"
            | "long"
            | "register"
            | "restrict"
            | "return"
            | "short"
            | "signed"
            | "sizeof"
            | "static"
            | "struct"
            | "switch"
            | "typedef"
            | "union"
            | "unsigned"
            | "void"
            | "volatile"
            | "while"
            | "_Bool"
    )
}
