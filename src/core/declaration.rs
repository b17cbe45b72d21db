//! The ordered list of declared C functions.

use crate::builder::bindings::{CFunction, DeclarationParser};
use crate::builder::errors::BindError;

/// Declared function signatures, in export order.
///
/// Redeclaring a function with the same signature is a no-op; redeclaring it
/// with a different one is an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    functions: Vec<CFunction>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one or more `cdef` strings into declarations.
    ///
    /// Fails if nothing at all is declared.
    pub fn parse<S: AsRef<str>>(cdefs: &[S]) -> Result<Self, BindError> {
        let parser = DeclarationParser::new();
        let mut decls = Declarations::new();

        for cdef in cdefs {
            for function in parser.parse(cdef.as_ref())? {
                decls.add(function)?;
            }
        }

        if decls.is_empty() {
            return Err(BindError::NoDeclarations);
        }
        Ok(decls)
    }

    /// Add a function, keeping declaration order.
    pub fn add(&mut self, function: CFunction) -> Result<(), BindError> {
        if let Some(existing) = self.get(&function.name) {
            if existing.same_signature(&function) {
                tracing::debug!("`{}` declared twice with the same signature", function.name);
                return Ok(());
            }
            return Err(BindError::ConflictingDeclaration {
                name: function.name.clone(),
                first: existing.signature(),
                second: function.signature(),
            });
        }

        self.functions.push(function);
        Ok(())
    }

    /// Look up a declared function by name.
    pub fn get(&self, name: &str) -> Option<&CFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CFunction> {
        self.functions.iter()
    }

    /// Declared names, in order.
    pub fn names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl<'a> IntoIterator for &'a Declarations {
    type Item = &'a CFunction;
    type IntoIter = std::slice::Iter<'a, CFunction>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::errors::ErrorKind;

    #[test]
    fn test_preserves_order_across_cdefs() {
        let decls = Declarations::parse(&[
            "int addme(int a, int b);",
            "int multiplyme(int a, int b);",
            "int main();",
        ])
        .unwrap();

        assert_eq!(decls.names(), vec!["addme", "multiplyme", "main"]);
    }

    #[test]
    fn test_identical_redeclaration_is_kept_once() {
        let decls = Declarations::parse(&[
            "int addme(int a, int b);",
            "int addme(int x, int y); int main(void);",
        ])
        .unwrap();

        assert_eq!(decls.len(), 2);
        assert_eq!(decls.get("addme").unwrap().params[0].name, "a");
    }

    #[test]
    fn test_conflicting_redeclaration_is_rejected() {
        let err = Declarations::parse(&["int addme(int a, int b);", "long addme(long a, long b);"])
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
        match err {
            BindError::ConflictingDeclaration { name, first, second } => {
                assert_eq!(name, "addme");
                assert_eq!(first, "int addme(int a, int b)");
                assert_eq!(second, "long addme(long a, long b)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_is_rejected() {
        let err = Declarations::parse(&["/* nothing yet */"]).unwrap_err();
        assert!(matches!(err, BindError::NoDeclarations));
    }
}
