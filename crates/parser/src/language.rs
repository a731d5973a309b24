use crate::error::{ParserError, Result};
use codelore_model::Dialect;

/// Check if this dialect is parsed through a syntax tree
pub fn supports_ast(dialect: Dialect) -> bool {
    matches!(dialect, Dialect::Python)
}

/// Get Tree-sitter language instance
pub fn tree_sitter_language(dialect: Dialect) -> Result<tree_sitter::Language> {
    match dialect {
        Dialect::Python => Ok(tree_sitter_python::LANGUAGE.into()),
        Dialect::Jinja => Err(ParserError::unsupported_dialect(dialect.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_ast() {
        assert!(supports_ast(Dialect::Python));
        assert!(!supports_ast(Dialect::Jinja));
    }

    #[test]
    fn test_tree_sitter_language() {
        assert!(tree_sitter_language(Dialect::Python).is_ok());
        assert!(tree_sitter_language(Dialect::Jinja).is_err());
    }
}
