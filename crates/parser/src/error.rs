use thiserror::Error;

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParserError>;

/// Errors that prevent a parser from being constructed or a file from being read.
///
/// Syntax errors inside a file are not errors at this level: they become
/// [`codelore_model::ParseFailure`] records.
#[derive(Error, Debug)]
pub enum ParserError {
    /// The dialect has no syntax-tree grammar
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// Tree-sitter could not be configured
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// Source bytes are not valid UTF-8
    #[error("Invalid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },
}

impl ParserError {
    /// Create an unsupported dialect error
    pub fn unsupported_dialect(dialect: impl Into<String>) -> Self {
        Self::UnsupportedDialect(dialect.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}

impl From<std::str::Utf8Error> for ParserError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::InvalidUtf8 {
            offset: err.valid_up_to(),
        }
    }
}
