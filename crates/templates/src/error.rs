use thiserror::Error;

pub type Result<T> = std::result::Result<T, TemplateError>;

/// Errors that keep a template file out of the model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Invalid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Unterminated `{opener}` tag at line {line}")]
    Unterminated { opener: &'static str, line: usize },
}

impl TemplateError {
    /// Line the error points at, when known
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::InvalidUtf8 { .. } => None,
            Self::Unterminated { line, .. } => Some(*line),
        }
    }
}
