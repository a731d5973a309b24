use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtractError>;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Repository not found: {}", .0.display())]
    RepoNotFound(PathBuf),

    #[error("Structural artifact not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("No recognized source or template files under {}", .0.display())]
    EmptyRepo(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Time budget exceeded")]
    BudgetExceeded,

    #[error("Parse task failed: {0}")]
    Task(String),

    #[error("Parser error: {0}")]
    Parser(#[from] codelore_parser::ParserError),
}

impl ExtractError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn repo_not_found(root: &Path) -> Self {
        Self::RepoNotFound(root.to_path_buf())
    }

    pub fn input_not_found(path: &Path) -> Self {
        Self::InputNotFound(path.to_path_buf())
    }

    /// Whether the run stopped before producing any output by design
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            Self::RepoNotFound(_) | Self::EmptyRepo(_) | Self::InputNotFound(_)
        )
    }
}

impl From<tokio::task::JoinError> for ExtractError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
