use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Broad classification of a repository file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// General-purpose source module
    Source,
    /// Template / markup file rendered by the application
    Template,
}

/// Concrete dialect of a recognized file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Python,
    Jinja,
}

impl Dialect {
    /// Detect dialect from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" | "pyw" => Some(Self::Python),
            "html" | "htm" | "jinja" | "jinja2" | "j2" => Some(Self::Jinja),
            _ => None,
        }
    }

    /// Detect dialect from file path
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    #[must_use]
    pub const fn kind(self) -> FileKind {
        match self {
            Self::Python => FileKind::Source,
            Self::Jinja => FileKind::Template,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Jinja => "jinja",
        }
    }
}

/// A recognized repository file. Identity is `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SourceFile {
    /// Repository-relative path with `/` separators
    pub path: String,
    pub kind: FileKind,
    pub dialect: Dialect,
    /// Lowercase hex SHA-256 of the file bytes
    pub fingerprint: String,
    pub line_count: usize,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, dialect: Dialect, bytes: &[u8]) -> Self {
        let line_count = String::from_utf8_lossy(bytes).lines().count();
        Self {
            path: path.into(),
            kind: dialect.kind(),
            dialect,
            fingerprint: content_fingerprint(bytes),
            line_count,
        }
    }
}

pub fn content_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_from_path() {
        assert_eq!(Dialect::from_path("app/main.py"), Some(Dialect::Python));
        assert_eq!(Dialect::from_path("templates/item.HTML"), Some(Dialect::Jinja));
        assert_eq!(Dialect::from_path("emails/welcome.j2"), Some(Dialect::Jinja));
        assert_eq!(Dialect::from_path("README.md"), None);
        assert_eq!(Dialect::from_path("Makefile"), None);
    }

    #[test]
    fn fingerprint_is_stable_hex() {
        let a = content_fingerprint(b"print('hi')\n");
        let b = content_fingerprint(b"print('hi')\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn source_file_counts_lines() {
        let file = SourceFile::new("a.py", Dialect::Python, b"import os\n\nx = 1\n");
        assert_eq!(file.kind, FileKind::Source);
        assert_eq!(file.line_count, 3);
    }
}
