use crate::{ExtractConfig, ExtractError, Result};
use codelore_model::Dialect;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// A recognized file found under the repository root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Repository-relative path with `/` separators
    pub path: String,
    pub absolute: PathBuf,
    pub dialect: Dialect,
}

/// Enumerates recognized repository files in path order
pub struct SourceWalker {
    root: PathBuf,
    respect_gitignore: bool,
    max_file_bytes: u64,
    extra: Gitignore,
}

impl SourceWalker {
    pub fn new(root: impl AsRef<Path>, config: &ExtractConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut builder = GitignoreBuilder::new(&root);
        for pattern in &config.ignore {
            builder
                .add_line(None, pattern)
                .map_err(|err| ExtractError::config(format!("ignore pattern '{pattern}': {err}")))?;
        }
        let extra = builder
            .build()
            .map_err(|err| ExtractError::config(err.to_string()))?;
        Ok(Self {
            root,
            respect_gitignore: config.respect_gitignore,
            max_file_bytes: config.max_file_bytes,
            extra,
        })
    }

    /// Walk the repository.
    ///
    /// Fails with `RepoNotFound` when the root is not a directory and with
    /// `EmptyRepo` when nothing recognizable is found.
    pub fn walk(&self) -> Result<Vec<WalkedFile>> {
        if !self.root.is_dir() {
            return Err(ExtractError::repo_not_found(&self.root));
        }

        let root = self.root.clone();
        let extra = self.extra.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .git_global(false)
            .require_git(false)
            .parents(false)
            .sort_by_file_name(|a, b| a.cmp(b));
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if is_dir && is_blocked_dir(entry.path(), &root) {
                return false;
            }
            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            !extra.matched_path_or_any_parents(relative, is_dir).is_ignore()
        });

        let mut files = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("Failed to read entry: {err}");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(dialect) = Dialect::from_path(path) else {
                continue;
            };
            if let Ok(meta) = entry.metadata() {
                if meta.len() > self.max_file_bytes {
                    log::debug!(
                        "Skipping large file {} ({} bytes > {})",
                        path.display(),
                        meta.len(),
                        self.max_file_bytes
                    );
                    continue;
                }
            }
            let Some(relative) = relative_path(path, &self.root) else {
                continue;
            };
            files.push(WalkedFile {
                path: relative,
                absolute: path.to_path_buf(),
                dialect,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        if files.is_empty() {
            return Err(ExtractError::EmptyRepo(self.root.clone()));
        }
        log::info!("Found {} recognized files under {}", files.len(), self.root.display());
        Ok(files)
    }
}

/// `/`-joined path relative to `root`
fn relative_path(path: &Path, root: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

fn is_blocked_dir(path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let Some(Component::Normal(name)) = relative.components().last() else {
        return false;
    };
    let name = name.to_string_lossy();
    BLOCKED_DIRS.contains(&name.as_ref()) || name.ends_with(".egg-info")
}

const BLOCKED_DIRS: &[&str] = &[
    // VCS / editors
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // Python environments and caches
    "__pycache__",
    ".venv",
    "venv",
    "env",
    ".tox",
    ".nox",
    ".eggs",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "site-packages",
    // builds / vendored
    "node_modules",
    "build",
    "dist",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn paths(files: &[WalkedFile]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn classifies_and_sorts_recognized_files() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("app/templates")).unwrap();
        fs::write(temp.path().join("app/views.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("app/templates/index.html"), "<p></p>").unwrap();
        fs::write(temp.path().join("README.md"), "# readme").unwrap();
        fs::write(temp.path().join("a.py"), "").unwrap();

        let walker = SourceWalker::new(temp.path(), &ExtractConfig::default()).unwrap();
        let files = walker.walk().unwrap();
        assert_eq!(paths(&files), vec!["a.py", "app/templates/index.html", "app/views.py"]);
        assert_eq!(files[1].dialect, Dialect::Jinja);
        assert_eq!(files[2].dialect, Dialect::Python);
    }

    #[test]
    fn skips_blocked_dirs_and_configured_patterns() {
        let temp = tempdir().unwrap();
        for dir in ["venv/lib", "__pycache__", "pkg.egg-info", "migrations", "src"] {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        fs::write(temp.path().join("venv/lib/site.py"), "").unwrap();
        fs::write(temp.path().join("__pycache__/mod.py"), "").unwrap();
        fs::write(temp.path().join("pkg.egg-info/setup.py"), "").unwrap();
        fs::write(temp.path().join("migrations/0001.py"), "").unwrap();
        fs::write(temp.path().join("src/app.py"), "").unwrap();
        fs::write(temp.path().join("src/generated_pb2.py"), "").unwrap();

        let config = ExtractConfig {
            ignore: vec!["migrations/".into(), "*_pb2.py".into()],
            ..ExtractConfig::default()
        };
        let files = SourceWalker::new(temp.path(), &config).unwrap().walk().unwrap();
        assert_eq!(paths(&files), vec!["src/app.py"]);
    }

    #[test]
    fn honors_gitignore_without_a_git_dir() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(".gitignore"), "secret.py\n").unwrap();
        fs::write(temp.path().join("secret.py"), "").unwrap();
        fs::write(temp.path().join("main.py"), "").unwrap();

        let files = SourceWalker::new(temp.path(), &ExtractConfig::default())
            .unwrap()
            .walk()
            .unwrap();
        assert_eq!(paths(&files), vec!["main.py"]);

        let config = ExtractConfig {
            respect_gitignore: false,
            ..ExtractConfig::default()
        };
        let files = SourceWalker::new(temp.path(), &config).unwrap().walk().unwrap();
        assert_eq!(paths(&files), vec!["main.py", "secret.py"]);
    }

    #[test]
    fn large_files_are_skipped() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("big.py"), "x = 1\n".repeat(100)).unwrap();
        fs::write(temp.path().join("small.py"), "x = 1\n").unwrap();
        let config = ExtractConfig {
            max_file_bytes: 64,
            ..ExtractConfig::default()
        };
        let files = SourceWalker::new(temp.path(), &config).unwrap().walk().unwrap();
        assert_eq!(paths(&files), vec!["small.py"]);
    }

    #[test]
    fn missing_and_empty_roots_are_fatal() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("nope");
        let err = SourceWalker::new(&missing, &ExtractConfig::default())
            .unwrap()
            .walk()
            .unwrap_err();
        assert!(matches!(err, ExtractError::RepoNotFound(_)));

        fs::write(temp.path().join("notes.txt"), "hello").unwrap();
        let err = SourceWalker::new(temp.path(), &ExtractConfig::default())
            .unwrap()
            .walk()
            .unwrap_err();
        assert!(matches!(err, ExtractError::EmptyRepo(_)));
    }
}
