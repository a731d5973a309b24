use crate::Result;
use codelore_model::{ParsedCode, RuleSet, BUSINESS_RULES_FILE_NAME, PARSED_CODE_FILE_NAME};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Canonical artifact bytes: pretty JSON in declaration key order plus a trailing newline
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes the run's artifacts into one output directory.
///
/// Every artifact is staged as `<name>.json.tmp` and synced; only when all of
/// them are staged are they renamed into place. If a rename fails, artifacts
/// already moved are restored from `<name>.json.bak` copies so the directory
/// never holds a mismatched pair.
pub struct ArtifactWriter {
    out_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn parsed_code_path(&self) -> PathBuf {
        self.out_dir.join(PARSED_CODE_FILE_NAME)
    }

    pub fn business_rules_path(&self) -> PathBuf {
        self.out_dir.join(BUSINESS_RULES_FILE_NAME)
    }

    /// Write both artifacts
    pub async fn write(&self, parsed: &ParsedCode, rules: &RuleSet) -> Result<Vec<PathBuf>> {
        self.commit(vec![
            (self.parsed_code_path(), to_canonical_json(parsed)?),
            (self.business_rules_path(), to_canonical_json(rules)?),
        ])
        .await
    }

    pub async fn write_parsed(&self, parsed: &ParsedCode) -> Result<Vec<PathBuf>> {
        self.commit(vec![(self.parsed_code_path(), to_canonical_json(parsed)?)])
            .await
    }

    pub async fn write_rules(&self, rules: &RuleSet) -> Result<Vec<PathBuf>> {
        self.commit(vec![(self.business_rules_path(), to_canonical_json(rules)?)])
            .await
    }

    async fn commit(&self, artifacts: Vec<(PathBuf, Vec<u8>)>) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.out_dir).await?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(artifacts.len());
        for (path, bytes) in artifacts {
            let tmp = path.with_extension("json.tmp");
            if let Err(err) = stage(&tmp, &bytes).await {
                discard(&tmp).await;
                for (staged_tmp, _) in &staged {
                    discard(staged_tmp).await;
                }
                return Err(err);
            }
            staged.push((tmp, path));
        }

        let mut backups = Vec::with_capacity(staged.len());
        for (_, path) in &staged {
            match back_up(path).await {
                Ok(backup) => backups.push(backup),
                Err(err) => {
                    for (tmp, _) in &staged {
                        discard(tmp).await;
                    }
                    for backup in backups.iter().flatten() {
                        discard(backup).await;
                    }
                    return Err(err);
                }
            }
        }

        let mut written = Vec::with_capacity(staged.len());
        for (index, (tmp, path)) in staged.iter().enumerate() {
            if let Err(err) = tokio::fs::rename(tmp, path).await {
                log::warn!(
                    "Failed to move {} into place, restoring previous artifacts: {err}",
                    path.display()
                );
                for ((_, done), backup) in staged.iter().zip(&backups).take(index) {
                    restore(done, backup.as_deref()).await;
                }
                for (tmp, _) in &staged[index..] {
                    discard(tmp).await;
                }
                for backup in backups.iter().flatten() {
                    discard(backup).await;
                }
                return Err(err.into());
            }
            log::debug!("Wrote {}", path.display());
            written.push(path.clone());
        }
        for backup in backups.iter().flatten() {
            discard(backup).await;
        }
        Ok(written)
    }
}

/// Copy an existing artifact aside; `None` when there was nothing to keep
async fn back_up(path: &Path) -> Result<Option<PathBuf>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {
            let backup = path.with_extension("json.bak");
            tokio::fs::copy(path, &backup).await?;
            Ok(Some(backup))
        }
        _ => Ok(None),
    }
}

/// Put the previous artifact back, or remove the new one when there was none
async fn restore(path: &Path, backup: Option<&Path>) {
    let result = match backup {
        Some(backup) => tokio::fs::rename(backup, path).await,
        None => tokio::fs::remove_file(path).await,
    };
    if let Err(err) = result {
        log::warn!("Failed to restore {}: {err}", path.display());
    }
}

async fn stage(tmp: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

async fn discard(tmp: &Path) {
    if let Err(err) = tokio::fs::remove_file(tmp).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove {}: {err}", tmp.display());
        }
    }
}
