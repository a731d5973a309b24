//! # Codelore Extractor
//!
//! Turns a repository snapshot into `parsed_code.json` and `business_rule.json`.
//!
//! ## Pipeline
//!
//! ```text
//! Repository root
//!     │
//!     ├──> SourceWalker (blocklist + .gitignore + configured patterns)
//!     │      └─> WalkedFile[] sorted by path
//!     │
//!     ├──> Parse stage (spawn_blocking batches, one parser per worker)
//!     │      ├─> python  → StructuralParser → symbols, endpoints | ParseFailure
//!     │      └─> jinja   → scan_template    → TemplateArtifact  | ParseFailure
//!     │
//!     ├──> Re-sort by path, link endpoint models, TemplateBinder
//!     │
//!     ├──> RuleSynthesizer
//!     │
//!     └──> ArtifactWriter (stage *.json.tmp, fsync, rename)
//! ```
//!
//! Missing or empty repositories abort before anything is written. Per-file
//! problems become data in the structural artifact and the run continues.
//!
//! ## Example
//!
//! ```no_run
//! use codelore_extractor::{ExtractConfig, Pipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let root = Path::new("/path/to/repo");
//!     let config = ExtractConfig::load(root, None)?;
//!     let outcome = Pipeline::new().run(root, &config).await?;
//!
//!     println!("{} rules", outcome.summary.rules);
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pipeline;
mod summary;
mod walker;
mod writer;

pub use config::{ExtractConfig, CONFIG_FILE_NAME, OUTPUT_DIR_ENV, WORKERS_ENV};
pub use error::{ExtractError, Result};
pub use pipeline::{Pipeline, RunOutcome};
pub use summary::RunSummary;
pub use walker::{SourceWalker, WalkedFile};
pub use writer::{to_canonical_json, ArtifactWriter};
