//! # Codelore Templates
//!
//! Template markup scanning and binding.
//!
//! ```text
//! template bytes ──> scan_template ──> TemplateArtifact (variables, blocks, includes)
//!                                          │
//!              TemplateIndex (exact path, then `/name` suffix)
//!                                          │
//!                      IncludeGraph ──> break_cycles ──> TemplateCycle[]
//!                                          │
//!     handler string literals ──> TemplateBinder ──> rendered_by / OrphanReference[]
//! ```
//!
//! The binder runs once over the whole model and is single-threaded: cycle
//! detection and orphan marking need every template and endpoint at once.

mod binder;
mod error;
mod graph;
mod resolve;
mod scanner;

pub use binder::{BindOutput, TemplateBinder};
pub use error::{Result, TemplateError};
pub use graph::{break_cycles, IncludeGraph};
pub use resolve::{looks_like_template, TemplateIndex, TEMPLATE_EXTENSIONS};
pub use scanner::{scan_template, scan_template_bytes};
