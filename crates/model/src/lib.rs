//! # Codelore Model
//!
//! The structural model every extraction stage reads and appends to, plus the two
//! artifact envelopes written at the end of a run.
//!
//! ```text
//! SourceFile ──> Symbol (module / class / function / endpoint)
//!                  │
//!                  ├──> Endpoint (http method + normalized path)
//!                  │
//! TemplateArtifact ┴──> BusinessRule (evidence = symbol/template ids)
//! ```
//!
//! All entities are created once per run and never mutated after the stage that
//! produced them hands them on. Ids are derived from repository-relative paths and
//! qualified names only, so re-running on an unchanged snapshot yields identical output.

mod artifact;
mod endpoint;
mod rule;
mod source;
mod symbol;
mod template;

pub use artifact::{
    business_rules_schema, parsed_code_schema, ParseFailure, ParsedCode, RuleSet,
    BUSINESS_RULES_FILE_NAME, PARSED_CODE_FILE_NAME,
};
pub use endpoint::{
    is_normalized_path, join_prefixed, normalize_path_pattern, Endpoint, HttpMethod, UNRESOLVED_PATH,
};
pub use rule::{rule_id, BusinessRule, Confidence, EvidenceKind, EvidenceRef, RuleCategory};
pub use source::{content_fingerprint, Dialect, FileKind, SourceFile};
pub use symbol::{
    capped_snippet, module_qualified_name, symbol_id, BodyFacts, Field, Parameter, Symbol,
    SymbolKind, SNIPPET_MAX_CHARS, SNIPPET_MAX_LINES,
};
pub use template::{
    IncludeKind, OrphanReference, TemplateArtifact, TemplateBlock, TemplateCycle, TemplateInclude,
};
