//! # Codelore Rules
//!
//! Evidence-backed business rules inferred from a finished structural model.
//!
//! ```text
//! ParsedCode ──> ModelView (indexes) ──> RuleCatalog (matchers, registration order)
//!                                              │ Proposal { statement, evidence }
//!                                              ▼
//!                      group by (category, sorted evidence) ──> confidence tier
//!                                              │
//!                      validate (evidence resolves) ──> sort ──> Synthesis
//! ```
//!
//! Confidence is the higher of the strongest matcher's base tier and the tier
//! implied by how many distinct matchers fired on the same evidence.
//!
//! ```no_run
//! use codelore_model::ParsedCode;
//! use codelore_rules::RuleSynthesizer;
//!
//! let model = ParsedCode::default();
//! let synthesis = RuleSynthesizer::default().synthesize(&model);
//! assert!(synthesis.rules.is_empty());
//! ```

mod catalog;
mod citation;
mod synthesizer;
mod view;

pub use catalog::{FnMatcher, Proposal, RuleCatalog, RuleMatcher};
pub use citation::{cite, Collaborator, EvidenceLocation, RuleCitation, RuleContext};
pub use synthesizer::{RuleSynthesizer, Synthesis};
pub use view::ModelView;

use codelore_model::{ParsedCode, RuleSet};

/// Rule artifact for `model` using the built-in catalog
pub fn synthesize_rule_set(model: &ParsedCode) -> (RuleSet, usize) {
    let synthesis = RuleSynthesizer::default().synthesize(model);
    (
        RuleSet {
            rules: synthesis.rules,
        },
        synthesis.dropped,
    )
}
