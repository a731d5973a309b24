//! Read-only rule views for downstream generators.
//!
//! Generators receive a [`RuleContext`] and must cite only the evidence it
//! lists. Nothing in this crate invokes a [`Collaborator`].

use codelore_model::{BusinessRule, Confidence, EvidenceKind, ParsedCode, RuleCategory};
use serde::Serialize;
use std::collections::BTreeSet;

/// Evidence item resolved to a file span
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceLocation {
    pub kind: EvidenceKind,
    pub id: String,
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Fingerprint of the cited file, when it was part of the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleCitation {
    pub rule_id: String,
    pub category: RuleCategory,
    pub statement: String,
    pub confidence: Confidence,
    pub evidence: Vec<EvidenceLocation>,
}

/// Resolve every rule's evidence against the structural model.
///
/// Evidence that no longer resolves is left out of the citation.
pub fn cite(rules: &[BusinessRule], model: &ParsedCode) -> Vec<RuleCitation> {
    rules
        .iter()
        .map(|rule| RuleCitation {
            rule_id: rule.id.clone(),
            category: rule.category,
            statement: rule.statement.clone(),
            confidence: rule.confidence,
            evidence: rule
                .evidence
                .iter()
                .filter_map(|item| locate(item.kind, &item.id, model))
                .collect(),
        })
        .collect()
}

fn locate(kind: EvidenceKind, id: &str, model: &ParsedCode) -> Option<EvidenceLocation> {
    let (file, start_line, end_line) = match kind {
        EvidenceKind::Symbol => {
            let symbol = model.symbol(id)?;
            (symbol.file.clone(), symbol.start_line, symbol.end_line)
        }
        EvidenceKind::Template => {
            let template = model.template(id)?;
            let lines = model
                .files
                .iter()
                .find(|f| f.path == template.path)
                .map_or(1, |f| f.line_count.max(1));
            (template.path.clone(), 1, lines)
        }
    };
    let source_hash = model
        .files
        .iter()
        .find(|f| f.path == file)
        .map(|f| f.fingerprint.clone());
    Some(EvidenceLocation {
        kind,
        id: id.to_string(),
        file,
        start_line,
        end_line,
        source_hash,
    })
}

/// The citations a generator may draw on
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleContext {
    pub citations: Vec<RuleCitation>,
}

impl RuleContext {
    pub fn new(citations: Vec<RuleCitation>) -> Self {
        Self { citations }
    }

    pub fn from_model(rules: &[BusinessRule], model: &ParsedCode) -> Self {
        Self::new(cite(rules, model))
    }

    /// Whether `evidence_id` appears in any citation
    pub fn permits(&self, evidence_id: &str) -> bool {
        self.citations
            .iter()
            .flat_map(|c| &c.evidence)
            .any(|e| e.id == evidence_id)
    }

    /// Evidence ids a generated trace is allowed to reference
    pub fn allowed_evidence(&self) -> BTreeSet<&str> {
        self.citations
            .iter()
            .flat_map(|c| &c.evidence)
            .map(|e| e.id.as_str())
            .collect()
    }
}

/// Stateless text generator plugged in downstream
pub trait Collaborator {
    fn complete(&self, prompt: &str, context: &RuleContext) -> anyhow::Result<String>;
}
