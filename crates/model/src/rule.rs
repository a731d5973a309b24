use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Validation,
    Authorization,
    DataIntegrity,
    Workflow,
    Presentation,
    ExtensionPoint,
}

impl RuleCategory {
    pub const ALL: [Self; 6] = [
        Self::Validation,
        Self::Authorization,
        Self::DataIntegrity,
        Self::Workflow,
        Self::Presentation,
        Self::ExtensionPoint,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::DataIntegrity => "data_integrity",
            Self::Workflow => "workflow",
            Self::Presentation => "presentation",
            Self::ExtensionPoint => "extension_point",
        }
    }
}

/// Ordinal confidence tier; `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Tier implied by the number of distinct corroborating matchers
    #[must_use]
    pub const fn from_corroboration(matchers: usize) -> Self {
        match matchers {
            0 | 1 => Self::Low,
            2 => Self::Medium,
            _ => Self::High,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Symbol,
    Template,
}

/// Reference to a Symbol or TemplateArtifact by id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct EvidenceRef {
    pub kind: EvidenceKind,
    pub id: String,
}

impl EvidenceRef {
    pub fn symbol(id: impl Into<String>) -> Self {
        Self {
            kind: EvidenceKind::Symbol,
            id: id.into(),
        }
    }

    pub fn template(id: impl Into<String>) -> Self {
        Self {
            kind: EvidenceKind::Template,
            id: id.into(),
        }
    }
}

/// Evidence-backed statement about system behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BusinessRule {
    pub id: String,
    pub category: RuleCategory,
    pub statement: String,
    /// Sorted, deduplicated, never empty
    pub evidence: Vec<EvidenceRef>,
    pub confidence: Confidence,
    /// Every matcher that fired on this evidence, in registration order
    #[serde(default)]
    pub matchers: Vec<String>,
}

/// `"rule-"` + 16 hex chars of SHA-256 over the category and evidence ids
pub fn rule_id(category: RuleCategory, evidence: &[EvidenceRef]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    for item in evidence {
        hasher.update([0u8]);
        hasher.update(match item.kind {
            EvidenceKind::Symbol => b"s",
            EvidenceKind::Template => b"t",
        });
        hasher.update(item.id.as_bytes());
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("rule-{hex}")
}
