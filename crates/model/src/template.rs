use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of a template-to-template edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncludeKind {
    Extends,
    Include,
    Import,
}

impl IncludeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extends => "extends",
            Self::Include => "include",
            Self::Import => "import",
        }
    }
}

/// Control block found in template markup (`{% block content %}`, `{% for x in xs %}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateBlock {
    /// Tag name: block, for, if, macro, with, call, filter
    pub kind: String,
    /// Block name or the tag's expression text
    pub label: String,
    pub line: usize,
}

/// Include/extends/import edge to another template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateInclude {
    pub kind: IncludeKind,
    /// Target as written in the markup, or `<dynamic>` for a non-literal target
    pub target: String,
    /// Repository-relative path of the resolved template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    pub line: usize,
}

/// A template file with its variable/include graph and the endpoints that render it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateArtifact {
    /// Equal to `path`
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub variables_referenced: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<TemplateBlock>,
    #[serde(default)]
    pub includes: Vec<TemplateInclude>,
    /// Endpoint ids, sorted
    #[serde(default)]
    pub rendered_by: Vec<String>,
    /// No endpoint renders this template
    #[serde(default)]
    pub orphan: bool,
}

impl TemplateArtifact {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: path.clone(),
            path,
            variables_referenced: Vec::new(),
            blocks: Vec::new(),
            includes: Vec::new(),
            rendered_by: Vec::new(),
            orphan: true,
        }
    }

    /// Names of `{% block %}` sections defined here
    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .filter(|b| b.kind == "block")
            .map(|b| b.label.as_str())
    }

    /// Resolved include targets
    pub fn resolved_targets(&self) -> impl Iterator<Item = (IncludeKind, &str)> {
        self.includes
            .iter()
            .filter_map(|i| i.resolved.as_deref().map(|r| (i.kind, r)))
    }
}

/// Cycle-closing include edge dropped by the binder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct TemplateCycle {
    pub from: String,
    pub to: String,
}

/// A handler literal naming a template path that does not exist on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct OrphanReference {
    /// Endpoint id
    pub endpoint: String,
    /// Handler symbol id
    pub symbol: String,
    /// Template path as written in the handler
    pub template: String,
}
