use crate::endpoint::Endpoint;
use crate::rule::BusinessRule;
use crate::source::SourceFile;
use crate::symbol::Symbol;
use crate::template::{OrphanReference, TemplateArtifact, TemplateCycle};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const PARSED_CODE_FILE_NAME: &str = "parsed_code.json";
pub const BUSINESS_RULES_FILE_NAME: &str = "business_rule.json";

/// A source file that could not be parsed; recorded and excluded from the model
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct ParseFailure {
    pub file: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// Structural artifact (`parsed_code.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedCode {
    pub files: Vec<SourceFile>,
    pub symbols: Vec<Symbol>,
    pub endpoints: Vec<Endpoint>,
    pub templates: Vec<TemplateArtifact>,
    pub parse_failures: Vec<ParseFailure>,
    #[serde(default)]
    pub template_cycles: Vec<TemplateCycle>,
    #[serde(default)]
    pub orphan_references: Vec<OrphanReference>,
}

impl ParsedCode {
    pub fn symbol(&self, id: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.id == id)
    }

    pub fn template(&self, id: &str) -> Option<&TemplateArtifact> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Endpoints served by the given handler symbol
    pub fn endpoints_for<'a>(&'a self, symbol_id: &'a str) -> impl Iterator<Item = &'a Endpoint> {
        self.endpoints.iter().filter(move |e| e.symbol == symbol_id)
    }
}

/// Rule artifact (`business_rule.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RuleSet {
    pub rules: Vec<BusinessRule>,
}

/// JSON Schema of `parsed_code.json`
pub fn parsed_code_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(ParsedCode)).unwrap_or_default()
}

/// JSON Schema of `business_rule.json`
pub fn business_rules_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(RuleSet)).unwrap_or_default()
}
