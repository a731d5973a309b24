use codelore_model::{FileKind, ParsedCode, RuleSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Statistics about one extraction run; never written into the artifacts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Recognized files per kind (`source`, `template`)
    pub files: BTreeMap<String, usize>,
    pub symbols: usize,
    pub endpoints: usize,
    pub templates: usize,
    pub parse_failures: usize,
    pub template_cycles: usize,
    pub orphan_templates: usize,
    pub orphan_references: usize,
    pub rules: usize,
    pub rules_by_category: BTreeMap<String, usize>,
    /// Rules dropped by evidence validation
    pub dropped_rules: usize,
    pub duration_ms: u64,
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    pub fn from_model(parsed: &ParsedCode) -> Self {
        let mut files = BTreeMap::new();
        for file in &parsed.files {
            let kind = match file.kind {
                FileKind::Source => "source",
                FileKind::Template => "template",
            };
            *files.entry(kind.to_string()).or_insert(0) += 1;
        }
        Self {
            files,
            symbols: parsed.symbols.len(),
            endpoints: parsed.endpoints.len(),
            templates: parsed.templates.len(),
            parse_failures: parsed.parse_failures.len(),
            template_cycles: parsed.template_cycles.len(),
            orphan_templates: parsed.templates.iter().filter(|t| t.orphan).count(),
            orphan_references: parsed.orphan_references.len(),
            ..Self::default()
        }
    }

    pub fn record_rules(&mut self, rules: &RuleSet, dropped: usize) {
        self.rules = rules.rules.len();
        self.dropped_rules = dropped;
        self.rules_by_category.clear();
        for rule in &rules.rules {
            *self
                .rules_by_category
                .entry(rule.category.as_str().to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn log(&self) {
        log::info!(
            "Extracted {} symbols, {} endpoints, {} templates from {} files in {} ms",
            self.symbols,
            self.endpoints,
            self.templates,
            self.files.values().sum::<usize>(),
            self.duration_ms
        );
        if self.parse_failures > 0 {
            log::warn!("{} files failed to parse", self.parse_failures);
        }
        if self.template_cycles > 0 || self.orphan_references > 0 {
            log::info!(
                "{} template cycle edges dropped, {} orphan templates, {} orphan references",
                self.template_cycles,
                self.orphan_templates,
                self.orphan_references
            );
        }
        if self.rules > 0 || self.dropped_rules > 0 {
            log::info!(
                "{} business rules ({} dropped by validation)",
                self.rules,
                self.dropped_rules
            );
        }
    }
}
