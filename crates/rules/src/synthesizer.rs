use crate::catalog::RuleCatalog;
use crate::view::ModelView;
use codelore_model::{
    rule_id, BusinessRule, Confidence, EvidenceKind, EvidenceRef, ParsedCode, RuleCategory,
};
use std::collections::BTreeMap;

/// Rules that passed validation, plus how many were dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    /// Sorted by (category, first evidence file, first evidence line)
    pub rules: Vec<BusinessRule>,
    /// Rules with empty or dangling evidence
    pub dropped: usize,
}

impl Synthesis {
    pub fn count_by_category(&self) -> BTreeMap<RuleCategory, usize> {
        let mut counts = BTreeMap::new();
        for rule in &self.rules {
            *counts.entry(rule.category).or_insert(0) += 1;
        }
        counts
    }
}

/// One matcher firing, tagged with the matcher's registration position
struct Firing {
    order: usize,
    matcher: &'static str,
    base: Confidence,
    statement: String,
}

/// Runs the rule catalog over a complete structural model
pub struct RuleSynthesizer {
    catalog: RuleCatalog,
}

impl RuleSynthesizer {
    #[must_use]
    pub fn new(catalog: RuleCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn synthesize(&self, model: &ParsedCode) -> Synthesis {
        let view = ModelView::new(model);

        let mut groups: BTreeMap<(RuleCategory, Vec<EvidenceRef>), Vec<Firing>> = BTreeMap::new();
        for (order, matcher) in self.catalog.matchers().enumerate() {
            let proposals = matcher.fire(&view);
            log::debug!("Rule matcher {} fired {} times", matcher.name(), proposals.len());
            for proposal in proposals {
                let mut evidence = proposal.evidence;
                evidence.sort();
                evidence.dedup();
                groups
                    .entry((matcher.category(), evidence))
                    .or_default()
                    .push(Firing {
                        order,
                        matcher: matcher.name(),
                        base: matcher.base_confidence(),
                        statement: proposal.statement,
                    });
            }
        }

        let mut rules = Vec::with_capacity(groups.len());
        let mut dropped = 0;
        for ((category, evidence), firings) in groups {
            let Some(rule) = collapse(category, evidence, firings) else {
                continue;
            };
            if let Err(reason) = validate(&rule, &view) {
                log::warn!("Dropping rule {} ({}): {reason}", rule.id, rule.category.as_str());
                dropped += 1;
                continue;
            }
            rules.push(rule);
        }

        rules.sort_by_cached_key(|rule| {
            let (file, line) = rule
                .evidence
                .first()
                .map(|first| locate(first, &view))
                .unwrap_or_default();
            (rule.category, file, line, rule.id.clone())
        });

        log::info!(
            "Synthesized {} business rules ({} dropped by validation)",
            rules.len(),
            dropped
        );
        Synthesis { rules, dropped }
    }
}

impl Default for RuleSynthesizer {
    fn default() -> Self {
        Self::new(RuleCatalog::builtin())
    }
}

/// Merge firings on one (category, evidence) key into a single rule.
///
/// Confidence is the higher of the best base tier and the corroboration tier.
/// The statement comes from the highest-tier firing; ties go to the earlier
/// registered matcher.
fn collapse(
    category: RuleCategory,
    evidence: Vec<EvidenceRef>,
    mut firings: Vec<Firing>,
) -> Option<BusinessRule> {
    firings.sort_by(|a, b| b.base.cmp(&a.base).then(a.order.cmp(&b.order)));
    let best = firings.first()?;

    let mut matchers: Vec<(usize, &'static str)> =
        firings.iter().map(|f| (f.order, f.matcher)).collect();
    matchers.sort_unstable();
    matchers.dedup();

    let corroboration = Confidence::from_corroboration(matchers.len());
    Some(BusinessRule {
        id: rule_id(category, &evidence),
        category,
        statement: best.statement.clone(),
        confidence: best.base.max(corroboration),
        evidence,
        matchers: matchers.into_iter().map(|(_, name)| name.to_string()).collect(),
    })
}

fn validate(rule: &BusinessRule, view: &ModelView<'_>) -> Result<(), String> {
    if rule.evidence.is_empty() {
        return Err("no evidence".to_string());
    }
    if rule.statement.trim().is_empty() {
        return Err("empty statement".to_string());
    }
    for item in &rule.evidence {
        let resolves = match item.kind {
            EvidenceKind::Symbol => view.symbol(&item.id).is_some(),
            EvidenceKind::Template => view.template(&item.id).is_some(),
        };
        if !resolves {
            return Err(format!("evidence {} does not resolve", item.id));
        }
    }
    Ok(())
}

/// (file, line) of an evidence item; templates point at their first line
fn locate(item: &EvidenceRef, view: &ModelView<'_>) -> (String, usize) {
    match item.kind {
        EvidenceKind::Symbol => view
            .symbol(&item.id)
            .map(|s| (s.file.clone(), s.start_line))
            .unwrap_or_default(),
        EvidenceKind::Template => (item.id.clone(), 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Proposal, RuleMatcher};
    use codelore_model::{Symbol, SymbolKind};
    use pretty_assertions::assert_eq;

    struct Fixed {
        name: &'static str,
        category: RuleCategory,
        base: Confidence,
        evidence: Vec<EvidenceRef>,
    }

    impl RuleMatcher for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn category(&self) -> RuleCategory {
            self.category
        }
        fn base_confidence(&self) -> Confidence {
            self.base
        }
        fn fire(&self, _view: &ModelView<'_>) -> Vec<Proposal> {
            vec![Proposal::new(format!("from {}", self.name), self.evidence.clone())]
        }
    }

    fn model() -> ParsedCode {
        ParsedCode {
            symbols: vec![
                Symbol::new(SymbolKind::Function, "b.py", "save", 4, 9),
                Symbol::new(SymbolKind::Function, "a.py", "load", 10, 12),
            ],
            ..ParsedCode::default()
        }
    }

    fn fixed(name: &'static str, category: RuleCategory, base: Confidence, ids: &[&str]) -> Fixed {
        Fixed {
            name,
            category,
            base,
            evidence: ids.iter().map(|id| EvidenceRef::symbol(*id)).collect(),
        }
    }

    #[test]
    fn corroborating_matchers_collapse_and_raise_confidence() {
        let mut catalog = RuleCatalog::empty();
        catalog.register(fixed("first", RuleCategory::Workflow, Confidence::Low, &["b.py::save", "a.py::load"]));
        catalog.register(fixed("second", RuleCategory::Workflow, Confidence::Low, &["a.py::load", "b.py::save"]));
        let synthesis = RuleSynthesizer::new(catalog).synthesize(&model());

        assert_eq!(synthesis.rules.len(), 1);
        let rule = &synthesis.rules[0];
        assert_eq!(rule.confidence, Confidence::Medium);
        assert_eq!(rule.statement, "from first");
        assert_eq!(rule.matchers, vec!["first", "second"]);
        assert_eq!(
            rule.evidence,
            vec![EvidenceRef::symbol("a.py::load"), EvidenceRef::symbol("b.py::save")]
        );
    }

    #[test]
    fn higher_base_tier_keeps_its_statement() {
        let mut catalog = RuleCatalog::empty();
        catalog.register(fixed("weak", RuleCategory::Validation, Confidence::Low, &["b.py::save"]));
        catalog.register(fixed("strong", RuleCategory::Validation, Confidence::High, &["b.py::save"]));
        let synthesis = RuleSynthesizer::new(catalog).synthesize(&model());
        assert_eq!(synthesis.rules[0].statement, "from strong");
        assert_eq!(synthesis.rules[0].confidence, Confidence::High);
    }

    #[test]
    fn dangling_or_empty_evidence_is_dropped() {
        let mut catalog = RuleCatalog::empty();
        catalog.register(fixed("dangling", RuleCategory::Workflow, Confidence::Low, &["gone.py::f"]));
        catalog.register(fixed("empty", RuleCategory::Workflow, Confidence::Low, &[]));
        catalog.register(fixed("ok", RuleCategory::Workflow, Confidence::Low, &["a.py::load"]));
        let synthesis = RuleSynthesizer::new(catalog).synthesize(&model());
        assert_eq!(synthesis.dropped, 2);
        assert_eq!(synthesis.rules.len(), 1);
    }

    #[test]
    fn rules_sort_by_category_then_location() {
        let mut catalog = RuleCatalog::empty();
        catalog.register(fixed("w1", RuleCategory::Workflow, Confidence::Low, &["b.py::save"]));
        catalog.register(fixed("w2", RuleCategory::Workflow, Confidence::Low, &["a.py::load", "b.py::save"]));
        catalog.register(fixed("v", RuleCategory::Validation, Confidence::Low, &["b.py::save"]));
        let synthesis = RuleSynthesizer::new(catalog).synthesize(&model());
        let order: Vec<(&str, &str)> = synthesis
            .rules
            .iter()
            .map(|r| (r.category.as_str(), r.matchers[0].as_str()))
            .collect();
        assert_eq!(order, vec![("validation", "v"), ("workflow", "w2"), ("workflow", "w1")]);
        assert_eq!(synthesis.count_by_category()[&RuleCategory::Workflow], 2);
    }
}
