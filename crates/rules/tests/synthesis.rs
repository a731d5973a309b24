use codelore_model::{
    BodyFacts, Confidence, Endpoint, EvidenceKind, EvidenceRef, HttpMethod, ParsedCode,
    RuleCategory, Symbol, SymbolKind, TemplateArtifact,
};
use codelore_rules::{ModelView, Proposal, RuleCatalog, RuleContext, RuleMatcher, RuleSynthesizer};
use pretty_assertions::assert_eq;

fn endpoint(symbol: &Symbol, path: &str) -> Endpoint {
    Endpoint {
        id: format!("{}#0", symbol.id),
        symbol: symbol.id.clone(),
        http_method: HttpMethod::Get,
        path_pattern: path.into(),
        matcher: "method_decorator".into(),
        request_model: None,
        response_model: None,
        request_model_hint: None,
        response_model_hint: None,
    }
}

fn rendered_item_model() -> ParsedCode {
    let mut handler = Symbol::new(SymbolKind::Endpoint, "app/main.py", "get_item", 12, 16);
    handler.body = Some(BodyFacts {
        calls: vec!["render_template".into()],
        string_literals: vec!["item.html".into()],
        ..BodyFacts::default()
    });
    let endpoint = endpoint(&handler, "/items/{id}");

    let mut template = TemplateArtifact::new("templates/item.html");
    template.variables_referenced = vec!["item.name".into()];
    template.rendered_by = vec![endpoint.id.clone()];
    template.orphan = false;

    ParsedCode {
        symbols: vec![handler],
        endpoints: vec![endpoint],
        templates: vec![template],
        ..ParsedCode::default()
    }
}

#[test]
fn bound_template_yields_presentation_rule_citing_both() {
    let model = rendered_item_model();
    let synthesis = RuleSynthesizer::default().synthesize(&model);

    let presentation: Vec<_> = synthesis
        .rules
        .iter()
        .filter(|r| r.category == RuleCategory::Presentation)
        .collect();
    assert_eq!(presentation.len(), 1);
    let rule = presentation[0];
    assert_eq!(
        rule.evidence,
        vec![
            EvidenceRef::symbol("app/main.py::get_item"),
            EvidenceRef::template("templates/item.html"),
        ]
    );
    assert_eq!(rule.matchers, vec!["template_render", "template_variables"]);
    assert_eq!(rule.confidence, Confidence::Medium);
    assert_eq!(synthesis.dropped, 0);
}

#[test]
fn every_rule_cites_resolvable_evidence() {
    let model = rendered_item_model();
    let synthesis = RuleSynthesizer::default().synthesize(&model);
    assert!(!synthesis.rules.is_empty());
    for rule in &synthesis.rules {
        assert!(!rule.evidence.is_empty(), "{} has no evidence", rule.id);
        for item in &rule.evidence {
            let resolves = match item.kind {
                EvidenceKind::Symbol => model.symbol(&item.id).is_some(),
                EvidenceKind::Template => model.template(&item.id).is_some(),
            };
            assert!(resolves, "{} cites missing {}", rule.id, item.id);
        }
    }

    let context = RuleContext::from_model(&synthesis.rules, &model);
    assert!(context.permits("templates/item.html"));
}

#[test]
fn synthesis_is_stable_across_runs() {
    let model = rendered_item_model();
    let first = RuleSynthesizer::default().synthesize(&model);
    let second = RuleSynthesizer::default().synthesize(&model);
    assert_eq!(first, second);
}

struct OnHandler {
    name: &'static str,
    base: Confidence,
}

impl RuleMatcher for OnHandler {
    fn name(&self) -> &'static str {
        self.name
    }

    fn category(&self) -> RuleCategory {
        RuleCategory::Validation
    }

    fn base_confidence(&self) -> Confidence {
        self.base
    }

    fn fire(&self, view: &ModelView<'_>) -> Vec<Proposal> {
        view.handlers()
            .map(|(handler, _)| {
                Proposal::new(
                    format!("{} checks {}", self.name, handler.name),
                    vec![EvidenceRef::symbol(&handler.id)],
                )
            })
            .collect()
    }
}

#[test]
fn identical_evidence_collapses_to_higher_confidence() {
    let model = rendered_item_model();
    let mut catalog = RuleCatalog::empty();
    catalog.register(OnHandler {
        name: "shape_check",
        base: Confidence::Low,
    });
    catalog.register(OnHandler {
        name: "strict_check",
        base: Confidence::High,
    });

    let synthesis = RuleSynthesizer::new(catalog).synthesize(&model);
    assert_eq!(synthesis.rules.len(), 1);
    let rule = &synthesis.rules[0];
    assert_eq!(rule.confidence, Confidence::High);
    assert_eq!(rule.statement, "strict_check checks get_item");
    assert_eq!(rule.matchers, vec!["shape_check", "strict_check"]);
}

#[test]
fn equal_tiers_keep_the_earlier_registered_statement() {
    let model = rendered_item_model();
    let mut catalog = RuleCatalog::empty();
    catalog.register(OnHandler {
        name: "first",
        base: Confidence::Medium,
    });
    catalog.register(OnHandler {
        name: "second",
        base: Confidence::Medium,
    });

    let synthesis = RuleSynthesizer::new(catalog).synthesize(&model);
    assert_eq!(synthesis.rules[0].statement, "first checks get_item");
    assert_eq!(synthesis.rules[0].confidence, Confidence::Medium);
}
