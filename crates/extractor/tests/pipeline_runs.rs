use codelore_extractor::{to_canonical_json, ExtractConfig, ExtractError, Pipeline};
use codelore_model::{
    EvidenceKind, EvidenceRef, HttpMethod, ParsedCode, RuleCategory, RuleSet, SymbolKind,
    UNRESOLVED_PATH,
};
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tempfile::TempDir;

const ITEMS_APP: &str = r#"from fastapi import FastAPI
from fastapi.templating import Jinja2Templates
from pydantic import BaseModel

app = FastAPI()
templates = Jinja2Templates(directory="templates")


class Item(BaseModel):
    id: int
    name: str
    price: float


@app.get("/items/{id}", response_model=Item)
def read_item(id: int):
    item = Item(id=id, name="widget", price=1.0)
    return templates.TemplateResponse("item.html", {"item": item})
"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn items_repo() -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    write(temp.path(), "app/main.py", ITEMS_APP);
    write(temp.path(), "templates/item.html", "<h1>{{ item.name }}</h1>\n");
    temp
}

fn config_into(out: &Path) -> ExtractConfig {
    ExtractConfig {
        output_dir: out.to_path_buf(),
        ..ExtractConfig::default()
    }
}

#[tokio::test]
async fn bound_template_scenario_produces_presentation_rule() {
    let repo = items_repo();
    let out = TempDir::new().unwrap();
    let outcome = Pipeline::new()
        .run(repo.path(), &config_into(out.path()))
        .await
        .expect("run");
    let parsed = &outcome.parsed;

    assert_eq!(parsed.endpoints.len(), 1);
    let endpoint = &parsed.endpoints[0];
    assert_eq!(endpoint.http_method, HttpMethod::Get);
    assert_eq!(endpoint.path_pattern, "/items/{id}");
    assert_eq!(endpoint.symbol, "app/main.py::read_item");
    assert_eq!(endpoint.response_model.as_deref(), Some("app/main.py::Item"));
    assert_eq!(
        parsed.symbol("app/main.py::read_item").map(|s| s.kind),
        Some(SymbolKind::Endpoint)
    );

    assert_eq!(parsed.templates.len(), 1);
    let template = &parsed.templates[0];
    assert_eq!(template.path, "templates/item.html");
    assert_eq!(template.rendered_by, vec![endpoint.id.clone()]);
    assert!(!template.orphan);
    assert_eq!(template.variables_referenced, vec!["item.name"]);

    let cites_both = outcome.rules.rules.iter().any(|rule| {
        rule.category == RuleCategory::Presentation
            && rule.evidence.contains(&EvidenceRef::symbol("app/main.py::read_item"))
            && rule.evidence.contains(&EvidenceRef::template("templates/item.html"))
    });
    assert!(cites_both, "no presentation rule cites handler and template");

    assert_eq!(outcome.summary.endpoints, 1);
    assert_eq!(outcome.summary.outputs.len(), 2);
    assert!(out.path().join("parsed_code.json").is_file());
    assert!(out.path().join("business_rule.json").is_file());
}

#[tokio::test]
async fn syntax_error_is_recorded_and_run_continues() {
    let repo = TempDir::new().unwrap();
    write(repo.path(), "pkg/a.py", "def alpha():\n    return 1\n");
    write(repo.path(), "pkg/b.py", "def broken(:\n    pass\n");
    write(repo.path(), "pkg/c.py", "class Gamma:\n    pass\n");
    let out = TempDir::new().unwrap();

    let outcome = Pipeline::new()
        .run(repo.path(), &config_into(out.path()))
        .await
        .expect("run");
    let parsed = &outcome.parsed;

    assert_eq!(parsed.parse_failures.len(), 1);
    assert_eq!(parsed.parse_failures[0].file, "pkg/b.py");
    let files: BTreeSet<&str> = parsed.symbols.iter().map(|s| s.file.as_str()).collect();
    assert_eq!(files, BTreeSet::from(["pkg/a.py", "pkg/c.py"]));
    assert_eq!(parsed.files.len(), 3);
    assert_eq!(outcome.summary.parse_failures, 1);
}

#[tokio::test]
async fn unchanged_snapshot_yields_identical_bytes() {
    let repo = items_repo();
    write(repo.path(), "app/admin.py", "from flask import Blueprint\nbp = Blueprint('admin', __name__, url_prefix='/admin')\n\n@bp.route('/users', methods=['GET', 'POST'])\ndef users():\n    return render_template('users.html')\n");
    write(repo.path(), "templates/users.html", "{% extends 'base.html' %}{% block body %}{% for u in users %}{{ u.name }}{% endfor %}{% endblock %}");
    write(repo.path(), "templates/base.html", "<body>{% block body %}{% endblock %}</body>");

    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let serial = ExtractConfig {
        workers: Some(1),
        ..config_into(first.path())
    };
    let parallel = ExtractConfig {
        workers: Some(4),
        ..config_into(second.path())
    };
    Pipeline::new().run(repo.path(), &serial).await.unwrap();
    Pipeline::new().run(repo.path(), &parallel).await.unwrap();

    for name in ["parsed_code.json", "business_rule.json"] {
        let a = std::fs::read(first.path().join(name)).unwrap();
        let b = std::fs::read(second.path().join(name)).unwrap();
        assert!(a == b, "{name} differs between runs");
    }
}

#[tokio::test]
async fn artifacts_round_trip_and_keep_invariants() {
    let repo = items_repo();
    write(repo.path(), "templates/a.html", "{% include 'b.html' %}");
    write(repo.path(), "templates/b.html", "{% include 'a.html' %}");
    write(repo.path(), "app/dyn.py", "from fastapi import APIRouter\nrouter = APIRouter()\nBASE = '/x'\n\n@router.get(BASE + '/y')\ndef dyn():\n    return {}\n\n@router.post('//orders//')\ndef orders():\n    return {}\n");
    let out = TempDir::new().unwrap();
    Pipeline::new()
        .run(repo.path(), &config_into(out.path()))
        .await
        .unwrap();

    let bytes = std::fs::read(out.path().join("parsed_code.json")).unwrap();
    let parsed: ParsedCode = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(to_canonical_json(&parsed).unwrap(), bytes);

    let rules: RuleSet =
        serde_json::from_slice(&std::fs::read(out.path().join("business_rule.json")).unwrap())
            .unwrap();

    // Symbol ids are unique.
    let ids: BTreeSet<&str> = parsed.symbols.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids.len(), parsed.symbols.len());

    // Paths are normalized or explicitly unresolved.
    let patterns: BTreeSet<&str> = parsed.endpoints.iter().map(|e| e.path_pattern.as_str()).collect();
    assert!(patterns.contains(UNRESOLVED_PATH));
    assert!(patterns.contains("/orders"));
    for pattern in patterns {
        assert!(
            pattern == UNRESOLVED_PATH || (pattern.starts_with('/') && !pattern.contains("//")),
            "bad pattern {pattern}"
        );
    }

    // The include relation is acyclic once cycle-closing edges are dropped.
    assert_eq!(parsed.template_cycles.len(), 1);
    let edges: BTreeMap<&str, Vec<&str>> = parsed
        .templates
        .iter()
        .map(|t| {
            (
                t.path.as_str(),
                t.includes.iter().filter_map(|i| i.resolved.as_deref()).collect(),
            )
        })
        .collect();
    for start in edges.keys() {
        let mut stack = vec![*start];
        let mut seen = BTreeSet::new();
        while let Some(node) = stack.pop() {
            for next in edges.get(node).into_iter().flatten() {
                assert_ne!(next, start, "cycle through {start}");
                if seen.insert(*next) {
                    stack.push(next);
                }
            }
        }
    }

    // Every rule cites evidence that exists.
    assert!(!rules.rules.is_empty());
    for rule in &rules.rules {
        assert!(!rule.evidence.is_empty());
        for item in &rule.evidence {
            let found = match item.kind {
                EvidenceKind::Symbol => parsed.symbol(&item.id).is_some(),
                EvidenceKind::Template => parsed.template(&item.id).is_some(),
            };
            assert!(found, "rule {} cites unknown {}", rule.id, item.id);
        }
    }
}

#[tokio::test]
async fn rule_stage_reruns_from_structural_artifact() {
    let repo = items_repo();
    let full = TempDir::new().unwrap();
    let pipeline = Pipeline::new();
    pipeline
        .run(repo.path(), &config_into(full.path()))
        .await
        .unwrap();

    let rerun = TempDir::new().unwrap();
    let outcome = pipeline
        .synthesize_from_parsed(&full.path().join("parsed_code.json"), rerun.path())
        .await
        .unwrap();
    assert!(outcome.summary.rules > 0);
    assert_eq!(
        std::fs::read(full.path().join("business_rule.json")).unwrap(),
        std::fs::read(rerun.path().join("business_rule.json")).unwrap()
    );
    assert!(!rerun.path().join("parsed_code.json").exists());
}

#[tokio::test]
async fn parse_only_writes_just_the_structural_artifact() {
    let repo = items_repo();
    let out = TempDir::new().unwrap();
    let outcome = Pipeline::new()
        .parse_only(repo.path(), &config_into(out.path()))
        .await
        .unwrap();
    assert!(outcome.rules.rules.is_empty());
    assert!(out.path().join("parsed_code.json").is_file());
    assert!(!out.path().join("business_rule.json").exists());
}

#[tokio::test]
async fn fatal_inputs_write_nothing() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("data");

    let err = Pipeline::new()
        .run(&temp.path().join("missing"), &config_into(&out))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::RepoNotFound(_)));
    assert!(err.is_fatal_input());

    let empty = temp.path().join("empty");
    write(&empty, "README.md", "nothing to see");
    let err = Pipeline::new()
        .run(&empty, &config_into(&out))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::EmptyRepo(_)));
    assert!(!out.exists());
}

#[tokio::test]
async fn missing_structural_artifact_is_reported_as_such() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("parsed_code.json");
    let err = Pipeline::new()
        .synthesize_from_parsed(&input, temp.path())
        .await
        .unwrap_err();
    assert!(matches!(&err, ExtractError::InputNotFound(path) if path == &input));
    assert!(err.to_string().starts_with("Structural artifact not found"));
    assert!(!temp.path().join("business_rule.json").exists());
}

#[tokio::test]
async fn exhausted_budget_leaves_previous_artifacts() {
    let repo = items_repo();
    let out = TempDir::new().unwrap();
    Pipeline::new()
        .run(repo.path(), &config_into(out.path()))
        .await
        .unwrap();
    let before = std::fs::read(out.path().join("parsed_code.json")).unwrap();

    write(repo.path(), "app/extra.py", "def extra():\n    pass\n");
    let config = ExtractConfig {
        time_budget_ms: Some(0),
        ..config_into(out.path())
    };
    let err = Pipeline::new().run(repo.path(), &config).await.unwrap_err();
    assert!(matches!(err, ExtractError::BudgetExceeded));
    assert_eq!(std::fs::read(out.path().join("parsed_code.json")).unwrap(), before);
}
