//! Built-in rule matchers, in registration order.

use crate::view::ModelView;
use codelore_model::{
    Confidence, EvidenceRef, IncludeKind, RuleCategory, Symbol, SymbolKind, TemplateArtifact,
    UNRESOLVED_PATH,
};
use std::collections::BTreeMap;

/// A rule proposed by one matcher, before deduplication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub statement: String,
    pub evidence: Vec<EvidenceRef>,
}

impl Proposal {
    pub fn new(statement: impl Into<String>, evidence: Vec<EvidenceRef>) -> Self {
        Self {
            statement: statement.into(),
            evidence,
        }
    }
}

/// A predicate over the model plus the category and tier of what it proposes
pub trait RuleMatcher: Send + Sync {
    fn name(&self) -> &'static str;
    fn category(&self) -> RuleCategory;
    /// Confidence of a single uncorroborated firing
    fn base_confidence(&self) -> Confidence;
    fn fire(&self, view: &ModelView<'_>) -> Vec<Proposal>;
}

/// Matcher backed by a plain function
pub struct FnMatcher {
    pub name: &'static str,
    pub category: RuleCategory,
    pub base: Confidence,
    pub fire: fn(&ModelView<'_>) -> Vec<Proposal>,
}

impl RuleMatcher for FnMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn category(&self) -> RuleCategory {
        self.category
    }

    fn base_confidence(&self) -> Confidence {
        self.base
    }

    fn fire(&self, view: &ModelView<'_>) -> Vec<Proposal> {
        (self.fire)(view)
    }
}

/// Ordered set of rule matchers
pub struct RuleCatalog {
    matchers: Vec<Box<dyn RuleMatcher>>,
}

impl RuleCatalog {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    #[must_use]
    pub fn builtin() -> Self {
        use Confidence::{High, Low, Medium};
        use RuleCategory::{
            Authorization, DataIntegrity, ExtensionPoint, Presentation, Validation, Workflow,
        };

        let table: [(&'static str, RuleCategory, Confidence, fn(&ModelView<'_>) -> Vec<Proposal>); 18] = [
            ("request_model_contract", Validation, Low, request_model_contract),
            ("unchecked_required_field", Validation, Medium, unchecked_required_field),
            ("explicit_rejection", Validation, Medium, explicit_rejection),
            ("auth_decorator", Authorization, High, auth_decorator),
            ("auth_dependency", Authorization, Medium, auth_dependency),
            ("model_constraints", DataIntegrity, Medium, model_constraints),
            ("transactional_write", DataIntegrity, Low, transactional_write),
            ("endpoint_contract", Workflow, Low, endpoint_contract),
            ("redirect_flow", Workflow, Medium, redirect_flow),
            ("lifecycle_hook", Workflow, Medium, lifecycle_hook),
            ("template_render", Presentation, Medium, template_render),
            ("template_variables", Presentation, Low, template_variables),
            ("orphan_template", Presentation, Low, orphan_template),
            ("missing_template", Presentation, Medium, missing_template),
            ("template_blocks", ExtensionPoint, Medium, template_blocks),
            ("subclass_hierarchy", ExtensionPoint, Low, subclass_hierarchy),
            ("dynamic_route", ExtensionPoint, Medium, dynamic_route),
            ("parse_coverage_gap", Workflow, Low, parse_coverage_gap),
        ];

        let mut catalog = Self::empty();
        for (name, category, base, fire) in table {
            catalog.register(FnMatcher {
                name,
                category,
                base,
                fire,
            });
        }
        catalog
    }

    pub fn register(&mut self, matcher: impl RuleMatcher + 'static) {
        self.matchers.push(Box::new(matcher));
    }

    pub fn matchers(&self) -> impl Iterator<Item = &dyn RuleMatcher> {
        self.matchers.iter().map(|m| m.as_ref())
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

const REJECTIONS: &[&str] = &[
    "HTTPException",
    "RequestValidationError",
    "ValidationError",
    "ValueError",
    "PermissionDenied",
    "PermissionError",
    "BadRequest",
    "Forbidden",
    "NotFound",
    "Unauthorized",
    "Http404",
    "SuspiciousOperation",
    "abort",
];

const AUTH_DECORATORS: &[&str] = &[
    "login_required",
    "permission_required",
    "requires",
    "jwt_required",
    "fresh_jwt_required",
    "auth_required",
    "requires_auth",
    "admin_required",
    "staff_member_required",
    "user_passes_test",
];

const AUTH_HINTS: &[&str] = &["auth", "user", "token", "permission", "scope", "login", "credential"];

const CONSTRAINT_MARKERS: &[&str] = &[
    "primary_key",
    "unique",
    "ForeignKey",
    "nullable",
    "index",
    "gt",
    "ge",
    "lt",
    "le",
    "min_length",
    "max_length",
    "pattern",
    "regex",
];

const WRITE_CALLS: &[&str] = &["commit", "rollback", "flush"];

const REDIRECTS: &[&str] = &[
    "redirect",
    "RedirectResponse",
    "HttpResponseRedirect",
    "HttpResponsePermanentRedirect",
];

const LIFECYCLE_HOOKS: &[&str] = &[
    "on_event",
    "before_request",
    "after_request",
    "before_app_request",
    "after_app_request",
    "before_first_request",
    "teardown_request",
    "teardown_appcontext",
    "middleware",
    "exception_handler",
    "errorhandler",
    "app_errorhandler",
    "context_processor",
    "listens_for",
    "receiver",
];

fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

/// How a symbol is referred to in statements: its routes when it is a handler
fn subject(view: &ModelView<'_>, symbol: &Symbol) -> String {
    let labels = view.labels(&symbol.id);
    if labels.is_empty() {
        symbol.qualified_name.clone()
    } else {
        format!("{labels} ({})", symbol.qualified_name)
    }
}

fn join(items: &[&str]) -> String {
    items.join(", ")
}

/// Handlers whose endpoints resolve a request model, with the model class
fn request_models<'a>(view: &ModelView<'a>) -> Vec<(&'a Symbol, &'a Symbol)> {
    let mut pairs = Vec::new();
    for (handler, endpoints) in view.handlers() {
        let mut models: Vec<&str> = endpoints
            .iter()
            .filter_map(|e| e.request_model.as_deref())
            .collect();
        models.sort_unstable();
        models.dedup();
        for model in models {
            if let Some(class) = view.symbol(model).filter(|c| !c.fields.is_empty()) {
                pairs.push((handler, class));
            }
        }
    }
    pairs
}

fn request_model_contract(view: &ModelView<'_>) -> Vec<Proposal> {
    request_models(view)
        .into_iter()
        .map(|(handler, model)| {
            let fields: Vec<&str> = model.fields.iter().map(|f| f.name.as_str()).collect();
            Proposal::new(
                format!(
                    "{} accepts a {} payload with fields {}",
                    subject(view, handler),
                    model.name,
                    join(&fields)
                ),
                vec![EvidenceRef::symbol(&handler.id), EvidenceRef::symbol(&model.id)],
            )
        })
        .collect()
}

fn unchecked_required_field(view: &ModelView<'_>) -> Vec<Proposal> {
    request_models(view)
        .into_iter()
        .filter_map(|(handler, model)| {
            let body = handler.body.as_ref()?;
            let unchecked: Vec<&str> = model
                .fields
                .iter()
                .filter(|f| f.required && !body.mentions(&f.name))
                .map(|f| f.name.as_str())
                .collect();
            if unchecked.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} requires {}.{{{}}} but never checks them in the handler; rejection relies on the model declaration",
                    subject(view, handler),
                    model.name,
                    join(&unchecked)
                ),
                vec![EvidenceRef::symbol(&handler.id), EvidenceRef::symbol(&model.id)],
            ))
        })
        .collect()
}

fn explicit_rejection(view: &ModelView<'_>) -> Vec<Proposal> {
    view.handlers()
        .filter_map(|(handler, _)| {
            let body = handler.body.as_ref()?;
            let mut reasons: Vec<&str> = body
                .raises
                .iter()
                .map(|r| last_segment(r))
                .filter(|r| REJECTIONS.contains(r))
                .collect();
            if body.calls_any(&["abort"]) {
                reasons.push("abort");
            }
            reasons.sort_unstable();
            reasons.dedup();
            if reasons.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} rejects invalid requests via {}",
                    subject(view, handler),
                    join(&reasons)
                ),
                vec![EvidenceRef::symbol(&handler.id)],
            ))
        })
        .collect()
}

fn auth_decorator(view: &ModelView<'_>) -> Vec<Proposal> {
    view.model
        .symbols
        .iter()
        .filter(|s| s.kind != SymbolKind::Module)
        .filter_map(|symbol| {
            let guards: Vec<&str> = symbol
                .decorator_names()
                .filter(|d| {
                    let name = last_segment(d);
                    AUTH_DECORATORS.contains(&name) || name.starts_with("roles_")
                })
                .collect();
            if guards.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} is only reachable by authorized callers ({})",
                    subject(view, symbol),
                    join(&guards)
                ),
                vec![EvidenceRef::symbol(&symbol.id)],
            ))
        })
        .collect()
}

fn auth_dependency(view: &ModelView<'_>) -> Vec<Proposal> {
    view.handlers()
        .filter_map(|(handler, _)| {
            let mut evidence = vec![EvidenceRef::symbol(&handler.id)];
            let mut dependencies = Vec::new();
            for param in &handler.parameters {
                let Some(default) = param.default.as_deref() else {
                    continue;
                };
                let Some(inner) = default
                    .strip_prefix("Depends(")
                    .or_else(|| default.strip_prefix("Security("))
                else {
                    continue;
                };
                let dependency = inner
                    .split([',', ')'])
                    .next()
                    .unwrap_or_default()
                    .trim();
                let haystack = format!(
                    "{} {} {}",
                    param.name,
                    dependency,
                    param.annotation.as_deref().unwrap_or_default()
                )
                .to_ascii_lowercase();
                if !AUTH_HINTS.iter().any(|hint| haystack.contains(hint)) {
                    continue;
                }
                if let Some(function) = view.function_named(&handler.file, last_segment(dependency)) {
                    evidence.push(EvidenceRef::symbol(&function.id));
                }
                dependencies.push(format!("{} <- {}", param.name, dependency));
            }
            if dependencies.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} resolves {} before the handler runs",
                    subject(view, handler),
                    dependencies.join(", ")
                ),
                evidence,
            ))
        })
        .collect()
}

/// Keyword-style markers in a field default (`Column(Integer, primary_key=True)`)
fn field_constraints(default: &str) -> Vec<&'static str> {
    CONSTRAINT_MARKERS
        .iter()
        .copied()
        .filter(|marker| {
            if *marker == "ForeignKey" {
                return default.contains("ForeignKey(");
            }
            default
                .match_indices(marker)
                .any(|(idx, _)| {
                    let before = default[..idx].chars().next_back();
                    let after = default[idx + marker.len()..].trim_start();
                    !before.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
                        && after.starts_with('=')
                        && !after.starts_with("==")
                })
        })
        .collect()
}

fn model_constraints(view: &ModelView<'_>) -> Vec<Proposal> {
    view.classes()
        .filter_map(|class| {
            let constrained: Vec<String> = class
                .fields
                .iter()
                .filter_map(|field| {
                    let markers = field_constraints(field.default.as_deref()?);
                    (!markers.is_empty()).then(|| format!("{} {}", field.name, markers.join("/")))
                })
                .collect();
            if constrained.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} enforces field constraints: {}",
                    class.qualified_name,
                    constrained.join("; ")
                ),
                vec![EvidenceRef::symbol(&class.id)],
            ))
        })
        .collect()
}

fn transactional_write(view: &ModelView<'_>) -> Vec<Proposal> {
    view.callables()
        .filter_map(|symbol| {
            let body = symbol.body.as_ref()?;
            let mut ops: Vec<&str> = body
                .calls
                .iter()
                .filter(|c| c.contains('.'))
                .map(|c| last_segment(c))
                .filter(|c| WRITE_CALLS.contains(c))
                .collect();
            ops.sort_unstable();
            ops.dedup();
            if ops.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} persists changes inside an explicit transaction ({})",
                    subject(view, symbol),
                    join(&ops)
                ),
                vec![EvidenceRef::symbol(&symbol.id)],
            ))
        })
        .collect()
}

fn endpoint_contract(view: &ModelView<'_>) -> Vec<Proposal> {
    let mut proposals = Vec::new();
    for (handler, endpoints) in view.handlers() {
        let mut by_response: BTreeMap<Option<&str>, Vec<String>> = BTreeMap::new();
        for endpoint in endpoints {
            by_response
                .entry(endpoint.response_model.as_deref())
                .or_default()
                .push(endpoint.label());
        }
        for (response, labels) in by_response {
            let mut evidence = vec![EvidenceRef::symbol(&handler.id)];
            let statement = match response.and_then(|id| view.symbol(id)) {
                Some(model) => {
                    evidence.push(EvidenceRef::symbol(&model.id));
                    format!(
                        "{} is handled by {} and responds with {}",
                        labels.join(", "),
                        handler.qualified_name,
                        model.name
                    )
                }
                None => format!("{} is handled by {}", labels.join(", "), handler.qualified_name),
            };
            proposals.push(Proposal::new(statement, evidence));
        }
    }
    proposals
}

fn redirect_flow(view: &ModelView<'_>) -> Vec<Proposal> {
    view.handlers()
        .filter_map(|(handler, _)| {
            let body = handler.body.as_ref()?;
            if !body.calls_any(REDIRECTS) {
                return None;
            }
            let via = if body.calls_any(&["url_for", "reverse"]) {
                " to a named route"
            } else {
                ""
            };
            Some(Proposal::new(
                format!("{} redirects the client{via} after handling the request", subject(view, handler)),
                vec![EvidenceRef::symbol(&handler.id)],
            ))
        })
        .collect()
}

fn lifecycle_hook(view: &ModelView<'_>) -> Vec<Proposal> {
    view.callables()
        .filter_map(|symbol| {
            let hooks: Vec<&str> = symbol
                .decorator_names()
                .map(last_segment)
                .filter(|name| LIFECYCLE_HOOKS.contains(name) || name.starts_with("teardown_"))
                .collect();
            if hooks.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} runs as an application {} hook outside the regular request handlers",
                    symbol.qualified_name,
                    join(&hooks)
                ),
                vec![EvidenceRef::symbol(&symbol.id)],
            ))
        })
        .collect()
}

/// Bound (handler, template) pairs; one pair per handler however many routes it serves
fn rendered_pairs<'a>(view: &ModelView<'a>) -> Vec<(&'a Symbol, &'a TemplateArtifact)> {
    let mut pairs = Vec::new();
    for template in &view.model.templates {
        let mut handlers: Vec<&str> = template
            .rendered_by
            .iter()
            .filter_map(|endpoint| {
                view.model
                    .endpoints
                    .iter()
                    .find(|e| &e.id == endpoint)
                    .map(|e| e.symbol.as_str())
            })
            .collect();
        handlers.sort_unstable();
        handlers.dedup();
        for handler in handlers {
            if let Some(symbol) = view.symbol(handler) {
                pairs.push((symbol, template));
            }
        }
    }
    pairs
}

fn template_render(view: &ModelView<'_>) -> Vec<Proposal> {
    rendered_pairs(view)
        .into_iter()
        .map(|(handler, template)| {
            Proposal::new(
                format!("{} renders the {} template", subject(view, handler), template.path),
                vec![EvidenceRef::symbol(&handler.id), EvidenceRef::template(&template.id)],
            )
        })
        .collect()
}

fn template_variables(view: &ModelView<'_>) -> Vec<Proposal> {
    rendered_pairs(view)
        .into_iter()
        .filter(|(_, template)| !template.variables_referenced.is_empty())
        .map(|(handler, template)| {
            let vars: Vec<&str> = template.variables_referenced.iter().map(String::as_str).collect();
            Proposal::new(
                format!(
                    "{} displays {} supplied by {}",
                    template.path,
                    join(&vars),
                    subject(view, handler)
                ),
                vec![EvidenceRef::symbol(&handler.id), EvidenceRef::template(&template.id)],
            )
        })
        .collect()
}

fn orphan_template(view: &ModelView<'_>) -> Vec<Proposal> {
    view.model
        .templates
        .iter()
        .filter(|t| t.orphan && view.dependents(&t.path).is_empty())
        .map(|template| {
            Proposal::new(
                format!(
                    "{} is never rendered by an endpoint nor included by another template",
                    template.path
                ),
                vec![EvidenceRef::template(&template.id)],
            )
        })
        .collect()
}

fn missing_template(view: &ModelView<'_>) -> Vec<Proposal> {
    let mut by_handler: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for orphan in &view.model.orphan_references {
        by_handler
            .entry(orphan.symbol.as_str())
            .or_default()
            .push(orphan.template.as_str());
    }
    by_handler
        .into_iter()
        .filter_map(|(handler, mut missing)| {
            let symbol = view.symbol(handler)?;
            missing.sort_unstable();
            missing.dedup();
            Some(Proposal::new(
                format!(
                    "{} refers to template {} which does not exist in the repository",
                    subject(view, symbol),
                    join(&missing)
                ),
                vec![EvidenceRef::symbol(&symbol.id)],
            ))
        })
        .collect()
}

fn template_blocks(view: &ModelView<'_>) -> Vec<Proposal> {
    view.model
        .templates
        .iter()
        .filter_map(|template| {
            let blocks: Vec<&str> = template.block_names().collect();
            if blocks.is_empty() {
                return None;
            }
            let mut children: Vec<&str> = view
                .dependents(&template.path)
                .iter()
                .filter(|(kind, _)| *kind == IncludeKind::Extends)
                .map(|(_, path)| *path)
                .collect();
            children.sort_unstable();
            children.dedup();
            if children.is_empty() {
                return None;
            }
            let mut evidence = vec![EvidenceRef::template(&template.id)];
            evidence.extend(children.iter().map(|c| EvidenceRef::template(*c)));
            Some(Proposal::new(
                format!(
                    "{} defines overridable blocks {} extended by {}",
                    template.path,
                    join(&blocks),
                    join(&children)
                ),
                evidence,
            ))
        })
        .collect()
}

fn subclass_hierarchy(view: &ModelView<'_>) -> Vec<Proposal> {
    let by_base = view.subclasses_by_base();
    view.classes()
        .filter_map(|class| {
            let subclasses: Vec<&str> = by_base
                .get(&class.name)?
                .iter()
                .copied()
                .filter(|id| *id != class.id)
                .collect();
            if subclasses.is_empty() {
                return None;
            }
            let names: Vec<&str> = subclasses
                .iter()
                .filter_map(|id| view.symbol(id))
                .map(|s| s.qualified_name.as_str())
                .collect();
            let mut evidence = vec![EvidenceRef::symbol(&class.id)];
            evidence.extend(subclasses.iter().map(|id| EvidenceRef::symbol(*id)));
            Some(Proposal::new(
                format!("{} is an extension point specialized by {}", class.qualified_name, join(&names)),
                evidence,
            ))
        })
        .collect()
}

fn dynamic_route(view: &ModelView<'_>) -> Vec<Proposal> {
    view.handlers()
        .filter_map(|(handler, endpoints)| {
            let methods: Vec<&str> = endpoints
                .iter()
                .filter(|e| e.path_pattern == UNRESOLVED_PATH)
                .map(|e| e.http_method.as_str())
                .collect();
            if methods.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} registers {} routes whose path is only known at runtime",
                    handler.qualified_name,
                    join(&methods)
                ),
                vec![EvidenceRef::symbol(&handler.id)],
            ))
        })
        .collect()
}

/// `import a.b` -> `a.b`; `from a import b` -> `a.b` and `a`
fn import_targets(statement: &str) -> Vec<String> {
    if let Some(rest) = statement.strip_prefix("from ") {
        let Some((module, name)) = rest.split_once(" import ") else {
            return Vec::new();
        };
        let module = module.trim();
        let name = name.trim();
        let joined = if module.ends_with('.') {
            format!("{module}{name}")
        } else {
            format!("{module}.{name}")
        };
        return vec![joined, module.to_string()];
    }
    statement
        .strip_prefix("import ")
        .map(|module| vec![module.trim().to_string()])
        .unwrap_or_default()
}

fn parse_coverage_gap(view: &ModelView<'_>) -> Vec<Proposal> {
    if view.model.parse_failures.is_empty() {
        return Vec::new();
    }
    view.handlers()
        .filter_map(|(handler, _)| {
            let module = view.module_of(&handler.file)?;
            let mut failed: Vec<&str> = module
                .imports
                .iter()
                .flat_map(|statement| import_targets(statement))
                .filter_map(|target| view.failed_module(&target))
                .filter(|file| *file != handler.file)
                .collect();
            failed.sort_unstable();
            failed.dedup();
            if failed.is_empty() {
                return None;
            }
            Some(Proposal::new(
                format!(
                    "{} depends on {}, which could not be parsed; its behavior is only partially extracted",
                    subject(view, handler),
                    join(&failed)
                ),
                vec![EvidenceRef::symbol(&handler.id)],
            ))
        })
        .collect()
}
