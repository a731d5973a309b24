//! Route matcher registry.
//!
//! Routing conventions are recognized by matchers over syntax-free call shapes,
//! so a new framework only needs a new [`RouteMatcher`] registered here; the
//! traversal in `analyzer` never changes.

use codelore_model::{normalize_path_pattern, HttpMethod};

/// Argument value as seen by a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Plain string literal (implicit concatenation already joined)
    Str(String),
    /// List or tuple literal
    List(Vec<ArgValue>),
    /// Identifier or dotted attribute chain
    Name(String),
    /// Anything else, kept as flattened source text
    Other(String),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(value) => Some(value),
            _ => None,
        }
    }

    /// Source-like text of the value
    pub fn text(&self) -> String {
        match self {
            Self::Str(value) => format!("\"{value}\""),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(ArgValue::text).collect();
                format!("[{}]", inner.join(", "))
            }
            Self::Name(value) | Self::Other(value) => value.clone(),
        }
    }
}

/// A call expression reduced to what matchers look at.
///
/// `callee = "app.get"` splits into `receiver = Some("app")`, `method = "get"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallShape {
    pub callee: String,
    pub receiver: Option<String>,
    pub method: String,
    pub args: Vec<ArgValue>,
    pub keywords: Vec<(String, ArgValue)>,
    /// False for bare decorators such as `@login_required`
    pub invoked: bool,
    pub line: usize,
}

/// Decorators and call statements share one shape
pub type DecoratorShape = CallShape;

impl CallShape {
    pub fn new(callee: impl Into<String>, line: usize) -> Self {
        let callee = callee.into();
        let (receiver, method) = match callee.rsplit_once('.') {
            Some((receiver, method)) => (Some(receiver.to_string()), method.to_string()),
            None => (None, callee.clone()),
        };
        Self {
            callee,
            receiver,
            method,
            args: Vec::new(),
            keywords: Vec::new(),
            invoked: false,
            line,
        }
    }

    pub fn keyword(&self, name: &str) -> Option<&ArgValue> {
        self.keywords
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Positional argument `index`, else the first of the named keywords present
    pub fn arg_or_keyword(&self, index: usize, names: &[&str]) -> Option<&ArgValue> {
        self.args
            .get(index)
            .or_else(|| names.iter().find_map(|name| self.keyword(name)))
    }
}

/// Route path as declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePath {
    /// Normalized literal path
    Literal(String),
    /// Path only known at runtime
    Dynamic,
}

impl RoutePath {
    fn from_arg(arg: Option<&ArgValue>) -> Self {
        match arg.and_then(ArgValue::as_str) {
            Some(raw) => Self::Literal(normalize_path_pattern(raw)),
            None => Self::Dynamic,
        }
    }
}

/// One endpoint proposed by a matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub method: HttpMethod,
    pub path: RoutePath,
    /// Raw `response_model=` text
    pub response_model: Option<String>,
    /// Handler function named by a call-style registration
    pub handler: Option<String>,
}

/// Recognizes one routing convention
pub trait RouteMatcher: Send + Sync {
    /// Stable name recorded on every endpoint this matcher produces
    fn name(&self) -> &'static str;

    /// Routes declared by a decorator on a function definition
    fn match_decorator(&self, _shape: &DecoratorShape) -> Vec<RouteMatch> {
        Vec::new()
    }

    /// Routes registered by a call statement
    fn match_call(&self, _shape: &CallShape) -> Vec<RouteMatch> {
        Vec::new()
    }
}

/// Routes recognized by a registry, tagged with the matcher that produced them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoutes {
    pub matcher: &'static str,
    pub routes: Vec<RouteMatch>,
}

/// Ordered matcher registry; the first matcher returning routes wins
pub struct MatcherRegistry {
    matchers: Vec<Box<dyn RouteMatcher>>,
}

impl MatcherRegistry {
    /// Registry without any matcher
    #[must_use]
    pub fn empty() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Built-in matchers in registration order
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(MethodDecoratorMatcher);
        registry.register(RouteDecoratorMatcher);
        registry.register(UrlRuleCallMatcher);
        registry
    }

    pub fn register(&mut self, matcher: impl RouteMatcher + 'static) {
        self.matchers.push(Box::new(matcher));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    pub fn match_decorator(&self, shape: &DecoratorShape) -> Option<MatchedRoutes> {
        self.first_match(|matcher| matcher.match_decorator(shape))
    }

    pub fn match_call(&self, shape: &CallShape) -> Option<MatchedRoutes> {
        self.first_match(|matcher| matcher.match_call(shape))
    }

    fn first_match(
        &self,
        attempt: impl Fn(&dyn RouteMatcher) -> Vec<RouteMatch>,
    ) -> Option<MatchedRoutes> {
        self.matchers.iter().find_map(|matcher| {
            let routes = attempt(matcher.as_ref());
            (!routes.is_empty()).then(|| MatchedRoutes {
                matcher: matcher.name(),
                routes,
            })
        })
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

const PATH_KEYWORDS: &[&str] = &["path", "rule"];

/// `methods=[...]` as HTTP methods in declaration order; GET when absent or not a literal list
fn listed_methods(shape: &CallShape) -> Vec<HttpMethod> {
    let mut methods = Vec::new();
    if let Some(ArgValue::List(items)) = shape.keyword("methods") {
        for method in items
            .iter()
            .filter_map(ArgValue::as_str)
            .filter_map(HttpMethod::parse)
        {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
    }
    if methods.is_empty() {
        methods.push(HttpMethod::Get);
    }
    methods
}

fn response_model(shape: &CallShape) -> Option<String> {
    shape
        .keyword("response_model")
        .filter(|value| !matches!(value, ArgValue::Str(_)))
        .map(ArgValue::text)
        .filter(|text| text != "None")
}

/// `@app.get("/items/{id}")`, `@router.post(...)`, `@bp.delete(...)`
pub struct MethodDecoratorMatcher;

impl RouteMatcher for MethodDecoratorMatcher {
    fn name(&self) -> &'static str {
        "method_decorator"
    }

    fn match_decorator(&self, shape: &DecoratorShape) -> Vec<RouteMatch> {
        if !shape.invoked || shape.receiver.is_none() {
            return Vec::new();
        }
        let Some(method) = HttpMethod::parse(&shape.method) else {
            return Vec::new();
        };
        // `@api.GET` is not a routing decorator
        if shape.method != shape.method.to_ascii_lowercase() {
            return Vec::new();
        }
        vec![RouteMatch {
            method,
            path: RoutePath::from_arg(shape.arg_or_keyword(0, PATH_KEYWORDS)),
            response_model: response_model(shape),
            handler: None,
        }]
    }
}

/// `@app.route("/login", methods=["GET", "POST"])` and `@app.api_route(...)`
pub struct RouteDecoratorMatcher;

impl RouteMatcher for RouteDecoratorMatcher {
    fn name(&self) -> &'static str {
        "route_decorator"
    }

    fn match_decorator(&self, shape: &DecoratorShape) -> Vec<RouteMatch> {
        if !shape.invoked
            || shape.receiver.is_none()
            || !matches!(shape.method.as_str(), "route" | "api_route")
        {
            return Vec::new();
        }
        let path = RoutePath::from_arg(shape.arg_or_keyword(0, PATH_KEYWORDS));
        let response_model = response_model(shape);
        listed_methods(shape)
            .into_iter()
            .map(|method| RouteMatch {
                method,
                path: path.clone(),
                response_model: response_model.clone(),
                handler: None,
            })
            .collect()
    }
}

/// `app.add_url_rule("/", view_func=index)` and `app.add_api_route("/", index)`
pub struct UrlRuleCallMatcher;

impl RouteMatcher for UrlRuleCallMatcher {
    fn name(&self) -> &'static str {
        "url_rule_call"
    }

    fn match_call(&self, shape: &CallShape) -> Vec<RouteMatch> {
        if shape.receiver.is_none() {
            return Vec::new();
        }
        let handler = match shape.method.as_str() {
            "add_url_rule" => shape.arg_or_keyword(2, &["view_func"]),
            "add_api_route" => shape.arg_or_keyword(1, &["endpoint"]),
            _ => return Vec::new(),
        };
        let Some(handler) = handler
            .and_then(ArgValue::as_name)
            .filter(|name| !name.contains('.'))
        else {
            return Vec::new();
        };
        let path = RoutePath::from_arg(shape.arg_or_keyword(0, PATH_KEYWORDS));
        let response_model = response_model(shape);
        listed_methods(shape)
            .into_iter()
            .map(|method| RouteMatch {
                method,
                path: path.clone(),
                response_model: response_model.clone(),
                handler: Some(handler.to_string()),
            })
            .collect()
    }
}
