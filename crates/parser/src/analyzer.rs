use crate::error::{ParserError, Result};
use crate::facts::collect_body_facts;
use crate::hints::{request_model_hint, response_model_hint};
use crate::language::tree_sitter_language;
use crate::routes::{ArgValue, CallShape, MatcherRegistry, RouteMatch, RoutePath};
use crate::syntax::{
    collapse_whitespace, docstring, docstring_node, dotted_path, end_line, field_text,
    first_error, flat_text, named_children, start_line, string_value, text,
};
use codelore_model::{
    capped_snippet, join_prefixed, module_qualified_name, Dialect, Endpoint, Field, ParseFailure,
    Parameter, Symbol, SymbolKind, UNRESOLVED_PATH,
};
use std::collections::HashMap;
use std::sync::Arc;
use tree_sitter::{Node, Parser};

/// Router constructors whose `prefix`/`url_prefix` applies to routes declared on them
const ROUTER_CONSTRUCTORS: &[&str] = &["APIRouter", "Blueprint"];
const PREFIX_KEYWORDS: &[&str] = &["prefix", "url_prefix"];

/// Statements whose blocks run in the enclosing scope
const COMPOUND_STATEMENTS: &[&str] = &[
    "if_statement",
    "try_statement",
    "with_statement",
    "for_statement",
    "while_statement",
    "match_statement",
    "case_clause",
];
const CLAUSES: &[&str] = &[
    "elif_clause",
    "else_clause",
    "except_clause",
    "except_group_clause",
    "finally_clause",
];

/// Prefix bound to a router variable
#[derive(Debug, Clone, PartialEq, Eq)]
enum Prefix {
    Literal(String),
    /// Present but not a string literal; routes on the router cannot be resolved
    Dynamic,
}

/// Symbols and endpoints of one parsed file, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileModel {
    pub symbols: Vec<Symbol>,
    pub endpoints: Vec<Endpoint>,
}

/// Result of parsing one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Parsed(FileModel),
    Failed(ParseFailure),
}

/// Syntax-tree parser for Python source modules.
///
/// One instance per worker; the matcher registry is shared.
pub struct StructuralParser {
    parser: Parser,
    registry: Arc<MatcherRegistry>,
}

impl StructuralParser {
    /// Parser with the built-in route matchers
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(MatcherRegistry::builtin()))
    }

    pub fn with_registry(registry: Arc<MatcherRegistry>) -> Result<Self> {
        let language = tree_sitter_language(Dialect::Python)?;
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| ParserError::tree_sitter(format!("Failed to set language: {e}")))?;
        Ok(Self { parser, registry })
    }

    /// Parse raw file bytes; invalid UTF-8 is a parse failure
    pub fn parse_bytes(&mut self, path: &str, bytes: &[u8]) -> FileOutcome {
        match std::str::from_utf8(bytes) {
            Ok(content) => self.parse(path, content),
            Err(err) => FileOutcome::Failed(ParseFailure {
                file: path.to_string(),
                reason: ParserError::from(err).to_string(),
                line: None,
            }),
        }
    }

    /// Parse one module at a repository-relative `path`
    pub fn parse(&mut self, path: &str, content: &str) -> FileOutcome {
        let Some(tree) = self.parser.parse(content, None) else {
            return FileOutcome::Failed(ParseFailure {
                file: path.to_string(),
                reason: "parser produced no syntax tree".to_string(),
                line: None,
            });
        };
        let root = tree.root_node();

        if let Some(error) = first_error(root) {
            let position = error.start_position();
            let reason = if error.is_missing() {
                format!(
                    "syntax error at line {}, column {}: missing {}",
                    position.row + 1,
                    position.column + 1,
                    error.kind()
                )
            } else {
                format!(
                    "syntax error at line {}, column {}",
                    position.row + 1,
                    position.column + 1
                )
            };
            log::debug!("{path}: {reason}");
            return FileOutcome::Failed(ParseFailure {
                file: path.to_string(),
                reason,
                line: Some(position.row + 1),
            });
        }

        let mut walk = FileWalk::new(path, content, &self.registry);
        walk.module(root);
        FileOutcome::Parsed(walk.finish())
    }
}

/// A route waiting for prefix resolution and its handler ordinal
struct PendingRoute {
    symbol: usize,
    matcher: &'static str,
    receiver: Option<String>,
    route: RouteMatch,
}

/// Call-style registration naming its handler by function name
struct PendingCall {
    line: usize,
    matcher: &'static str,
    receiver: Option<String>,
    routes: Vec<RouteMatch>,
}

struct FileWalk<'a> {
    path: &'a str,
    content: &'a str,
    registry: &'a MatcherRegistry,
    symbols: Vec<Symbol>,
    definitions: HashMap<String, usize>,
    /// Top-level function name -> symbol indexes in declaration order
    top_level: HashMap<String, Vec<usize>>,
    prefixes: HashMap<String, Prefix>,
    routes: Vec<PendingRoute>,
    calls: Vec<PendingCall>,
}

impl<'a> FileWalk<'a> {
    fn new(path: &'a str, content: &'a str, registry: &'a MatcherRegistry) -> Self {
        Self {
            path,
            content,
            registry,
            symbols: Vec::new(),
            definitions: HashMap::new(),
            top_level: HashMap::new(),
            prefixes: HashMap::new(),
            routes: Vec::new(),
            calls: Vec::new(),
        }
    }

    fn module(&mut self, root: Node) {
        let line_count = self.content.lines().count().max(1);
        let mut module = Symbol::new(
            SymbolKind::Module,
            self.path,
            module_qualified_name(self.path),
            1,
            line_count,
        );
        module.docstring = docstring(self.content, root);
        module.imports = self.imports(root);
        self.push(module);

        for child in named_children(root) {
            self.statement(child, "");
        }
    }

    /// One statement of a module, class or function body inside `scope`
    fn statement(&mut self, node: Node, scope: &str) {
        match node.kind() {
            "expression_statement" if scope.is_empty() => self.module_statement(node),
            kind if COMPOUND_STATEMENTS.contains(&kind) => {
                for block in compound_blocks(node) {
                    for child in named_children(block) {
                        self.statement(child, scope);
                    }
                }
            }
            _ => self.definition(node, scope),
        }
    }

    /// Function, class or decorated definition inside `scope`
    fn definition(&mut self, node: Node, scope: &str) {
        match node.kind() {
            "function_definition" => self.function(node, Vec::new(), node, scope),
            "class_definition" => self.class(node, Vec::new(), node, scope),
            "decorated_definition" => {
                let decorators: Vec<Node> = named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() == "decorator")
                    .collect();
                let Some(definition) = node.child_by_field_name("definition") else {
                    return;
                };
                match definition.kind() {
                    "function_definition" => self.function(definition, decorators, node, scope),
                    "class_definition" => self.class(definition, decorators, node, scope),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn function(&mut self, node: Node, decorators: Vec<Node>, outer: Node, scope: &str) {
        let Some(name) = node.child_by_field_name("name").map(|n| text(self.content, n)) else {
            return;
        };
        let qualified = qualify(scope, name);
        let mut symbol = Symbol::new(
            SymbolKind::Function,
            self.path,
            qualified.clone(),
            start_line(outer),
            end_line(outer),
        );
        symbol.snippet = Some(capped_snippet(text(self.content, outer)));
        symbol.is_async = node.child(0).is_some_and(|c| c.kind() == "async");
        symbol.parameters = node
            .child_by_field_name("parameters")
            .map(|p| self.parameters(p))
            .unwrap_or_default();
        symbol.return_type = field_text(self.content, node, "return_type");
        symbol.decorators = decorators
            .iter()
            .map(|d| self.decorator_text(*d))
            .collect();

        let body = node.child_by_field_name("body");
        if let Some(body) = body {
            symbol.docstring = docstring(self.content, body);
            symbol.body = Some(collect_body_facts(self.content, body, docstring_node(body)));
        }

        let mut matched = Vec::new();
        for decorator in &decorators {
            let Some(shape) = self.decorator_shape(*decorator) else {
                continue;
            };
            if let Some(found) = self.registry.match_decorator(&shape) {
                for route in found.routes {
                    matched.push((found.matcher, shape.receiver.clone(), route));
                }
            }
        }
        if !matched.is_empty() {
            symbol.kind = SymbolKind::Endpoint;
        }

        let index = self.push(symbol);
        if scope.is_empty() {
            self.top_level.entry(name.to_string()).or_default().push(index);
        }
        for (matcher, receiver, route) in matched {
            self.routes.push(PendingRoute {
                symbol: index,
                matcher,
                receiver,
                route,
            });
        }

        if let Some(body) = body {
            for child in named_children(body) {
                self.statement(child, &qualified);
            }
        }
    }

    fn class(&mut self, node: Node, decorators: Vec<Node>, outer: Node, scope: &str) {
        let Some(name) = node.child_by_field_name("name").map(|n| text(self.content, n)) else {
            return;
        };
        let qualified = qualify(scope, name);
        let mut symbol = Symbol::new(
            SymbolKind::Class,
            self.path,
            qualified.clone(),
            start_line(outer),
            end_line(outer),
        );
        symbol.snippet = Some(capped_snippet(text(self.content, outer)));
        symbol.decorators = decorators
            .iter()
            .map(|d| self.decorator_text(*d))
            .collect();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            symbol.bases = named_children(superclasses)
                .into_iter()
                .filter(|b| b.kind() != "keyword_argument" && b.kind() != "comment")
                .map(|b| flat_text(self.content, b))
                .collect();
        }

        let body = node.child_by_field_name("body");
        if let Some(body) = body {
            symbol.docstring = docstring(self.content, body);
            symbol.fields = named_children(body)
                .into_iter()
                .filter(|c| c.kind() == "expression_statement")
                .filter_map(|c| self.field(c))
                .collect();
        }
        self.push(symbol);

        if let Some(body) = body {
            for child in named_children(body) {
                self.statement(child, &qualified);
            }
        }
    }

    /// `name: T = default` or `name = Call(...)` at class level
    fn field(&self, statement: Node) -> Option<Field> {
        let assignment = named_children(statement)
            .into_iter()
            .find(|c| c.kind() == "assignment")?;
        let left = assignment.child_by_field_name("left")?;
        if left.kind() != "identifier" {
            return None;
        }
        let name = text(self.content, left);
        if name.starts_with("__") && name.ends_with("__") {
            return None;
        }
        let annotation = field_text(self.content, assignment, "type");
        let right = assignment.child_by_field_name("right");
        if annotation.is_none() && !right.is_some_and(|r| r.kind() == "call") {
            return None;
        }
        let default = right.map(|r| flat_text(self.content, r));
        let required = annotation.is_some()
            && default.as_deref().map_or(true, |d| {
                d == "..." || d.starts_with("Field(...") || d.starts_with("Field( ...")
            });
        Some(Field {
            name: name.to_string(),
            annotation,
            default,
            required,
        })
    }

    fn parameters(&self, node: Node) -> Vec<Parameter> {
        named_children(node)
            .into_iter()
            .filter_map(|param| {
                let (name, annotation, default) = match param.kind() {
                    "identifier" => (text(self.content, param).to_string(), None, None),
                    "list_splat_pattern" | "dictionary_splat_pattern" => {
                        (flat_text(self.content, param), None, None)
                    }
                    "typed_parameter" => {
                        let name = named_children(param).into_iter().next()?;
                        (
                            flat_text(self.content, name),
                            field_text(self.content, param, "type"),
                            None,
                        )
                    }
                    "default_parameter" | "typed_default_parameter" => (
                        field_text(self.content, param, "name")?,
                        field_text(self.content, param, "type"),
                        field_text(self.content, param, "value"),
                    ),
                    _ => return None,
                };
                Some(Parameter {
                    name,
                    annotation,
                    default,
                })
            })
            .collect()
    }

    fn decorator_expression(decorator: Node<'_>) -> Option<Node<'_>> {
        named_children(decorator)
            .into_iter()
            .find(|c| c.kind() != "comment")
    }

    fn decorator_text(&self, decorator: Node) -> String {
        match Self::decorator_expression(decorator) {
            Some(expr) => flat_text(self.content, expr),
            None => collapse_whitespace(text(self.content, decorator).trim_start_matches('@')),
        }
    }

    fn decorator_shape(&self, decorator: Node) -> Option<CallShape> {
        let expr = Self::decorator_expression(decorator)?;
        if expr.kind() == "call" {
            return self.call_shape(expr);
        }
        let callee = dotted_path(self.content, expr)?;
        Some(CallShape::new(callee, start_line(decorator)))
    }

    fn call_shape(&self, call: Node) -> Option<CallShape> {
        let function = call.child_by_field_name("function")?;
        let callee = dotted_path(self.content, function)?;
        let mut shape = CallShape::new(callee, start_line(call));
        shape.invoked = true;
        if let Some(arguments) = call.child_by_field_name("arguments") {
            for arg in named_children(arguments) {
                match arg.kind() {
                    "keyword_argument" => {
                        let (Some(key), Some(value)) = (
                            arg.child_by_field_name("name"),
                            arg.child_by_field_name("value"),
                        ) else {
                            continue;
                        };
                        shape
                            .keywords
                            .push((text(self.content, key).to_string(), self.arg_value(value)));
                    }
                    "comment" => {}
                    _ => shape.args.push(self.arg_value(arg)),
                }
            }
        }
        Some(shape)
    }

    fn arg_value(&self, node: Node) -> ArgValue {
        match node.kind() {
            "string" | "concatenated_string" => match string_value(self.content, node) {
                Some(value) => ArgValue::Str(value),
                None => ArgValue::Other(flat_text(self.content, node)),
            },
            "list" | "tuple" | "set" => ArgValue::List(
                named_children(node)
                    .into_iter()
                    .filter(|c| c.kind() != "comment")
                    .map(|c| self.arg_value(c))
                    .collect(),
            ),
            "identifier" | "attribute" => match dotted_path(self.content, node) {
                Some(name) => ArgValue::Name(name),
                None => ArgValue::Other(flat_text(self.content, node)),
            },
            _ => ArgValue::Other(flat_text(self.content, node)),
        }
    }

    /// Router prefixes and call-style route registrations
    fn module_statement(&mut self, statement: Node) {
        for expr in named_children(statement) {
            match expr.kind() {
                "assignment" => self.router_assignment(expr),
                "call" => {
                    let Some(shape) = self.call_shape(expr) else {
                        continue;
                    };
                    if let Some(found) = self.registry.match_call(&shape) {
                        self.calls.push(PendingCall {
                            line: shape.line,
                            matcher: found.matcher,
                            receiver: shape.receiver.clone(),
                            routes: found.routes,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn router_assignment(&mut self, assignment: Node) {
        let (Some(left), Some(right)) = (
            assignment.child_by_field_name("left"),
            assignment.child_by_field_name("right"),
        ) else {
            return;
        };
        if left.kind() != "identifier" || right.kind() != "call" {
            return;
        }
        let Some(shape) = self.call_shape(right) else {
            return;
        };
        if !ROUTER_CONSTRUCTORS.contains(&shape.method.as_str()) {
            return;
        }
        let Some(value) = PREFIX_KEYWORDS.iter().find_map(|k| shape.keyword(k)) else {
            return;
        };
        let prefix = match value {
            ArgValue::Str(literal) => Prefix::Literal(literal.clone()),
            ArgValue::Name(name) if name == "None" => return,
            _ => Prefix::Dynamic,
        };
        self.prefixes
            .insert(text(self.content, left).to_string(), prefix);
    }

    fn imports(&self, root: Node) -> Vec<String> {
        let mut imports = Vec::new();
        self.collect_imports(root, &mut imports);
        imports.sort();
        imports.dedup();
        imports
    }

    fn collect_imports(&self, node: Node, out: &mut Vec<String>) {
        match node.kind() {
            "import_statement" => {
                for name in self.imported_names(node) {
                    out.push(format!("import {name}"));
                }
            }
            "import_from_statement" => {
                let module = field_text(self.content, node, "module_name").unwrap_or_default();
                let mut names = self.imported_names(node);
                if named_children(node).iter().any(|c| c.kind() == "wildcard_import") {
                    names.push("*".to_string());
                }
                for name in names {
                    out.push(format!("from {module} import {name}"));
                }
            }
            "future_import_statement" => {
                for name in self.imported_names(node) {
                    out.push(format!("from __future__ import {name}"));
                }
            }
            _ => {
                for child in named_children(node) {
                    self.collect_imports(child, out);
                }
            }
        }
    }

    fn imported_names(&self, node: Node) -> Vec<String> {
        let mut cursor = node.walk();
        node.children_by_field_name("name", &mut cursor)
            .filter_map(|name| match name.kind() {
                "aliased_import" => field_text(self.content, name, "name"),
                _ => Some(flat_text(self.content, name)),
            })
            .collect()
    }

    fn push(&mut self, mut symbol: Symbol) -> usize {
        let seen = self
            .definitions
            .entry(symbol.qualified_name.clone())
            .or_insert(0);
        *seen += 1;
        if *seen > 1 {
            symbol.id = format!("{}#{}", symbol.id, seen);
        }
        self.symbols.push(symbol);
        self.symbols.len() - 1
    }

    /// Handler named by a call registration: the last top-level definition before the call
    fn call_handler(&self, name: &str, line: usize) -> Option<usize> {
        let candidates = self.top_level.get(name)?;
        candidates
            .iter()
            .rev()
            .find(|&&index| self.symbols[index].start_line < line)
            .or_else(|| candidates.first())
            .copied()
    }

    fn finish(mut self) -> FileModel {
        let calls = std::mem::take(&mut self.calls);
        for call in calls {
            for route in call.routes {
                let Some(name) = route.handler.as_deref() else {
                    continue;
                };
                let Some(index) = self.call_handler(name, call.line) else {
                    log::debug!(
                        "{}:{}: route handler '{name}' is not defined in this file",
                        self.path,
                        call.line
                    );
                    continue;
                };
                self.symbols[index].kind = SymbolKind::Endpoint;
                self.routes.push(PendingRoute {
                    symbol: index,
                    matcher: call.matcher,
                    receiver: call.receiver.clone(),
                    route,
                });
            }
        }

        let mut routes = std::mem::take(&mut self.routes);
        routes.sort_by_key(|r| r.symbol);

        let mut ordinals: HashMap<usize, usize> = HashMap::new();
        let mut endpoints = Vec::with_capacity(routes.len());
        for pending in routes {
            let symbol = &self.symbols[pending.symbol];
            let ordinal = ordinals.entry(pending.symbol).or_insert(0);
            let path_pattern = match &pending.route.path {
                RoutePath::Literal(path) => match pending
                    .receiver
                    .as_ref()
                    .and_then(|r| self.prefixes.get(r))
                {
                    Some(Prefix::Literal(prefix)) => join_prefixed(prefix, path),
                    Some(Prefix::Dynamic) => UNRESOLVED_PATH.to_string(),
                    None => path.clone(),
                },
                RoutePath::Dynamic => UNRESOLVED_PATH.to_string(),
            };
            let request_hint = request_model_hint(&symbol.parameters, &path_pattern);
            let response_hint = response_model_hint(
                pending.route.response_model.as_deref(),
                symbol.return_type.as_deref(),
            );
            endpoints.push(Endpoint {
                id: format!("{}#{}", symbol.id, ordinal),
                symbol: symbol.id.clone(),
                http_method: pending.route.method,
                path_pattern,
                matcher: pending.matcher.to_string(),
                request_model: None,
                response_model: None,
                request_model_hint: request_hint,
                response_model_hint: response_hint,
            });
            *ordinal += 1;
        }

        FileModel {
            symbols: self.symbols,
            endpoints,
        }
    }
}

/// Blocks of a compound statement, clauses included, in source order
fn compound_blocks(node: Node) -> Vec<Node> {
    let mut blocks = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "block" => blocks.push(child),
            kind if CLAUSES.contains(&kind) => blocks.extend(compound_blocks(child)),
            _ => {}
        }
    }
    blocks
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}
