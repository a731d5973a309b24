use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lines kept in a symbol snippet
pub const SNIPPET_MAX_LINES: usize = 40;
/// Characters kept in a symbol snippet, after the line cap
pub const SNIPPET_MAX_CHARS: usize = 2000;
/// Appended on its own line when a snippet was cut
pub const SNIPPET_ELLIPSIS: &str = "...";

/// Kind of a structural symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    Class,
    Function,
    /// A callable recognized by a route matcher as a web handler
    Endpoint,
}

impl SymbolKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Endpoint => "endpoint",
        }
    }

    #[must_use]
    pub const fn is_callable(self) -> bool {
        matches!(self, Self::Function | Self::Endpoint)
    }
}

/// Callable parameter; annotation and default are kept as source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Class-level attribute declaration (`name: int = Field(...)`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// No default, or an explicit required marker (`...`, `Field(...)`)
    pub required: bool,
}

/// Facts collected from a callable body. Every list is sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BodyFacts {
    /// Callee expressions (`db.commit`, `render_template`)
    #[serde(default)]
    pub calls: Vec<String>,
    /// Raised expressions, reduced to the exception constructor when called
    #[serde(default)]
    pub raises: Vec<String>,
    /// Identifiers and dotted attribute chains read in the body
    #[serde(default)]
    pub references: Vec<String>,
    /// Plain string literal values (f-strings excluded)
    #[serde(default)]
    pub string_literals: Vec<String>,
}

impl BodyFacts {
    /// Sort and deduplicate every list
    pub fn normalize(&mut self) {
        for list in [
            &mut self.calls,
            &mut self.raises,
            &mut self.references,
            &mut self.string_literals,
        ] {
            list.sort();
            list.dedup();
        }
    }

    /// True when `name` is read directly or as the tail of an attribute chain
    pub fn mentions(&self, name: &str) -> bool {
        let head = format!("{name}.");
        let tail = format!(".{name}");
        let inner = format!(".{name}.");
        self.references.iter().any(|r| {
            r == name || r.starts_with(&head) || r.ends_with(&tail) || r.contains(&inner)
        }) || self.string_literals.iter().any(|s| s == name)
    }

    /// True when any callee's last segment equals one of `names`
    pub fn calls_any(&self, names: &[&str]) -> bool {
        self.calls.iter().any(|call| {
            let tail = call.rsplit('.').next().unwrap_or(call);
            names.iter().any(|n| tail == *n)
        })
    }
}

/// A module, class, function or endpoint handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Symbol {
    /// `"{path}::{qualified_name}"`, stable across formatting-only edits
    pub id: String,
    pub kind: SymbolKind,
    pub name: String,
    pub qualified_name: String,
    /// Repository-relative path of the defining file
    pub file: String,
    /// First line (1-indexed, includes decorators)
    pub start_line: usize,
    /// Last line (1-indexed, inclusive)
    pub end_line: usize,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Decorator expressions without the leading `@`
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// Base-class expressions, recorded as opaque hints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    /// Import statements (module symbols only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyFacts>,
    /// Definition source (decorators included), capped; classes and callables only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Symbol {
    /// Create a bare symbol; optional facts are filled in by the parser
    pub fn new(
        kind: SymbolKind,
        file: impl Into<String>,
        qualified_name: impl Into<String>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        let file = file.into();
        let qualified_name = qualified_name.into();
        let name = qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&qualified_name)
            .to_string();
        Self {
            id: symbol_id(&file, &qualified_name),
            kind,
            name,
            qualified_name,
            file,
            start_line,
            end_line,
            parameters: Vec::new(),
            return_type: None,
            decorators: Vec::new(),
            is_async: false,
            docstring: None,
            bases: Vec::new(),
            fields: Vec::new(),
            imports: Vec::new(),
            body: None,
            snippet: None,
        }
    }

    /// Decorator names with call arguments stripped (`app.get("/x")` -> `app.get`)
    pub fn decorator_names(&self) -> impl Iterator<Item = &str> {
        self.decorators
            .iter()
            .map(|d| d.split('(').next().unwrap_or(d).trim())
    }
}

/// Derive a symbol id from its file and qualified name only
pub fn symbol_id(file: &str, qualified_name: &str) -> String {
    format!("{file}::{qualified_name}")
}

/// Cap definition source at [`SNIPPET_MAX_LINES`] lines and [`SNIPPET_MAX_CHARS`] characters
pub fn capped_snippet(source: &str) -> String {
    let mut cut = false;
    let mut lines: Vec<&str> = Vec::new();
    for (index, line) in source.lines().enumerate() {
        if index == SNIPPET_MAX_LINES {
            cut = true;
            break;
        }
        lines.push(line);
    }
    let mut snippet = lines.join("\n");
    if let Some((byte, _)) = snippet.char_indices().nth(SNIPPET_MAX_CHARS) {
        snippet.truncate(byte);
        cut = true;
    }
    if cut {
        snippet.push('\n');
        snippet.push_str(SNIPPET_ELLIPSIS);
    }
    snippet
}

/// Dotted module path for a repository-relative file (`pkg/__init__.py` -> `pkg`)
pub fn module_qualified_name(path: &str) -> String {
    let without_ext = path
        .rsplit_once('.')
        .map_or(path, |(stem, _)| stem);
    let mut parts: Vec<&str> = without_ext.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() > 1 && parts.last() == Some(&"__init__") {
        parts.pop();
    }
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn symbol_id_depends_only_on_path_and_name() {
        let a = Symbol::new(SymbolKind::Function, "app/main.py", "read_item", 3, 9);
        let b = Symbol::new(SymbolKind::Function, "app/main.py", "read_item", 30, 41);
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, "app/main.py::read_item");
        assert_eq!(a.name, "read_item");
    }

    #[test]
    fn method_name_is_last_segment() {
        let s = Symbol::new(SymbolKind::Function, "m.py", "Repo.save", 1, 2);
        assert_eq!(s.name, "save");
    }

    #[test]
    fn module_names() {
        assert_eq!(module_qualified_name("app/main.py"), "app.main");
        assert_eq!(module_qualified_name("pkg/__init__.py"), "pkg");
        assert_eq!(module_qualified_name("__init__.py"), "__init__");
        assert_eq!(module_qualified_name("tool.pyw"), "tool");
    }

    #[test]
    fn body_mentions_attribute_tail() {
        let facts = BodyFacts {
            references: vec!["item".into(), "item.price.amount".into(), "payload.name".into()],
            ..BodyFacts::default()
        };
        assert!(facts.mentions("name"));
        assert!(facts.mentions("price"));
        assert!(facts.mentions("item"));
        assert!(!facts.mentions("id"));
    }

    #[test]
    fn short_snippet_is_kept_whole() {
        let source = "@app.get(\"/x\")\ndef x():\n    return 1";
        assert_eq!(capped_snippet(source), source);
    }

    #[test]
    fn long_snippet_is_capped_by_lines() {
        let source: String = (0..100).map(|i| format!("    step_{i}()\n")).collect();
        let snippet = capped_snippet(&source);
        let lines: Vec<&str> = snippet.lines().collect();
        assert_eq!(lines.len(), SNIPPET_MAX_LINES + 1);
        assert_eq!(lines[SNIPPET_MAX_LINES - 1], "    step_39()");
        assert_eq!(lines[SNIPPET_MAX_LINES], SNIPPET_ELLIPSIS);
    }

    #[test]
    fn wide_snippet_is_capped_by_chars_on_a_boundary() {
        let source = "é".repeat(SNIPPET_MAX_CHARS + 10);
        let snippet = capped_snippet(&source);
        let kept = snippet.strip_suffix("\n...").unwrap();
        assert_eq!(kept.chars().count(), SNIPPET_MAX_CHARS);
        assert!(kept.chars().all(|c| c == 'é'));
    }

    #[test]
    fn calls_any_matches_tail() {
        let facts = BodyFacts {
            calls: vec!["session.commit".into(), "render_template".into()],
            ..BodyFacts::default()
        };
        assert!(facts.calls_any(&["commit"]));
        assert!(facts.calls_any(&["render_template"]));
        assert!(!facts.calls_any(&["rollback"]));
    }
}
