//! Jinja/Django markup scanner.

use crate::error::{Result, TemplateError};
use codelore_model::{IncludeKind, TemplateArtifact, TemplateBlock, TemplateInclude, UNRESOLVED_PATH};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{\{(.*?)\}\}|\{%(.*?)%\}|\{#.*?#\}").expect("valid tag regex")
});

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|\d+(?:\.\d+)?|[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*|==|!=|<=|>=|\*\*|//|\S"#,
    )
    .expect("valid token regex")
});

static OPENER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{|\{%|\{#").expect("valid opener regex"));

/// Names that are never template context variables
const RESERVED: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "elif", "true", "false", "none", "True", "False",
    "None", "loop", "super", "self", "caller", "varargs", "kwargs", "recursive", "forloop", "block",
    "with", "only", "ignore", "missing", "as", "without", "context",
];

/// Scan template bytes at a repository-relative `path`
pub fn scan_template_bytes(path: &str, bytes: &[u8]) -> Result<TemplateArtifact> {
    let content = std::str::from_utf8(bytes).map_err(|e| TemplateError::InvalidUtf8 {
        offset: e.valid_up_to(),
    })?;
    scan_template(path, content)
}

/// Scan template markup for variables, control blocks and template references
pub fn scan_template(path: &str, content: &str) -> Result<TemplateArtifact> {
    let mut scan = Scan::default();
    let mut cursor = 0;
    let mut raw_depth = 0usize;

    for tag in TAG_RE.captures_iter(content) {
        let Some(whole) = tag.get(0) else {
            continue;
        };
        if raw_depth == 0 {
            check_terminated(content, cursor, whole.start())?;
        }
        cursor = whole.end();
        let line = line_of(content, whole.start());

        if let Some(statement) = tag.get(2) {
            let statement = trim_control(statement.as_str());
            let keyword = statement.split_whitespace().next().unwrap_or_default();
            match keyword {
                "raw" | "verbatim" => raw_depth += 1,
                "endraw" | "endverbatim" => raw_depth = raw_depth.saturating_sub(1),
                _ if raw_depth == 0 => scan.statement(statement, line),
                _ => {}
            }
        } else if let Some(expression) = tag.get(1) {
            if raw_depth == 0 {
                scan.expression(trim_control(expression.as_str()));
            }
        }
    }
    if raw_depth == 0 {
        check_terminated(content, cursor, content.len())?;
    }

    let mut artifact = TemplateArtifact::new(path);
    artifact.variables_referenced = scan
        .variables
        .into_iter()
        .filter(|v| {
            let head = v.split('.').next().unwrap_or(v);
            !scan.bound.contains(head)
        })
        .collect();
    artifact.blocks = scan.blocks;
    artifact.includes = scan.includes;
    Ok(artifact)
}

/// An opener left in plain text means a tag never closed
fn check_terminated(content: &str, from: usize, to: usize) -> Result<()> {
    match OPENER_RE.find(&content[from..to]) {
        Some(opener) => Err(TemplateError::Unterminated {
            opener: match opener.as_str() {
                "{{" => "{{",
                "{%" => "{%",
                _ => "{#",
            },
            line: line_of(content, from + opener.start()),
        }),
        None => Ok(()),
    }
}

fn line_of(content: &str, offset: usize) -> usize {
    content[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

/// Strip `-`/`+` whitespace control and surrounding blanks
fn trim_control(inner: &str) -> &str {
    inner
        .trim()
        .trim_start_matches(['-', '+'])
        .trim_end_matches(['-', '+'])
        .trim()
}

#[derive(Default)]
struct Scan {
    variables: BTreeSet<String>,
    bound: BTreeSet<String>,
    blocks: Vec<TemplateBlock>,
    includes: Vec<TemplateInclude>,
}

impl Scan {
    fn statement(&mut self, statement: &str, line: usize) {
        let (tag, rest) = statement
            .split_once(char::is_whitespace)
            .map_or((statement, ""), |(tag, rest)| (tag, rest.trim()));

        match tag {
            "extends" => self.reference(IncludeKind::Extends, rest, line),
            "include" => self.reference(IncludeKind::Include, rest, line),
            "import" => {
                self.reference(IncludeKind::Import, rest, line);
                if let Some((_, alias)) = rest.rsplit_once(" as ") {
                    self.bind(alias);
                }
            }
            "from" => {
                self.reference(IncludeKind::Import, rest, line);
                if let Some((_, names)) = rest.split_once(" import ") {
                    for name in names.split(',') {
                        let name = name.trim();
                        let bound = name.rsplit_once(" as ").map_or(name, |(_, alias)| alias);
                        self.bind(bound);
                    }
                }
            }
            "block" | "filter" => {
                let label = rest.split_whitespace().next().unwrap_or_default();
                self.block(tag, label, line);
            }
            "for" => {
                if let Some((targets, iterable)) = rest.split_once(" in ") {
                    for target in targets.split(',') {
                        self.bind(target);
                    }
                    self.expression(iterable);
                }
                self.block(tag, rest, line);
            }
            "if" | "elif" => {
                self.expression(rest);
                if tag == "if" {
                    self.block(tag, rest, line);
                }
            }
            "macro" => {
                let (name, params) = rest.split_once('(').unwrap_or((rest, ""));
                self.bind(name);
                for param in params.trim_end_matches(')').split(',') {
                    let (param, default) = param.split_once('=').unwrap_or((param, ""));
                    self.bind(param);
                    self.expression(default);
                }
                self.block(tag, name.trim(), line);
            }
            "call" => {
                self.expression(rest);
                self.block(tag, rest, line);
            }
            "with" => {
                for assignment in rest.split(',') {
                    match assignment.split_once('=') {
                        Some((name, value)) => {
                            self.bind(name);
                            self.expression(value);
                        }
                        None => self.expression(assignment),
                    }
                }
                self.block(tag, rest, line);
            }
            "set" => match rest.split_once('=') {
                Some((names, value)) => {
                    for name in names.split(',') {
                        self.bind(name);
                    }
                    self.expression(value);
                }
                None => self.bind(rest),
            },
            _ => {}
        }
    }

    /// Include-like tag; a literal target is recorded as written, anything else as dynamic
    fn reference(&mut self, kind: IncludeKind, rest: &str, line: usize) {
        let first = TOKEN_RE.find(rest).map(|m| m.as_str()).unwrap_or_default();
        let target = match unquote(first) {
            Some(literal) => literal.to_string(),
            None => {
                let expr = rest.split(" import ").next().unwrap_or(rest);
                let expr = expr.split(" as ").next().unwrap_or(expr);
                self.expression(expr);
                UNRESOLVED_PATH.to_string()
            }
        };
        self.includes.push(TemplateInclude {
            kind,
            target,
            resolved: None,
            line,
        });
    }

    fn block(&mut self, kind: &str, label: &str, line: usize) {
        self.blocks.push(TemplateBlock {
            kind: kind.to_string(),
            label: label.trim().to_string(),
            line,
        });
    }

    fn bind(&mut self, name: &str) {
        let name = name.trim().trim_start_matches('*');
        if !name.is_empty() {
            self.bound.insert(name.to_string());
        }
    }

    /// Collect dotted name chains from an expression
    fn expression(&mut self, expr: &str) {
        let tokens: Vec<&str> = TOKEN_RE.find_iter(expr).map(|m| m.as_str()).collect();
        for (idx, token) in tokens.iter().enumerate() {
            if !is_name_chain(token) {
                continue;
            }
            let prev = idx.checked_sub(1).map(|i| tokens[i]);
            let prev2 = idx.checked_sub(2).map(|i| tokens[i]);
            let next = tokens.get(idx + 1).copied();

            // attribute after a subscript or call, filter name, test name, keyword argument
            if matches!(prev, Some("." | "|" | "is"))
                || (prev == Some("not") && prev2 == Some("is"))
                || next == Some("=")
            {
                continue;
            }

            let chain = if next == Some("(") {
                match token.rsplit_once('.') {
                    Some((receiver, _)) => receiver,
                    None => continue,
                }
            } else {
                token
            };
            let head = chain.split('.').next().unwrap_or(chain);
            if RESERVED.contains(&head) {
                continue;
            }
            self.variables.insert(chain.to_string());
        }
    }
}

fn is_name_chain(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

fn unquote(token: &str) -> Option<&str> {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn collects_interpolated_variables() {
        let artifact = scan_template(
            "templates/item.html",
            "<h1>{{ item.name | title }}</h1>\n<p>{{ item.price|round(2) }} {{ currency }}</p>\n{{ url_for('static', filename='x.css') }}\n",
        )
        .unwrap();
        assert_eq!(artifact.id, "templates/item.html");
        assert_eq!(
            artifact.variables_referenced,
            vec!["currency", "item.name", "item.price"]
        );
    }

    #[test]
    fn loop_targets_and_set_names_are_local() {
        let artifact = scan_template(
            "list.html",
            "{% for row in rows if row.visible %}\n{{ row.title }} {{ loop.index }}\n{% endfor %}\n{% set total = rows|length %}{{ total }}\n",
        )
        .unwrap();
        assert_eq!(artifact.variables_referenced, vec!["rows"]);
        assert_eq!(artifact.blocks.len(), 1);
        assert_eq!(artifact.blocks[0].kind, "for");
        assert_eq!(artifact.blocks[0].line, 1);
    }

    #[test]
    fn records_blocks_and_references() {
        let artifact = scan_template(
            "templates/page.html",
            "{%- extends \"base.html\" -%}\n{% import 'forms.html' as forms %}\n{% block content %}\n{% include layout %}\n{{ forms.input(user.email) }}\n{% endblock %}\n",
        )
        .unwrap();
        let includes: Vec<(IncludeKind, &str, usize)> = artifact
            .includes
            .iter()
            .map(|i| (i.kind, i.target.as_str(), i.line))
            .collect();
        assert_eq!(
            includes,
            vec![
                (IncludeKind::Extends, "base.html", 1),
                (IncludeKind::Import, "forms.html", 2),
                (IncludeKind::Include, UNRESOLVED_PATH, 4),
            ]
        );
        assert_eq!(artifact.block_names().collect::<Vec<_>>(), vec!["content"]);
        assert_eq!(artifact.variables_referenced, vec!["layout", "user.email"]);
    }

    #[test]
    fn comments_and_raw_sections_are_skipped() {
        let artifact = scan_template(
            "x.html",
            "{# {{ hidden }} #}{% raw %}{{ literal }}{% endraw %}{{ shown }}",
        )
        .unwrap();
        assert_eq!(artifact.variables_referenced, vec!["shown"]);
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let err = scan_template("bad.html", "<p>\n{{ item.name </p>\n").unwrap_err();
        assert_eq!(
            err,
            TemplateError::Unterminated {
                opener: "{{",
                line: 2
            }
        );
    }

    #[test]
    fn macro_parameters_are_local() {
        let artifact = scan_template(
            "macros.html",
            "{% macro field(name, value='', kind=default_kind) %}{{ name }}{{ value }}{% endmacro %}",
        )
        .unwrap();
        assert_eq!(artifact.variables_referenced, vec!["default_kind"]);
        assert_eq!(artifact.blocks[0].label, "field");
    }
}
