//! Small readers over tree-sitter-python nodes.

use tree_sitter::Node;

/// Source text of a node
pub(crate) fn text<'a>(content: &'a str, node: Node) -> &'a str {
    &content[node.start_byte()..node.end_byte()]
}

/// Source text with whitespace runs collapsed, so multi-line expressions stay stable
pub(crate) fn flat_text(content: &str, node: Node) -> String {
    collapse_whitespace(text(content, node))
}

pub(crate) fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 1-indexed line of the node start
pub(crate) fn start_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// 1-indexed line of the node end
pub(crate) fn end_line(node: Node) -> usize {
    node.end_position().row + 1
}

pub(crate) fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub(crate) fn field_text(content: &str, node: Node, field: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|child| flat_text(content, child))
}

/// Value of a plain string literal with escapes decoded; `None` for f-strings
/// with interpolations and for concatenations that contain one.
pub(crate) fn string_value(content: &str, node: Node) -> Option<String> {
    match node.kind() {
        "string" => {
            if has_descendant(node, "interpolation") {
                return None;
            }
            let raw = text(content, node);
            let prefix = raw
                .split(['"', '\''])
                .next()
                .unwrap_or_default()
                .to_ascii_lowercase();
            Some(decode_literal(&strip_quotes(raw), &prefix))
        }
        "concatenated_string" => {
            let mut value = String::new();
            for part in named_children(node) {
                value.push_str(&string_value(content, part)?);
            }
            Some(value)
        }
        _ => None,
    }
}

fn strip_quotes(raw: &str) -> String {
    let trimmed = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    trimmed.to_string()
}

/// Literal body as the runtime sees it, given the lowercased string prefix
fn decode_literal(body: &str, prefix: &str) -> String {
    let value = if prefix.contains('r') {
        body.to_string()
    } else {
        unescape(body)
    };
    if prefix.contains('f') {
        value.replace("{{", "{").replace("}}", "}")
    } else {
        value
    }
}

/// Decode backslash escapes; unknown escapes keep their backslash
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(next),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut digits = String::from(next);
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(&d @ '0'..='7') => {
                            digits.push(d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let mut digits = String::new();
                while digits.len() < width {
                    match chars.peek() {
                        Some(&d) if d.is_ascii_hexdigit() => {
                            digits.push(d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                let decoded = (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

pub(crate) fn has_descendant(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind || has_descendant(child, kind) {
            return true;
        }
    }
    false
}

/// Dotted path of a callee-like expression: `db.query(X).filter` -> `db.query.filter`
pub(crate) fn dotted_path(content: &str, node: Node) -> Option<String> {
    match node.kind() {
        "identifier" => Some(text(content, node).to_string()),
        "attribute" => {
            let attr = node.child_by_field_name("attribute")?;
            let attr = text(content, attr);
            match node
                .child_by_field_name("object")
                .and_then(|object| dotted_path(content, object))
            {
                Some(object) => Some(format!("{object}.{attr}")),
                None => Some(attr.to_string()),
            }
        }
        "call" => dotted_path(content, node.child_by_field_name("function")?),
        "subscript" => dotted_path(content, node.child_by_field_name("value")?),
        "parenthesized_expression" => dotted_path(content, *named_children(node).first()?),
        _ => None,
    }
}

/// Docstring of a module, class or function body
pub(crate) fn docstring(content: &str, body: Node) -> Option<String> {
    let first = named_children(body)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = *named_children(first).first()?;
    let raw = string_value(content, expr)?;
    let cleaned = raw
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// The docstring node of a body, if present
pub(crate) fn docstring_node(body: Node) -> Option<Node> {
    let first = named_children(body)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = *named_children(first).first()?;
    matches!(expr.kind(), "string" | "concatenated_string").then_some(expr)
}

/// First node flagged as a syntax error or a missing token
pub(crate) fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error).or(Some(node))
}
