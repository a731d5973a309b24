//! Body facts of a callable: what it calls, raises, reads and spells out.

use crate::syntax::{dotted_path, named_children, string_value, text};
use codelore_model::BodyFacts;
use tree_sitter::Node;

const NESTED_SCOPES: &[&str] = &["function_definition", "class_definition", "decorated_definition"];

/// Collect facts from a function body, skipping nested definitions and the docstring
pub(crate) fn collect_body_facts(content: &str, body: Node, docstring: Option<Node>) -> BodyFacts {
    let mut collector = Collector {
        content,
        skip: docstring.map(|n| n.id()),
        facts: BodyFacts::default(),
    };
    for child in named_children(body) {
        collector.visit(child);
    }
    let mut facts = collector.facts;
    facts.normalize();
    facts
}

struct Collector<'a> {
    content: &'a str,
    skip: Option<usize>,
    facts: BodyFacts,
}

impl Collector<'_> {
    fn visit(&mut self, node: Node) {
        if Some(node.id()) == self.skip || NESTED_SCOPES.contains(&node.kind()) {
            return;
        }
        match node.kind() {
            "identifier" => self
                .facts
                .references
                .push(text(self.content, node).to_string()),
            "attribute" => {
                if let Some(path) = dotted_path(self.content, node) {
                    self.facts.references.push(path);
                }
                self.visit_chain(node);
            }
            "call" => {
                if let Some(function) = node.child_by_field_name("function") {
                    if let Some(callee) = dotted_path(self.content, function) {
                        self.facts.calls.push(callee);
                    }
                    self.visit(function);
                }
                if let Some(arguments) = node.child_by_field_name("arguments") {
                    self.visit(arguments);
                }
            }
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
            }
            "raise_statement" => {
                if let Some(raised) = named_children(node).into_iter().next() {
                    let target = match raised.kind() {
                        "call" => raised.child_by_field_name("function"),
                        _ => Some(raised),
                    };
                    if let Some(name) = target.and_then(|t| dotted_path(self.content, t)) {
                        self.facts.raises.push(name);
                    }
                }
                self.visit_children(node);
            }
            "string" | "concatenated_string" => {
                if let Some(value) = string_value(self.content, node) {
                    self.facts.string_literals.push(value);
                }
                self.visit_interpolations(node);
            }
            "comment" => {}
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    /// Arguments and indexes hidden inside an attribute chain (`db.query(Item).first`)
    fn visit_chain(&mut self, node: Node) {
        let mut current = node.child_by_field_name("object");
        while let Some(part) = current {
            current = match part.kind() {
                "attribute" => part.child_by_field_name("object"),
                "call" => {
                    if let Some(callee) = part
                        .child_by_field_name("function")
                        .and_then(|f| dotted_path(self.content, f))
                    {
                        self.facts.calls.push(callee);
                    }
                    if let Some(arguments) = part.child_by_field_name("arguments") {
                        self.visit(arguments);
                    }
                    part.child_by_field_name("function")
                }
                "subscript" => {
                    for index in named_children(part).into_iter().skip(1) {
                        self.visit(index);
                    }
                    part.child_by_field_name("value")
                }
                "identifier" => None,
                _ => {
                    self.visit(part);
                    None
                }
            };
        }
    }

    fn visit_interpolations(&mut self, node: Node) {
        for child in named_children(node) {
            match child.kind() {
                "interpolation" => self.visit_children(child),
                "string" => self.visit_interpolations(child),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tree_sitter::Parser;

    fn facts_of(code: &str) -> BodyFacts {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse(code, None).unwrap();
        let function = tree.root_node().named_child(0).unwrap();
        let body = function.child_by_field_name("body").unwrap();
        let doc = crate::syntax::docstring_node(body);
        collect_body_facts(code, body, doc)
    }

    #[test]
    fn collects_calls_raises_and_literals() {
        let facts = facts_of(
            r#"def save(item):
    """Persist."""
    if not item.name:
        raise HTTPException(status_code=400, detail="name required")
    db.session.add(item)
    db.session.commit()
    return render_template("items/detail.html", item=item)
"#,
        );
        assert_eq!(
            facts.calls,
            vec!["HTTPException", "db.session.add", "db.session.commit", "render_template"]
        );
        assert_eq!(facts.raises, vec!["HTTPException"]);
        assert_eq!(facts.string_literals, vec!["items/detail.html", "name required"]);
        assert!(facts.references.contains(&"item.name".to_string()));
        assert!(!facts.references.contains(&"status_code".to_string()));
    }

    #[test]
    fn chained_calls_keep_inner_arguments() {
        let facts = facts_of("def q():\n    return db.query(Item).filter(Item.id == 1).first()\n");
        assert!(facts.references.contains(&"Item".to_string()));
        assert!(facts.references.contains(&"Item.id".to_string()));
        assert!(facts.calls.contains(&"db.query".to_string()));
        assert!(facts.calls.contains(&"db.query.filter.first".to_string()));
    }

    #[test]
    fn nested_definitions_are_skipped() {
        let facts = facts_of("def outer():\n    def inner():\n        secret()\n    return 1\n");
        assert!(facts.calls.is_empty());
    }
}
