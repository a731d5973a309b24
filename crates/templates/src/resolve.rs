use std::collections::BTreeSet;

/// File extensions that mark a string literal as a template path
pub const TEMPLATE_EXTENSIONS: &[&str] = &["html", "htm", "jinja", "jinja2", "j2"];

/// Repository template paths, looked up by exact path or by path suffix
#[derive(Debug, Clone, Default)]
pub struct TemplateIndex {
    paths: BTreeSet<String>,
}

impl TemplateIndex {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact repository-relative path, else the lexicographically first path ending with `/<name>`
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let name = name.trim().trim_start_matches("./").trim_start_matches('/');
        if name.is_empty() {
            return None;
        }
        if let Some(exact) = self.paths.get(name) {
            return Some(exact.as_str());
        }
        let suffix = format!("/{name}");
        self.paths
            .iter()
            .find(|path| path.ends_with(&suffix))
            .map(String::as_str)
    }
}

/// True for literals that name a template file (`"items/detail.html"`)
pub fn looks_like_template(literal: &str) -> bool {
    let literal = literal.trim();
    if literal.is_empty() || literal.contains(char::is_whitespace) || literal.contains('<') {
        return false;
    }
    literal
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && TEMPLATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_then_suffix_resolution() {
        let index = TemplateIndex::new([
            "templates/item.html",
            "admin/templates/item.html",
            "templates/shop/cart.html",
        ]);
        assert_eq!(index.resolve("templates/item.html"), Some("templates/item.html"));
        assert_eq!(index.resolve("item.html"), Some("admin/templates/item.html"));
        assert_eq!(index.resolve("shop/cart.html"), Some("templates/shop/cart.html"));
        assert_eq!(index.resolve("cart.html"), Some("templates/shop/cart.html"));
        assert_eq!(index.resolve("op/cart.html"), None);
        assert_eq!(index.resolve("missing.html"), None);
    }

    #[test]
    fn template_like_literals() {
        assert!(looks_like_template("items/detail.html"));
        assert!(looks_like_template("mail.J2"));
        assert!(!looks_like_template("<p>hi</p>.html"));
        assert!(!looks_like_template("report.csv"));
        assert!(!looks_like_template(".html"));
        assert!(!looks_like_template("see page.html"));
    }
}
