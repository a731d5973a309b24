use crate::graph::break_cycles;
use crate::resolve::{looks_like_template, TemplateIndex};
use codelore_model::{Endpoint, OrphanReference, Symbol, TemplateArtifact, TemplateCycle};
use std::collections::HashMap;

/// Templates after binding, plus the recoverable findings of the pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindOutput {
    /// Sorted by path
    pub templates: Vec<TemplateArtifact>,
    pub template_cycles: Vec<TemplateCycle>,
    pub orphan_references: Vec<OrphanReference>,
}

/// Links templates to each other and to the endpoints that render them
pub struct TemplateBinder<'a> {
    symbols: HashMap<&'a str, &'a Symbol>,
    endpoints: &'a [Endpoint],
}

impl<'a> TemplateBinder<'a> {
    pub fn new(symbols: &'a [Symbol], endpoints: &'a [Endpoint]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| (s.id.as_str(), s)).collect(),
            endpoints,
        }
    }

    pub fn bind(&self, mut templates: Vec<TemplateArtifact>) -> BindOutput {
        templates.sort_by(|a, b| a.path.cmp(&b.path));
        let index = TemplateIndex::new(templates.iter().map(|t| t.path.clone()));

        for template in &mut templates {
            for include in &mut template.includes {
                include.resolved = index.resolve(&include.target).map(str::to_string);
                if include.resolved.is_none() {
                    log::debug!(
                        "{}:{}: {} target '{}' does not resolve",
                        template.path,
                        include.line,
                        include.kind.as_str(),
                        include.target
                    );
                }
            }
        }
        let template_cycles = break_cycles(&mut templates);

        let mut rendered_by: HashMap<String, Vec<String>> = HashMap::new();
        let mut orphan_references = Vec::new();
        for endpoint in self.endpoints {
            let Some(body) = self
                .symbols
                .get(endpoint.symbol.as_str())
                .and_then(|handler| handler.body.as_ref())
            else {
                continue;
            };
            for literal in &body.string_literals {
                match index.resolve(literal) {
                    Some(path) => rendered_by
                        .entry(path.to_string())
                        .or_default()
                        .push(endpoint.id.clone()),
                    None if looks_like_template(literal) => {
                        orphan_references.push(OrphanReference {
                            endpoint: endpoint.id.clone(),
                            symbol: endpoint.symbol.clone(),
                            template: literal.clone(),
                        });
                    }
                    None => {}
                }
            }
        }

        for template in &mut templates {
            let mut renderers = rendered_by.remove(&template.path).unwrap_or_default();
            renderers.sort();
            renderers.dedup();
            template.orphan = renderers.is_empty();
            template.rendered_by = renderers;
        }
        orphan_references.sort();
        orphan_references.dedup();
        for orphan in &orphan_references {
            log::warn!(
                "{} renders '{}', which is not a repository template",
                orphan.endpoint,
                orphan.template
            );
        }

        BindOutput {
            templates,
            template_cycles,
            orphan_references,
        }
    }
}
