use codelore_model::{TemplateArtifact, TemplateCycle};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Template inclusion graph: one node per template, one edge per resolved include.
///
/// Edge weights index into the source template's `includes`.
pub struct IncludeGraph {
    graph: DiGraph<String, usize>,
    nodes: HashMap<String, NodeIndex>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

impl IncludeGraph {
    /// Build from templates sorted by path
    pub fn build(templates: &[TemplateArtifact]) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for template in templates {
            let index = graph.add_node(template.path.clone());
            nodes.insert(template.path.clone(), index);
        }
        for template in templates {
            let from = nodes[&template.path];
            for (position, include) in template.includes.iter().enumerate() {
                if let Some(to) = include.resolved.as_ref().and_then(|r| nodes.get(r)) {
                    graph.add_edge(from, *to, position);
                }
            }
        }
        Self { graph, nodes }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Cycle-closing edges found by a depth-first colouring pass.
    ///
    /// Roots and neighbours are visited in path order, so the same inputs always
    /// yield the same edges. Each result is `(from, to, include position)`.
    pub fn back_edges(&self) -> Vec<(String, String, usize)> {
        let mut colour = vec![Colour::White; self.graph.node_count()];
        let mut back = Vec::new();

        let mut roots: Vec<NodeIndex> = self.graph.node_indices().collect();
        roots.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

        for root in roots {
            if colour[root.index()] != Colour::White {
                continue;
            }
            colour[root.index()] = Colour::Grey;
            let mut stack = vec![(root, self.sorted_edges(root), 0usize)];

            while let Some((node, edges, next)) = stack.last_mut() {
                let Some(&(target, position)) = edges.get(*next) else {
                    colour[node.index()] = Colour::Black;
                    stack.pop();
                    continue;
                };
                *next += 1;
                let from = *node;
                match colour[target.index()] {
                    Colour::Grey => back.push((
                        self.graph[from].clone(),
                        self.graph[target].clone(),
                        position,
                    )),
                    Colour::White => {
                        colour[target.index()] = Colour::Grey;
                        let edges = self.sorted_edges(target);
                        stack.push((target, edges, 0));
                    }
                    Colour::Black => {}
                }
            }
        }
        back
    }

    fn sorted_edges(&self, node: NodeIndex) -> Vec<(NodeIndex, usize)> {
        let mut edges: Vec<(NodeIndex, usize)> = self
            .graph
            .edges(node)
            .map(|edge| (edge.target(), *edge.weight()))
            .collect();
        edges.sort_by(|a, b| {
            self.graph[a.0]
                .cmp(&self.graph[b.0])
                .then(a.1.cmp(&b.1))
        });
        edges
    }

    /// Templates that include or extend `path`
    pub fn dependents(&self, path: &str) -> Vec<&str> {
        let Some(&node) = self.nodes.get(path) else {
            return Vec::new();
        };
        let mut sources: Vec<&str> = self
            .graph
            .edges_directed(node, petgraph::Direction::Incoming)
            .map(|edge| self.graph[edge.source()].as_str())
            .collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }

    pub fn is_acyclic(&self) -> bool {
        !petgraph::algo::is_cyclic_directed(&self.graph)
    }
}

/// Drop cycle-closing includes from `templates` (sorted by path) and report them
pub fn break_cycles(templates: &mut [TemplateArtifact]) -> Vec<TemplateCycle> {
    let graph = IncludeGraph::build(templates);
    log::debug!(
        "Include graph: {} templates, {} resolved includes",
        graph.node_count(),
        graph.edge_count()
    );
    let back_edges = graph.back_edges();
    if back_edges.is_empty() {
        return Vec::new();
    }

    let mut dropped: HashMap<String, Vec<usize>> = HashMap::new();
    let mut cycles = Vec::with_capacity(back_edges.len());
    for (from, to, position) in back_edges {
        log::warn!("Template include cycle: {from} -> {to}; dropping the closing edge");
        dropped.entry(from.clone()).or_default().push(position);
        cycles.push(TemplateCycle { from, to });
    }

    for template in templates.iter_mut() {
        if let Some(positions) = dropped.get(&template.path) {
            let mut position = 0;
            template.includes.retain(|_| {
                let keep = !positions.contains(&position);
                position += 1;
                keep
            });
        }
    }

    cycles.sort();
    cycles.dedup();
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use codelore_model::{IncludeKind, TemplateInclude};
    use pretty_assertions::assert_eq;

    fn template(path: &str, includes: &[&str]) -> TemplateArtifact {
        let mut t = TemplateArtifact::new(path);
        t.includes = includes
            .iter()
            .map(|target| TemplateInclude {
                kind: IncludeKind::Include,
                target: (*target).to_string(),
                resolved: Some((*target).to_string()),
                line: 1,
            })
            .collect();
        t
    }

    #[test]
    fn drops_closing_edge_of_a_cycle() {
        let mut templates = vec![
            template("a.html", &["b.html"]),
            template("b.html", &["c.html"]),
            template("c.html", &["a.html"]),
        ];
        let cycles = break_cycles(&mut templates);
        assert_eq!(
            cycles,
            vec![TemplateCycle {
                from: "c.html".into(),
                to: "a.html".into()
            }]
        );
        assert!(templates[2].includes.is_empty());
        assert!(IncludeGraph::build(&templates).is_acyclic());
    }

    #[test]
    fn self_include_is_a_cycle() {
        let mut templates = vec![template("loop.html", &["loop.html", "part.html"]), template("part.html", &[])];
        let cycles = break_cycles(&mut templates);
        assert_eq!(cycles.len(), 1);
        assert_eq!(templates[0].includes.len(), 1);
        assert_eq!(templates[0].includes[0].target, "part.html");
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut templates = vec![
            template("a.html", &["b.html", "c.html"]),
            template("b.html", &["d.html"]),
            template("c.html", &["d.html"]),
            template("d.html", &[]),
        ];
        assert!(break_cycles(&mut templates).is_empty());
        let graph = IncludeGraph::build(&templates);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.dependents("d.html"), vec!["b.html", "c.html"]);
    }
}
