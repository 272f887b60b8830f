use super::FlowGraph;
use ahash::AHashSet;
use std::fmt;

/// Renders a graph as a tree rooted at its start node.
///
/// Nodes reached a second time (fan-in) are printed as a reference instead of
/// being expanded again.
pub struct GraphDisplay<'a> {
    pub graph: &'a FlowGraph,
}

impl<'a> GraphDisplay<'a> {
    pub fn new(graph: &'a FlowGraph) -> Self {
        Self { graph }
    }

    fn fmt_as_tree(
        &self,
        id: &str,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
        seen: &mut AHashSet<String>,
    ) -> fmt::Result {
        let node_marker = if is_last { "└── " } else { "├── " };
        write!(f, "{}{}", prefix, node_marker)?;
        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

        let Some(node) = self.graph.node(id) else {
            return writeln!(f, "<missing node '{}'>", id);
        };
        if !seen.insert(id.to_string()) {
            return writeln!(f, "{} ({}) ↩", node.kind, node.id);
        }

        let summary = node.summary();
        if summary.is_empty() {
            writeln!(f, "{} ({})", node.kind, node.id)?;
        } else {
            writeln!(f, "{} ({}): {}", node.kind, node.id, summary)?;
        }

        let outgoing = self.graph.outgoing(id);
        let single_next = outgoing.len() == 1 && node.output_ports().len() == 1;
        for (i, (port, target)) in outgoing.iter().enumerate() {
            let last = i + 1 == outgoing.len();
            if single_next {
                self.fmt_as_tree(target, f, &child_prefix, last, seen)?;
            } else {
                let marker = if last { "└── " } else { "├── " };
                writeln!(f, "{}{}[{}]", child_prefix, marker, port)?;
                let port_prefix = format!("{}{}", child_prefix, if last { "    " } else { "│   " });
                self.fmt_as_tree(target, f, &port_prefix, true, seen)?;
            }
        }
        Ok(())
    }
}

impl<'a> fmt::Display for GraphDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}]", self.graph.name, self.graph.id)?;
        let mut seen = AHashSet::new();
        match self.graph.start_node() {
            Some(start) => self.fmt_as_tree(&start.id, f, "", true, &mut seen)?,
            None => writeln!(f, "└── <no unique start node>")?,
        }
        let orphans: Vec<_> = self
            .graph
            .nodes()
            .filter(|n| !seen.contains(&n.id))
            .collect();
        if !orphans.is_empty() {
            writeln!(f, "unreachable:")?;
            for (i, node) in orphans.iter().enumerate() {
                self.fmt_as_tree(&node.id, f, "", i + 1 == orphans.len(), &mut seen)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{GraphBuilder, GraphDisplay};
    use crate::node::{NodeKind, PORT_NEXT, PORT_NO, PORT_YES};

    #[test]
    fn renders_branches_and_shared_end() {
        let graph = GraphBuilder::new("g")
            .name("Demo")
            .node("s", NodeKind::Start)
            .node("c", NodeKind::Condition)
            .param("condition", "IN_WATER")
            .node("e", NodeKind::End)
            .connect("s", PORT_NEXT, "c")
            .connect("c", PORT_YES, "e")
            .connect("c", PORT_NO, "e")
            .build()
            .unwrap();

        let text = GraphDisplay::new(&graph).to_string();
        assert!(text.starts_with("Demo [g]\n└── Start (s)\n"));
        assert!(text.contains("[yes]"));
        assert!(text.contains("End (e) ↩"));
    }
}
