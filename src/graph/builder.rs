use super::FlowGraph;
use crate::error::GraphError;
use crate::node::{FlowNode, GridPosition, NodeKind, Value};

/// Fluent construction of a `FlowGraph`.
///
/// Edits are recorded and applied in order by `build`, so the first invalid
/// edit is reported as the build error.
///
/// ```
/// use sigilflow::prelude::*;
///
/// let graph = GraphBuilder::new("heal_when_low")
///     .node("start", NodeKind::Start)
///     .node("check", NodeKind::Condition)
///     .param("condition", "HEALTH_BELOW:10")
///     .node("heal", NodeKind::Effect)
///     .param("effectType", "HEAL")
///     .param("amount", 5)
///     .node("end", NodeKind::End)
///     .connect("start", PORT_NEXT, "check")
///     .connect("check", PORT_YES, "heal")
///     .connect("check", PORT_NO, "end")
///     .connect("heal", PORT_NEXT, "end")
///     .build()
///     .unwrap();
///
/// assert!(graph.is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    id: String,
    name: Option<String>,
    description: String,
    nodes: Vec<(FlowNode, bool)>,
    connections: Vec<(String, String, String)>,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: String::new(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a node on the next free grid cell of row 0.
    pub fn node(mut self, id: impl Into<String>, kind: NodeKind) -> Self {
        self.nodes
            .push((FlowNode::new(id, kind, GridPosition::default()), true));
        self
    }

    /// Adds a fully specified node, keeping its position.
    pub fn place(mut self, node: FlowNode) -> Self {
        self.nodes.push((node, false));
        self
    }

    /// Sets a parameter on the most recently added node.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Some((node, _)) = self.nodes.last_mut() {
            node.set_param(key, value);
        }
        self
    }

    pub fn connect(
        mut self,
        source: impl Into<String>,
        port: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.connections
            .push((source.into(), port.into(), target.into()));
        self
    }

    pub fn build(self) -> Result<FlowGraph, GraphError> {
        let mut graph = FlowGraph::new(self.id);
        if let Some(name) = self.name {
            graph.name = name;
        }
        graph.description = self.description;

        let explicit: Vec<GridPosition> = self
            .nodes
            .iter()
            .filter(|(_, auto)| !auto)
            .map(|(n, _)| n.position)
            .collect();
        let mut next_x = 0;

        for (mut node, auto) in self.nodes {
            if auto {
                while explicit.contains(&GridPosition::new(next_x, 0))
                    || graph.is_position_occupied(GridPosition::new(next_x, 0))
                {
                    next_x += 1;
                }
                node.position = GridPosition::new(next_x, 0);
                next_x += 1;
            }
            graph.add_node(node)?;
        }
        for (source, port, target) in &self.connections {
            graph.connect(source, port, target)?;
        }
        Ok(graph)
    }
}
