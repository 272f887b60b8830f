//! The flow graph: nodes keyed by id, port-addressed connections and a start node.

mod builder;
mod display;
mod validate;

pub use builder::GraphBuilder;
pub use display::GraphDisplay;
pub(crate) use validate::loop_mode;

use crate::error::GraphError;
use crate::node::{FlowNode, GridPosition, NodeKind};
use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One directed edge, `(source, port) -> target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source: String,
    pub port: String,
    pub target: String,
}

/// A named, editable directed graph of flow nodes.
///
/// Each `(source, port)` pair maps to at most one target. Fan-in is allowed.
/// The executor only ever reads a graph; all mutation goes through the
/// editing methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub id: String,
    pub name: String,
    pub description: String,
    nodes: IndexMap<String, FlowNode>,
    connections: AHashMap<String, AHashMap<String, String>>,
    start_node_id: Option<String>,
    version: u32,
    next_id: u64,
}

impl FlowGraph {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            nodes: IndexMap::new(),
            connections: AHashMap::new(),
            start_node_id: None,
            version: 1,
            next_id: 1,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a node. Fails if the id already exists or the grid cell is taken.
    ///
    /// The first Start node added becomes the designated start node.
    pub fn add_node(&mut self, node: FlowNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNodeId(node.id));
        }
        if let Some(other) = self.node_at(node.position) {
            return Err(GraphError::PositionOccupied {
                x: node.position.x,
                y: node.position.y,
                occupied_by: other.id.clone(),
            });
        }
        if node.kind == NodeKind::Start && self.start_node_id.is_none() {
            self.start_node_id = Some(node.id.clone());
        }
        // Keep minted ids clear of hand-picked `node_N` ids.
        if let Some(n) = node.id.strip_prefix("node_").and_then(|s| s.parse::<u64>().ok()) {
            self.next_id = self.next_id.max(n + 1);
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Removes a node together with every connection into or out of it.
    pub fn remove_node(&mut self, id: &str) -> Option<FlowNode> {
        let removed = self.nodes.shift_remove(id)?;
        self.connections.remove(id);
        for ports in self.connections.values_mut() {
            ports.retain(|_, target| target != id);
        }
        self.connections.retain(|_, ports| !ports.is_empty());
        if self.start_node_id.as_deref() == Some(id) {
            self.start_node_id = self
                .nodes
                .values()
                .find(|n| n.kind == NodeKind::Start)
                .map(|n| n.id.clone());
        }
        Some(removed)
    }

    /// Connects `source.port` to `target`, replacing any previous target of that port.
    pub fn connect(&mut self, source: &str, port: &str, target: &str) -> Result<(), GraphError> {
        let source_node = self.nodes.get(source).ok_or_else(|| GraphError::NodeNotFound {
            missing_node_id: source.to_string(),
            context: format!("connection source (port '{}')", port),
        })?;
        if !self.nodes.contains_key(target) {
            return Err(GraphError::NodeNotFound {
                missing_node_id: target.to_string(),
                context: format!("connection target of '{}.{}'", source, port),
            });
        }
        if !source_node.has_port(port) {
            return Err(GraphError::InvalidPort {
                node_id: source.to_string(),
                kind: source_node.kind,
                port: port.to_string(),
            });
        }
        self.connections
            .entry(source.to_string())
            .or_default()
            .insert(port.to_string(), target.to_string());
        Ok(())
    }

    /// Removes the connection leaving `source.port`, returning its old target.
    pub fn disconnect(&mut self, source: &str, port: &str) -> Option<String> {
        let ports = self.connections.get_mut(source)?;
        let target = ports.remove(port);
        if ports.is_empty() {
            self.connections.remove(source);
        }
        target
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.get(id)
    }

    /// Mutable access for parameter setters. Id, kind and position changes
    /// should go through `remove_node` / `add_node` instead.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut FlowNode> {
        self.nodes.get_mut(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &FlowNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_at(&self, position: GridPosition) -> Option<&FlowNode> {
        self.nodes.values().find(|n| n.position == position)
    }

    pub fn is_position_occupied(&self, position: GridPosition) -> bool {
        self.node_at(position).is_some()
    }

    /// Target of `source.port`, if connected.
    pub fn target(&self, source: &str, port: &str) -> Option<&str> {
        self.connections
            .get(source)
            .and_then(|ports| ports.get(port))
            .map(String::as_str)
    }

    /// Outgoing `(port, target)` pairs of a node in port order.
    pub fn outgoing(&self, source: &str) -> Vec<(&str, &str)> {
        let Some(ports) = self.connections.get(source) else {
            return Vec::new();
        };
        let mut out: Vec<(&str, &str)> = ports
            .iter()
            .map(|(port, target)| (port.as_str(), target.as_str()))
            .collect();
        out.sort_by_key(|(port, _)| port_rank(self.nodes.get(source), port));
        out
    }

    /// `(source, port)` pairs that lead into `target`.
    pub fn incoming(&self, target: &str) -> Vec<(&str, &str)> {
        self.nodes
            .keys()
            .flat_map(|source| {
                self.outgoing(source)
                    .into_iter()
                    .filter(move |(_, t)| *t == target)
                    .map(move |(port, _)| (source.as_str(), port))
            })
            .collect()
    }

    /// All connections, grouped by source in node order.
    pub fn connections(&self) -> Vec<Connection> {
        let mut sources: Vec<&String> = self.connections.keys().collect();
        sources.sort_by_key(|s| self.nodes.get_index_of(s.as_str()).unwrap_or(usize::MAX));
        sources
            .into_iter()
            .flat_map(|source| {
                self.outgoing(source).into_iter().map(move |(port, target)| Connection {
                    source: source.clone(),
                    port: port.to_string(),
                    target: target.to_string(),
                })
            })
            .collect()
    }

    pub fn start_node_id(&self) -> Option<&str> {
        self.start_node_id.as_deref()
    }

    pub fn set_start_node(&mut self, id: &str) -> Result<(), GraphError> {
        match self.nodes.get(id) {
            Some(node) if node.kind == NodeKind::Start => {
                self.start_node_id = Some(id.to_string());
                Ok(())
            }
            Some(_) => Err(GraphError::NotAStartNode(id.to_string())),
            None => Err(GraphError::NodeNotFound {
                missing_node_id: id.to_string(),
                context: "start node designation".to_string(),
            }),
        }
    }

    /// The unique Start node, or `None` when there are zero or several.
    pub fn start_node(&self) -> Option<&FlowNode> {
        let mut starts = self.nodes.values().filter(|n| n.kind == NodeKind::Start);
        let first = starts.next()?;
        if starts.next().is_some() {
            return None;
        }
        match self.start_node_id.as_deref() {
            Some(id) if id != first.id => None,
            _ => Some(first),
        }
    }

    /// Mints a fresh `node_N` id that is not used by any node.
    pub fn generate_node_id(&mut self) -> String {
        loop {
            let candidate = format!("node_{}", self.next_id);
            self.next_id += 1;
            if !self.nodes.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn increment_version(&mut self) {
        self.version += 1;
    }

    /// Drops every node and connection. The id minting counter keeps running.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connections.clear();
        self.start_node_id = None;
    }
}

fn port_rank(node: Option<&FlowNode>, port: &str) -> usize {
    node.and_then(|n| n.output_ports().iter().position(|p| *p == port))
        .unwrap_or(usize::MAX)
}
