//! Node model: the tagged node kinds, their parameters and output ports.

mod kind;
mod value;

pub use kind::{
    LoopMode, MathOp, NodeKind, TargetType, UnknownName, VariableOp, MAX_RANDOM_PATHS,
    MIN_RANDOM_PATHS, PORT_NEXT, PORT_NO, PORT_YES, RANDOM_PORTS,
};
pub(crate) use value::placeholder_key;
pub use value::{format_number, Scalar, Value};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Editor grid placement. Never read during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single node of a flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub kind: NodeKind,
    pub params: AHashMap<String, Value>,
    pub position: GridPosition,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, position: GridPosition) -> Self {
        Self {
            id: id.into(),
            kind,
            params: AHashMap::new(),
            position,
        }
    }

    /// Builder-style parameter setter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn remove_param(&mut self, key: &str) -> Option<Value> {
        self.params.remove(key)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Literal text of a parameter, ignoring placeholders.
    pub fn text_param(&self, key: &str) -> Option<String> {
        self.param(key).and_then(Value::as_text)
    }

    /// Number of Random paths, clamped to 2..=4 (default 2).
    pub fn path_count(&self) -> usize {
        self.param("pathCount")
            .and_then(Value::as_number)
            .map(|n| (n.max(0.0) as usize).clamp(MIN_RANDOM_PATHS, MAX_RANDOM_PATHS))
            .unwrap_or(MIN_RANDOM_PATHS)
    }

    /// Output ports valid for this node. Random exposes `path1..pathN`.
    pub fn output_ports(&self) -> &'static [&'static str] {
        match self.kind {
            NodeKind::Random => &RANDOM_PORTS[..self.path_count()],
            kind => kind.fixed_ports(),
        }
    }

    pub fn has_port(&self, port: &str) -> bool {
        self.output_ports().contains(&port)
    }

    /// Short one-line summary used by the tree display and traces.
    pub fn summary(&self) -> String {
        let text = |k: &str| self.param(k).map(|v| v.to_string()).unwrap_or_default();
        match self.kind {
            NodeKind::Effect => text("effectType"),
            NodeKind::Condition => text("condition"),
            NodeKind::Delay => format!("{}s", text("duration")),
            NodeKind::Loop => match self.text_param("mode").as_deref() {
                Some(m) if m.eq_ignore_ascii_case("while") => format!("while {}", text("condition")),
                _ => format!("x{}", text("count")),
            },
            NodeKind::Random => format!("{} paths", self.path_count()),
            NodeKind::Variable => format!("{} {} {}", text("operation"), text("name"), text("value")),
            NodeKind::Target => text("targetType"),
            NodeKind::Math => format!(
                "${} = {} {} {}",
                text("result"),
                text("left"),
                text("operation"),
                text("right")
            ),
            NodeKind::Start | NodeKind::End | NodeKind::SkipCooldown => String::new(),
        }
    }
}
