use crate::node::NodeKind;
use thiserror::Error;

/// Errors raised while editing a `FlowGraph` (adding nodes, wiring ports).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("A node with id '{0}' already exists in the graph")]
    DuplicateNodeId(String),

    #[error("Grid position ({x}, {y}) is already occupied by node '{occupied_by}'")]
    PositionOccupied { x: i32, y: i32, occupied_by: String },

    #[error("Node '{missing_node_id}' not found, which is required by {context}")]
    NodeNotFound {
        missing_node_id: String,
        context: String,
    },

    #[error("Port '{port}' is not an output of node '{node_id}' ({kind})")]
    InvalidPort {
        node_id: String,
        kind: NodeKind,
        port: String,
    },

    #[error("Node '{0}' is not a Start node")]
    NotAStartNode(String),
}

/// Structural problems reported by `FlowGraph::validate`.
///
/// Every variant renders as a sentence a content editor can act on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphStructureError {
    #[error("Flow has no start node")]
    NoStartNode,

    #[error("Flow has {} start nodes ({}), exactly one is allowed", .0.len(), .0.join(", "))]
    MultipleStartNodes(Vec<String>),

    #[error("{kind} ({node_id}): Node is not reachable from start")]
    UnreachableNode { node_id: String, kind: NodeKind },

    #[error("{kind} ({node_id}): Node has no outgoing connection")]
    MissingOutput { node_id: String, kind: NodeKind },

    #[error("{kind} ({node_id}): Port '{port}' connects to missing node '{target}'")]
    DanglingConnection {
        node_id: String,
        kind: NodeKind,
        port: String,
        target: String,
    },

    #[error("{kind} ({node_id}): Node is part of a cycle")]
    CycleDetected { node_id: String, kind: NodeKind },

    #[error("{kind} ({node_id}): {message}")]
    InvalidParameter {
        node_id: String,
        kind: NodeKind,
        message: String,
    },
}

/// Failure reported by an effect implementation behind the `EffectRegistry`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EffectError {
    #[error("Unknown effect type '{0}'")]
    UnknownEffect(String),

    #[error("Effect '{effect}' rejected parameter '{param}': {message}")]
    InvalidParameter {
        effect: String,
        param: String,
        message: String,
    },

    #[error("Effect '{effect}' failed: {message}")]
    Failed { effect: String, message: String },
}

/// Failure reported by a predicate behind the `ConditionRegistry`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Unknown condition '{0}'")]
    UnknownCondition(String),

    #[error("Condition '{predicate}' could not be evaluated: {message}")]
    Failed { predicate: String, message: String },
}

/// Errors that can occur while resolving a node parameter to a concrete value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    #[error("Placeholder '{{{0}}}' has no tier entry, context field or variable")]
    UnknownPlaceholder(String),

    #[error("Malformed expression '{expression}': {message}")]
    MalformedExpression { expression: String, message: String },

    #[error("Value '{0}' is not a number")]
    NotANumber(String),

    #[error("Parameter '{0}' is not set")]
    MissingParameter(String),
}

/// Errors raised when editing a tier scaling table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TierError {
    #[error("Parameter '{key}' has {found} tier values, but the sigil has {expected} tiers")]
    LengthMismatch {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("Tiers are 1-based, tier 0 does not exist")]
    ZeroTier,

    #[error("Tier {tier} is above the maximum tier {max_tier}")]
    TierOutOfRange { tier: u32, max_tier: u32 },
}

/// Errors that can occur when converting a persisted definition into runtime flows.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowConversionError {
    #[error("Node '{node_id}' has an unknown node type: '{type_name}'")]
    UnknownNodeType { node_id: String, type_name: String },

    #[error("Unknown flow type '{0}'")]
    UnknownFlowType(String),

    #[error("Unknown condition logic '{0}'")]
    UnknownConditionLogic(String),

    #[error("Invalid tier table: {0}")]
    Tier(#[from] TierError),

    #[error("Invalid graph: {0}")]
    Graph(#[from] GraphError),
}

/// Config-level validation failures of a `FlowConfig`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowValidationError {
    #[error("Signal flow must have a trigger")]
    MissingTrigger,

    #[error("Chance {0} is outside 0..=100")]
    ChanceOutOfRange(f64),

    #[error("Cooldown {0} must not be negative")]
    NegativeCooldown(f64),

    #[error(transparent)]
    Structure(#[from] GraphStructureError),
}

/// Errors from the persistence helpers (JSON definitions, binary bundles).
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to parse sigil definition JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Bundle encoding failed: {0}")]
    Encode(String),

    #[error("Bundle decoding failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Conversion(#[from] FlowConversionError),
}
