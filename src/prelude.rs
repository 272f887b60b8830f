//! Prelude module for convenient imports
//!
//! Re-exports the types needed to build flows, wire collaborators and
//! dispatch events.
//!
//! # Example
//!
//! ```rust,no_run
//! use sigilflow::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/sigils.json")?;
//! let bundle = SigilBundle::from_definitions(SigilDefinition::list_from_json_str(&json)?)?;
//! for sigil in &bundle.sigils {
//!     for flow in &sigil.flows {
//!         println!("{} / {}: {}", sigil.id, flow.id(), GraphDisplay::new(&flow.graph));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Graph model and editing
pub use crate::graph::{Connection, FlowGraph, GraphBuilder, GraphDisplay};
pub use crate::node::{
    FlowNode, GridPosition, LoopMode, MathOp, NodeKind, Scalar, TargetType, Value, VariableOp, PORT_NEXT,
    PORT_NO, PORT_YES, RANDOM_PORTS,
};

// Flows, sigils and persistence
pub use crate::flow::{
    ConditionLogic, FlowConfig, FlowDefinition, FlowType, IntoFlow, SigilBundle, SigilDefinition,
};
pub use crate::sigil::{Item, ItemRef, Loadout, Sigil, SigilInstance};
pub use crate::tier::{ScalingMode, TierScalingConfig};

// Execution
pub use crate::context::{Entity, EntityId, EntityKind, ExecutionContext, Position};
pub use crate::executor::{
    Continuation, ExecutionRecord, ExecutorLimits, FlowExecutor, TickScheduler, TraceFormatter, WalkOutcome,
};
pub use crate::registry::{
    Clock, ConditionRegistry, EffectRegistry, ManualClock, ProgressionService, Scheduler, World,
};
pub use crate::resolver::ParameterResolver;

// Dispatch
pub use crate::dispatch::{
    AttemptOutcome, CooldownKey, CooldownStore, DispatchReport, FlowAttempt, Signal, SignalDispatcher,
    SignalEvent,
};

// Error types
pub use crate::error::{ConditionError, EffectError, GraphError, GraphStructureError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
