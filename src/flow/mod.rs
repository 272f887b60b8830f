//! Flows: dispatch metadata around a graph, plus their persisted forms.

pub mod artifact;
pub mod config;
pub mod conversion;
pub mod definition;

pub use artifact::SigilBundle;
pub use config::{ConditionLogic, FlowConfig, FlowType};
pub use conversion::IntoFlow;
pub use definition::{FlowDefinition, NodeDefinition, SigilDefinition, TierDefinition};
