use crate::dispatch::Signal;
use crate::error::FlowValidationError;
use crate::graph::FlowGraph;
use crate::node::{NodeKind, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowType {
    /// Runs when its trigger signal fires.
    #[default]
    Signal,
    /// Runs on explicit activation (hotkey). Chance does not apply.
    Ability,
}

impl FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SIGNAL" => Ok(FlowType::Signal),
            "ABILITY" => Ok(FlowType::Ability),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowType::Signal => f.write_str("SIGNAL"),
            FlowType::Ability => f.write_str("ABILITY"),
        }
    }
}

/// How a flow's declared conditions combine. The list is flat; there is no grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionLogic {
    #[default]
    And,
    Or,
}

impl FromStr for ConditionLogic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "AND" => Ok(ConditionLogic::And),
            "OR" => Ok(ConditionLogic::Or),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for ConditionLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionLogic::And => f.write_str("AND"),
            ConditionLogic::Or => f.write_str("OR"),
        }
    }
}

/// Dispatch metadata wrapping exactly one graph.
///
/// `chance`, `cooldown` and `priority` are a cache of the Start node's
/// parameters of the same name. When the Start node carries them, they win at
/// dispatch time; `sync_from_start_node` refreshes the cache after edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub flow_type: FlowType,
    pub trigger: Option<Signal>,
    /// Percent, 0 to 100.
    pub chance: f64,
    /// Seconds.
    pub cooldown: f64,
    pub priority: i32,
    pub conditions: Vec<String>,
    pub condition_logic: ConditionLogic,
    pub graph: Arc<FlowGraph>,
}

impl FlowConfig {
    pub fn signal(trigger: Signal, graph: FlowGraph) -> Self {
        Self {
            flow_type: FlowType::Signal,
            trigger: Some(trigger),
            chance: 100.0,
            cooldown: 0.0,
            priority: 1,
            conditions: Vec::new(),
            condition_logic: ConditionLogic::And,
            graph: Arc::new(graph),
        }
    }

    pub fn ability(graph: FlowGraph) -> Self {
        Self {
            flow_type: FlowType::Ability,
            trigger: None,
            ..Self::signal(Signal::Interact, graph)
        }
    }

    pub fn with_chance(mut self, chance: f64) -> Self {
        self.chance = chance;
        self
    }

    pub fn with_cooldown(mut self, cooldown: f64) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_condition(mut self, predicate: impl Into<String>) -> Self {
        self.conditions.push(predicate.into());
        self
    }

    pub fn with_condition_logic(mut self, logic: ConditionLogic) -> Self {
        self.condition_logic = logic;
        self
    }

    /// The flow id is the graph id.
    pub fn id(&self) -> &str {
        &self.graph.id
    }

    pub fn name(&self) -> &str {
        &self.graph.name
    }

    pub fn is_ability(&self) -> bool {
        self.flow_type == FlowType::Ability
    }

    pub fn matches(&self, signal: &Signal) -> bool {
        self.flow_type == FlowType::Signal && self.trigger.as_ref() == Some(signal)
    }

    /// Mutable graph access for the editing layer. Clones the graph if an
    /// execution still holds it.
    pub fn graph_mut(&mut self) -> &mut FlowGraph {
        Arc::make_mut(&mut self.graph)
    }

    /// Start node parameter `key`, if set.
    pub fn start_param(&self, key: &str) -> Option<&Value> {
        self.graph.start_node().and_then(|n| n.param(key))
    }

    /// Copies literal `chance` / `cooldown` / `priority` from the Start node
    /// into the cached fields. Placeholders are left for dispatch time.
    pub fn sync_from_start_node(&mut self) {
        if let Some(chance) = self.start_param("chance").and_then(Value::as_number) {
            self.chance = chance;
        }
        if let Some(cooldown) = self.start_param("cooldown").and_then(Value::as_number) {
            self.cooldown = cooldown;
        }
        if let Some(priority) = self.start_param("priority").and_then(Value::as_number) {
            self.priority = priority as i32;
        }
    }

    /// Writes the cached gate values onto the Start node.
    pub fn sync_to_start_node(&mut self) {
        let (chance, cooldown, priority) = (self.chance, self.cooldown, self.priority);
        let graph = self.graph_mut();
        let Some(start_id) = graph.start_node().map(|n| n.id.clone()) else {
            return;
        };
        if let Some(start) = graph.node_mut(&start_id) {
            start.set_param("chance", chance);
            start.set_param("cooldown", cooldown);
            start.set_param("priority", priority);
        }
    }

    /// Config checks plus every structural problem of the graph.
    pub fn validate(&self) -> Vec<FlowValidationError> {
        let mut errors = Vec::new();
        if self.flow_type == FlowType::Signal && self.trigger.is_none() {
            errors.push(FlowValidationError::MissingTrigger);
        }
        if !(0.0..=100.0).contains(&self.chance) {
            errors.push(FlowValidationError::ChanceOutOfRange(self.chance));
        }
        if self.cooldown < 0.0 {
            errors.push(FlowValidationError::NegativeCooldown(self.cooldown));
        }
        errors.extend(self.graph.validate().into_iter().map(FlowValidationError::from));
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Number of nodes other than Start and End.
    pub fn working_node_count(&self) -> usize {
        self.graph
            .nodes()
            .filter(|n| !matches!(n.kind, NodeKind::Start | NodeKind::End))
            .count()
    }
}
