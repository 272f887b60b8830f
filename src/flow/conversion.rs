use super::config::{ConditionLogic, FlowConfig, FlowType};
use super::definition::{FlowDefinition, NodeDefinition, SigilDefinition, TierDefinition};
use crate::dispatch::Signal;
use crate::error::FlowConversionError;
use crate::graph::FlowGraph;
use crate::node::{FlowNode, GridPosition, NodeKind, Value, PORT_NEXT};
use crate::sigil::Sigil;
use crate::tier::{ScalingMode, TierScalingConfig};
use std::sync::Arc;
use tracing::warn;

/// Conversion of an authored content model into a runtime flow.
///
/// `FlowDefinition` implements it for the built-in JSON format. Hosts with
/// their own content format implement it on their own types and get the
/// rest of the engine for free.
///
/// # Example
///
/// ```rust,no_run
/// use sigilflow::prelude::*;
/// use sigilflow::error::FlowConversionError;
///
/// struct OnHit {
///     effect: String,
/// }
///
/// impl IntoFlow for OnHit {
///     fn into_flow(self) -> std::result::Result<FlowConfig, FlowConversionError> {
///         let graph = GraphBuilder::new("on_hit")
///             .node("start", NodeKind::Start)
///             .node("fx", NodeKind::Effect)
///             .param("effectType", self.effect.as_str())
///             .node("end", NodeKind::End)
///             .connect("start", PORT_NEXT, "fx")
///             .connect("fx", PORT_NEXT, "end")
///             .build()?;
///         Ok(FlowConfig::signal(Signal::Attack, graph))
///     }
/// }
/// ```
pub trait IntoFlow {
    fn into_flow(self) -> Result<FlowConfig, FlowConversionError>;
}

impl IntoFlow for FlowDefinition {
    fn into_flow(self) -> Result<FlowConfig, FlowConversionError> {
        let flow_type: FlowType = self
            .flow_type
            .parse()
            .map_err(FlowConversionError::UnknownFlowType)?;
        let condition_logic = match &self.condition_logic {
            Some(raw) => raw
                .parse::<ConditionLogic>()
                .map_err(FlowConversionError::UnknownConditionLogic)?,
            None => ConditionLogic::And,
        };

        let mut graph = FlowGraph::new(self.id.clone());
        graph.name = self.name.clone().unwrap_or_else(|| self.id.clone());
        graph.description = self.description.clone().unwrap_or_default();

        // Nodes first so connections can point forward.
        for def in &self.nodes {
            let mut node = node_from_definition(def)?;
            if let Some(other) = graph.node_at(node.position) {
                warn!(node = %node.id, occupied_by = %other.id, "grid cell taken, moving node");
                let mut x = node.position.x;
                while graph.is_position_occupied(GridPosition::new(x, node.position.y)) {
                    x += 1;
                }
                node.position.x = x;
            }
            graph.add_node(node)?;
        }
        for def in &self.nodes {
            if let Some(next) = &def.next {
                graph.connect(&def.id, PORT_NEXT, next)?;
            }
            for (port, target) in &def.connections {
                graph.connect(&def.id, port, target)?;
            }
        }
        if let Some(start) = &self.start_node_id {
            graph.set_start_node(start)?;
        }

        let mut config = FlowConfig {
            flow_type,
            trigger: self.trigger.as_deref().map(Signal::parse),
            chance: self.chance,
            cooldown: self.cooldown,
            priority: self.priority,
            conditions: self.conditions,
            condition_logic,
            graph: Arc::new(graph),
        };
        if flow_type == FlowType::Ability {
            config.trigger = None;
        }
        config.sync_from_start_node();
        Ok(config)
    }
}

fn node_from_definition(def: &NodeDefinition) -> Result<FlowNode, FlowConversionError> {
    let kind: NodeKind = def
        .node_type
        .parse()
        .map_err(|_| FlowConversionError::UnknownNodeType {
            node_id: def.id.clone(),
            type_name: def.node_type.clone(),
        })?;
    let mut node = FlowNode::new(def.id.clone(), kind, GridPosition::new(def.x, def.y));
    for (key, raw) in &def.params {
        node.set_param(key.clone(), json_to_value(raw));
    }
    if let Some(effect) = &def.effect {
        node.set_param("effectType", effect.as_str());
    }
    if let Some(condition) = &def.condition {
        node.set_param("condition", Value::Text(condition.clone()));
    }
    Ok(node)
}

fn json_to_value(raw: &serde_json::Value) -> Value {
    match raw {
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::parse(s),
        serde_json::Value::Bool(b) => Value::Number(if *b { 1.0 } else { 0.0 }),
        serde_json::Value::Null => Value::Text(String::new()),
        other => Value::Text(other.to_string()),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => serde_json::Value::from(*n as i64),
        Value::Number(n) => serde_json::Value::from(*n),
        other => serde_json::Value::String(other.to_string()),
    }
}

impl SigilDefinition {
    /// Builds the runtime sigil, converting every flow.
    pub fn into_sigil(self) -> Result<Sigil, FlowConversionError> {
        let mut sigil = Sigil::new(self.id.clone(), self.max_tier);
        if let Some(name) = self.name {
            sigil.name = name;
        }
        if let Some(tier) = self.tier {
            sigil.tier_scaling = tier_from_definition(tier, sigil.max_tier)?;
        }
        for flow in self.flows {
            sigil.flows.push(flow.into_flow()?);
        }
        Ok(sigil)
    }
}

fn tier_from_definition(def: TierDefinition, max_tier: u32) -> Result<TierScalingConfig, FlowConversionError> {
    let mode = match def.mode.as_deref().map(|m| m.trim().to_uppercase().replace(['-', ' '], "_")) {
        None => ScalingMode::Parameter,
        Some(m) if m == "PARAMETER" => ScalingMode::Parameter,
        Some(m) if m == "ACTIVATION_ONLY" => ScalingMode::ActivationOnly,
        Some(m) if m == "BOTH" => ScalingMode::Both,
        Some(m) => {
            warn!(mode = %m, "unknown tier scaling mode, using PARAMETER");
            ScalingMode::Parameter
        }
    };
    let mut table = TierScalingConfig::new(max_tier).with_mode(mode);
    for (key, values) in def.params {
        table.set_values(&key, values)?;
    }
    Ok(table)
}

impl From<&FlowConfig> for FlowDefinition {
    fn from(config: &FlowConfig) -> Self {
        let graph = &config.graph;
        let nodes = graph
            .nodes()
            .map(|node| NodeDefinition {
                id: node.id.clone(),
                node_type: node.kind.as_str().to_string(),
                x: node.position.x,
                y: node.position.y,
                effect: None,
                condition: None,
                params: node
                    .params
                    .iter()
                    .map(|(k, v)| (k.clone(), value_to_json(v)))
                    .collect(),
                next: None,
                connections: graph
                    .outgoing(&node.id)
                    .into_iter()
                    .map(|(port, target)| (port.to_string(), target.to_string()))
                    .collect(),
            })
            .collect();

        FlowDefinition {
            flow_type: config.flow_type.to_string(),
            trigger: config.trigger.as_ref().map(|s| s.key().to_string()),
            chance: config.chance,
            cooldown: config.cooldown,
            priority: config.priority,
            conditions: config.conditions.clone(),
            condition_logic: Some(config.condition_logic.to_string()),
            id: graph.id.clone(),
            name: Some(graph.name.clone()),
            description: Some(graph.description.clone()).filter(|d| !d.is_empty()),
            start_node_id: graph.start_node_id().map(str::to_string),
            nodes,
        }
    }
}

impl From<&Sigil> for SigilDefinition {
    fn from(sigil: &Sigil) -> Self {
        let table = &sigil.tier_scaling;
        let tier = (!table.is_empty()).then(|| TierDefinition {
            mode: Some(
                match table.mode {
                    ScalingMode::Parameter => "PARAMETER",
                    ScalingMode::ActivationOnly => "ACTIVATION_ONLY",
                    ScalingMode::Both => "BOTH",
                }
                .to_string(),
            ),
            params: table
                .keys()
                .into_iter()
                .filter_map(|k| table.values(k).map(|v| (k.to_string(), v.to_vec())))
                .collect(),
        });
        SigilDefinition {
            id: sigil.id.clone(),
            name: Some(sigil.name.clone()),
            max_tier: sigil.max_tier,
            tier,
            flows: sigil.flows.iter().map(FlowDefinition::from).collect(),
        }
    }
}
