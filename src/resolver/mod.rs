//! Read-time resolution of node parameters against an execution context.
//!
//! Resolution order for a `{key}` placeholder:
//!
//! 1. the owning sigil's tier table, at the sigil instance's tier (tier 1
//!    when the table only scales activation gates);
//! 2. context fields (`damage`, `tier`, `random`, `player.*`, `victim.*`, `distance`);
//! 3. flow variables (`$name` or the bare name), then event metadata.
//!
//! Text values containing `{...}` tokens are substituted and then read as a
//! number, an arithmetic expression, or left as text. Nothing here mutates the
//! node or the context.

mod expression;
mod predicate;

pub use expression::{evaluate as evaluate_arithmetic, looks_arithmetic};

use crate::context::ExecutionContext;
use crate::error::ResolutionError;
use crate::node::{placeholder_key, FlowNode, Scalar, Value};
use ahash::AHashMap;
use tracing::{trace, warn};

/// Resolves parameters for one node visit.
///
/// `random` placeholders and `random(N%)` predicates draw from the roll
/// function, if one is attached.
pub struct ParameterResolver<'a> {
    ctx: &'a ExecutionContext,
    roll: Option<&'a dyn Fn() -> f64>,
    tier: u32,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        let tier = match ctx.tier_config() {
            Some(table) if !table.scales_parameters() => 1,
            _ => ctx.tier(),
        };
        Self { ctx, roll: None, tier }
    }

    /// Reads tier tables at `tier` instead of the default.
    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier.max(1);
        self
    }

    /// Attaches a source of uniform draws in `[0, 1)`.
    pub fn with_roll(mut self, roll: &'a dyn Fn() -> f64) -> Self {
        self.roll = Some(roll);
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        self.ctx
    }

    /// Resolves `node.params[key]`.
    pub fn resolve(&self, node: &FlowNode, key: &str) -> Result<Scalar, ResolutionError> {
        let value = node
            .param(key)
            .ok_or_else(|| ResolutionError::MissingParameter(key.to_string()))?;
        self.resolve_value(value)
    }

    pub fn resolve_value(&self, value: &Value) -> Result<Scalar, ResolutionError> {
        match value {
            Value::Number(n) => Ok(Scalar::Number(*n)),
            Value::Placeholder(key) => self.placeholder(key),
            Value::Text(text) => self.resolve_text(text),
        }
    }

    fn resolve_text(&self, text: &str) -> Result<Scalar, ResolutionError> {
        let trimmed = text.trim();
        if let Some(name) = trimmed.strip_prefix('$') {
            return self.variable(name);
        }
        if let Some(key) = placeholder_key(trimmed) {
            return self.placeholder(key);
        }
        if !trimmed.contains('{') {
            return Ok(Scalar::Text(text.to_string()));
        }

        let substituted = self.substitute(text)?;
        trace!(raw = text, resolved = %substituted, "substituted placeholders");
        if let Ok(n) = substituted.trim().parse::<f64>() {
            return Ok(Scalar::Number(n));
        }
        if looks_arithmetic(&substituted) {
            return evaluate_arithmetic(&substituted).map(Scalar::Number);
        }
        Ok(Scalar::Text(substituted))
    }

    /// Replaces every `{key}` token in `text` with its resolved value.
    pub fn substitute(&self, text: &str) -> Result<String, ResolutionError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                return Err(ResolutionError::MalformedExpression {
                    expression: text.to_string(),
                    message: "unclosed '{'".to_string(),
                });
            };
            out.push_str(&rest[..open]);
            let value = self.placeholder(rest[open + 1..close].trim())?;
            out.push_str(&value.to_string());
            rest = &rest[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Resolves a bare placeholder key.
    pub fn placeholder(&self, key: &str) -> Result<Scalar, ResolutionError> {
        if let Some(name) = key.strip_prefix('$') {
            return self.variable(name);
        }
        if let Some(value) = self.ctx.tier_config().and_then(|t| t.value(key, self.tier)) {
            return Ok(Scalar::Number(value));
        }
        if let Some(value) = self.context_field(key)? {
            return Ok(value);
        }
        if let Some(value) = self.ctx.variable(key).or_else(|| self.ctx.metadata.get(key)) {
            return Ok(value.clone());
        }
        Err(ResolutionError::UnknownPlaceholder(key.to_string()))
    }

    fn variable(&self, name: &str) -> Result<Scalar, ResolutionError> {
        self.ctx
            .variable(name)
            .cloned()
            .ok_or_else(|| ResolutionError::UnknownPlaceholder(format!("${}", name)))
    }

    fn context_field(&self, key: &str) -> Result<Option<Scalar>, ResolutionError> {
        let ctx = self.ctx;
        let player = &ctx.player;
        let target = ctx.target.as_ref();
        let number = |n: f64| Ok(Some(Scalar::Number(n)));

        match key.to_lowercase().as_str() {
            "damage" => number(ctx.damage),
            "tier" => number(ctx.tier() as f64),
            "random" => match self.roll {
                Some(roll) => number(roll()),
                None => Err(ResolutionError::UnknownPlaceholder(key.to_string())),
            },
            "player.health" => number(player.health),
            "player.max_health" => number(player.max_health),
            "player.health_percent" => number(player.health_percent()),
            "player.name" => Ok(Some(Scalar::Text(player.name.clone()))),
            "victim.health" => number(target.map_or(0.0, |t| t.health)),
            "victim.max_health" => number(target.map_or(0.0, |t| t.max_health)),
            "victim.health_percent" => number(target.map_or(0.0, |t| t.health_percent())),
            "victim.name" => Ok(Some(Scalar::Text(target.map(|t| t.name.clone()).unwrap_or_default()))),
            "distance" | "victim.distance" => {
                number(target.map_or(0.0, |t| t.position.distance(&player.position)))
            }
            "signal" => Ok(Some(Scalar::Text(
                ctx.signal.as_ref().map(|s| s.key().to_string()).unwrap_or_default(),
            ))),
            _ => Ok(None),
        }
    }

    /// Resolves a parameter to a number, falling back to `default` when the
    /// parameter is missing, unresolvable or not numeric.
    pub fn number(&self, node: &FlowNode, key: &str, default: f64) -> f64 {
        if node.param(key).is_none() {
            return default;
        }
        match self.resolve(node, key) {
            Ok(scalar) => scalar.as_number().unwrap_or_else(|| {
                warn!(node = %node.id, key, value = %scalar, "parameter is not a number");
                default
            }),
            Err(e) => {
                warn!(node = %node.id, key, error = %e, "parameter resolution failed");
                default
            }
        }
    }

    /// Resolves a parameter to text, falling back to `default`.
    pub fn text(&self, node: &FlowNode, key: &str, default: &str) -> String {
        if node.param(key).is_none() {
            return default.to_string();
        }
        match self.resolve(node, key) {
            Ok(scalar) => scalar.to_string(),
            Err(e) => {
                warn!(node = %node.id, key, error = %e, "parameter resolution failed");
                default.to_string()
            }
        }
    }

    /// Every parameter of `node` resolved. Failed entries become 0 (placeholders)
    /// or empty text, paired with their error.
    pub fn resolve_all(&self, node: &FlowNode) -> (AHashMap<String, Scalar>, Vec<(String, ResolutionError)>) {
        let mut resolved = AHashMap::with_capacity(node.params.len());
        let mut failures = Vec::new();
        for (key, value) in &node.params {
            let scalar = match self.resolve_value(value) {
                Ok(scalar) => scalar,
                Err(e) => {
                    let fallback = match value {
                        Value::Placeholder(_) => Scalar::Number(0.0),
                        _ => Scalar::Text(String::new()),
                    };
                    failures.push((key.clone(), e));
                    fallback
                }
            };
            resolved.insert(key.clone(), scalar);
        }
        (resolved, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Entity, Position};
    use crate::node::{GridPosition, NodeKind};
    use crate::sigil::Sigil;
    use crate::tier::TierScalingConfig;
    use std::sync::Arc;

    fn ctx(tier: u32) -> ExecutionContext {
        let mut table = TierScalingConfig::new(3);
        table.set_values("damage", vec![10.0, 20.0, 30.0]).unwrap();
        let sigil = Arc::new(Sigil::new("ember", 3).with_tier_scaling(table));
        ExecutionContext::new(Entity::player(1, "Alex").with_health(5.0, 20.0))
            .with_victim(
                Entity::player(2, "Sam")
                    .with_health(10.0, 40.0)
                    .at(Position::new(3.0, 4.0, 0.0)),
            )
            .with_damage(7.0)
            .with_source(sigil, tier, None)
            .with_variable("stacks", 3.0)
    }

    fn node(value: impl Into<Value>) -> FlowNode {
        FlowNode::new("n", NodeKind::Effect, GridPosition::default()).with_param("v", value)
    }

    #[test]
    fn tier_placeholders_clamp() {
        let c2 = ctx(2);
        let c5 = ctx(5);
        assert_eq!(ParameterResolver::new(&c2).number(&node("{damage}"), "v", -1.0), 20.0);
        assert_eq!(ParameterResolver::new(&c5).number(&node("{damage}"), "v", -1.0), 30.0);
    }

    #[test]
    fn context_fields_and_arithmetic() {
        let c = ctx(1);
        let r = ParameterResolver::new(&c);
        assert_eq!(r.number(&node("{player.health_percent}"), "v", -1.0), 25.0);
        assert_eq!(r.number(&node("{victim.health} * 2 + {$stacks}"), "v", -1.0), 23.0);
        assert_eq!(r.number(&node("{distance}"), "v", -1.0), 5.0);
        assert_eq!(r.number(&node("$stacks"), "v", -1.0), 3.0);
    }

    #[test]
    fn text_keeps_non_arithmetic() {
        let c = ctx(1);
        let r = ParameterResolver::new(&c);
        assert_eq!(r.text(&node("POTION:SPEED:{stacks}:1"), "v", ""), "POTION:SPEED:3:1");
    }

    #[test]
    fn unknown_placeholder_falls_back() {
        let c = ctx(1);
        let r = ParameterResolver::new(&c);
        assert_eq!(r.number(&node("{nope}"), "v", 4.0), 4.0);
        assert_eq!(
            r.resolve(&node("{nope}"), "v"),
            Err(ResolutionError::UnknownPlaceholder("nope".into()))
        );
    }

    #[test]
    fn random_needs_a_roll() {
        let c = ctx(1);
        let roll = || 0.25;
        assert!(ParameterResolver::new(&c).resolve(&node("{random}"), "v").is_err());
        assert_eq!(
            ParameterResolver::new(&c).with_roll(&roll).number(&node("{random}"), "v", -1.0),
            0.25
        );
    }
}
