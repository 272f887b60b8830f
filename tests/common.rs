//! Common test utilities: mock collaborators and ready-made flows.
use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;
use sigilflow::error::{ConditionError, EffectError};
use sigilflow::prelude::*;
use sigilflow::sigil::ItemRef;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One recorded effect call.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub effect: String,
    pub target: String,
    pub params: AHashMap<String, Scalar>,
}

/// Effect registry that records every call. Effects marked as failing
/// return an error instead.
#[derive(Debug, Default)]
pub struct RecordingEffects {
    calls: Mutex<Vec<Invocation>>,
    failing: Mutex<AHashSet<String>>,
}

#[allow(dead_code)]
impl RecordingEffects {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, effect: &str) {
        self.failing.lock().insert(effect.to_string());
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.effect.clone()).collect()
    }

    pub fn count(&self, effect: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.effect == effect).count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl EffectRegistry for RecordingEffects {
    fn invoke(
        &self,
        effect_type: &str,
        params: &AHashMap<String, Scalar>,
        target: &Entity,
        _ctx: &ExecutionContext,
    ) -> std::result::Result<(), EffectError> {
        if self.failing.lock().contains(effect_type) {
            return Err(EffectError::Failed {
                effect: effect_type.to_string(),
                message: "scripted failure".to_string(),
            });
        }
        self.calls.lock().push(Invocation {
            effect: effect_type.to_string(),
            target: target.name.clone(),
            params: params.clone(),
        });
        Ok(())
    }
}

/// Effect registry that only counts calls per effect type.
#[derive(Debug, Default)]
pub struct CountingEffects {
    counts: Mutex<AHashMap<String, usize>>,
}

#[allow(dead_code)]
impl CountingEffects {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, effect: &str) -> usize {
        self.counts.lock().get(effect).copied().unwrap_or(0)
    }
}

impl EffectRegistry for CountingEffects {
    fn invoke(
        &self,
        effect_type: &str,
        _params: &AHashMap<String, Scalar>,
        _target: &Entity,
        _ctx: &ExecutionContext,
    ) -> std::result::Result<(), EffectError> {
        *self.counts.lock().entry(effect_type.to_string()).or_insert(0) += 1;
        Ok(())
    }
}

/// Understands `HEALTH_BELOW:<n>` and `HAS_VICTIM`, plus any predicate
/// scripted with `set`. Everything else is an unknown condition.
#[derive(Debug, Default)]
pub struct ScriptedConditions {
    fixed: Mutex<AHashMap<String, bool>>,
    evaluated: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedConditions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, predicate: &str, result: bool) {
        self.fixed.lock().insert(predicate.to_string(), result);
    }

    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated.lock().clone()
    }
}

impl ConditionRegistry for ScriptedConditions {
    fn evaluate(&self, predicate: &str, ctx: &ExecutionContext) -> std::result::Result<bool, ConditionError> {
        self.evaluated.lock().push(predicate.to_string());
        if let Some(result) = self.fixed.lock().get(predicate) {
            return Ok(*result);
        }
        if let Some(threshold) = predicate.strip_prefix("HEALTH_BELOW:") {
            let threshold: f64 = threshold.parse().map_err(|_| ConditionError::Failed {
                predicate: predicate.to_string(),
                message: "threshold is not a number".to_string(),
            })?;
            return Ok(ctx.player.health < threshold);
        }
        if predicate == "HAS_VICTIM" {
            return Ok(ctx.victim.is_some());
        }
        Err(ConditionError::UnknownCondition(predicate.to_string()))
    }
}

/// A fixed set of entities around the player.
#[derive(Debug)]
pub struct StaticWorld {
    pub entities: Vec<Entity>,
    online: AtomicBool,
    holds: AtomicBool,
}

#[allow(dead_code)]
impl StaticWorld {
    pub fn new(entities: Vec<Entity>) -> Arc<Self> {
        Arc::new(Self {
            entities,
            online: AtomicBool::new(true),
            holds: AtomicBool::new(true),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_holds_sigil(&self, holds: bool) {
        self.holds.store(holds, Ordering::SeqCst);
    }
}

impl World for StaticWorld {
    fn nearby_entities(&self, origin: &Position, radius: f64) -> Vec<Entity> {
        self.entities
            .iter()
            .filter(|e| e.position.distance(origin) <= radius)
            .cloned()
            .collect()
    }

    fn online_players(&self) -> Vec<Entity> {
        self.entities.iter().filter(|e| e.is_player()).cloned().collect()
    }

    fn is_player_online(&self, _player: EntityId) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn holds_sigil(&self, _player: EntityId, _sigil_id: &str, _item: Option<&ItemRef>) -> bool {
        self.holds.load(Ordering::SeqCst)
    }
}

/// One award per successful activation: (player, sigil, tier).
#[derive(Debug, Default)]
pub struct CountingProgression {
    awards: Mutex<Vec<(EntityId, String, u32)>>,
}

#[allow(dead_code)]
impl CountingProgression {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn awards(&self) -> Vec<(EntityId, String, u32)> {
        self.awards.lock().clone()
    }
}

impl ProgressionService for CountingProgression {
    fn award_activation(&self, player: &Entity, _item: Option<&ItemRef>, sigil_id: &str, tier: u32) {
        self.awards.lock().push((player.id, sigil_id.to_string(), tier));
    }
}

#[allow(dead_code)]
pub fn player() -> Entity {
    Entity::player(1, "Alex").with_health(20.0, 20.0)
}

#[allow(dead_code)]
pub fn zombie() -> Entity {
    Entity::new(2, EntityKind::Hostile, "Zombie").at(Position::new(3.0, 0.0, 0.0))
}

/// `start -> <effect> -> end`.
#[allow(dead_code)]
pub fn single_effect_graph(id: &str, effect: &str) -> FlowGraph {
    GraphBuilder::new(id)
        .node("start", NodeKind::Start)
        .node("fx", NodeKind::Effect)
        .param("effectType", effect)
        .node("end", NodeKind::End)
        .connect("start", PORT_NEXT, "fx")
        .connect("fx", PORT_NEXT, "end")
        .build()
        .expect("single effect graph should build")
}

/// `start -> HEALTH_BELOW:10 ? HEAL(amount) : end`.
#[allow(dead_code)]
pub fn heal_when_low_graph() -> FlowGraph {
    GraphBuilder::new("heal_when_low")
        .node("start", NodeKind::Start)
        .node("check", NodeKind::Condition)
        .param("condition", "HEALTH_BELOW:10")
        .node("heal", NodeKind::Effect)
        .param("effectType", "HEAL")
        .param("amount", 5)
        .node("end", NodeKind::End)
        .connect("start", PORT_NEXT, "check")
        .connect("check", PORT_YES, "heal")
        .connect("check", PORT_NO, "end")
        .connect("heal", PORT_NEXT, "end")
        .build()
        .expect("heal graph should build")
}

/// A seeded executor over the given collaborators.
#[allow(dead_code)]
pub fn executor_with(effects: Arc<dyn EffectRegistry>, conditions: Arc<dyn ConditionRegistry>) -> FlowExecutor {
    FlowExecutor::builder(effects)
        .with_conditions(conditions)
        .with_seed(7)
        .build()
}

/// Wraps one flow in a sigil and socket it into a main-hand item at `tier`.
#[allow(dead_code)]
pub fn loadout_with(sigil: Sigil, tier: u32) -> Loadout {
    Loadout::new().with_main_hand(Item::new("main_hand").with_sigil(Arc::new(sigil), tier))
}

/// A content file with one tier-scaled sigil carrying an attack flow and an ability.
#[allow(dead_code)]
pub const SIGIL_JSON: &str = r#"{
    "id": "vampiric",
    "name": "Vampiric",
    "maxTier": 3,
    "tier": {
        "mode": "PARAMETER",
        "params": {
            "heal": [2, 4, 6],
            "cooldown": [10, 8, 5]
        }
    },
    "flows": [
        {
            "type": "SIGNAL",
            "trigger": "ATTACK",
            "id": "drain",
            "name": "Drain",
            "priority": 3,
            "startNodeId": "start",
            "nodes": [
                { "id": "start", "type": "START", "x": 0, "y": 0,
                  "params": { "cooldown": "{cooldown}", "chance": 100 },
                  "next": "check" },
                { "id": "check", "type": "CONDITION", "x": 1, "y": 0,
                  "condition": "HAS_VICTIM",
                  "connections": { "yes": "heal", "no": "end" } },
                { "id": "heal", "type": "EFFECT", "x": 2, "y": 0,
                  "effect": "HEAL",
                  "params": { "amount": "{heal}", "target": "@Self" },
                  "next": "end" },
                { "id": "end", "type": "END", "x": 3, "y": 0 }
            ]
        },
        {
            "type": "ABILITY",
            "id": "burst",
            "cooldown": 30,
            "nodes": [
                { "id": "start", "type": "START", "next": "fx" },
                { "id": "fx", "type": "EFFECT", "x": 1, "effect": "BURST", "next": "end" },
                { "id": "end", "type": "END", "x": 2 }
            ]
        }
    ]
}"#;
