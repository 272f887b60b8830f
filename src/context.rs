//! Per-invocation state: who acts, who is hit, and the flow's scratch variables.

use crate::dispatch::{Signal, SignalEvent};
use crate::node::Scalar;
use crate::sigil::{ItemRef, Sigil};
use crate::tier::TierScalingConfig;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Hostile,
    Passive,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A snapshot of a game entity as the host hands it to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub health: f64,
    pub max_health: f64,
    pub position: Position,
}

impl Entity {
    pub fn new(id: u64, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: EntityId(id),
            kind,
            name: name.into(),
            health: 20.0,
            max_health: 20.0,
            position: Position::default(),
        }
    }

    pub fn player(id: u64, name: impl Into<String>) -> Self {
        Self::new(id, EntityKind::Player, name)
    }

    pub fn with_health(mut self, health: f64, max_health: f64) -> Self {
        self.health = health;
        self.max_health = max_health;
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn is_player(&self) -> bool {
        self.kind == EntityKind::Player
    }

    pub fn health_percent(&self) -> f64 {
        if self.max_health > 0.0 {
            self.health / self.max_health * 100.0
        } else {
            0.0
        }
    }
}

/// The sigil instance that owns the running flow.
#[derive(Debug, Clone)]
pub struct SigilSource {
    pub sigil: Arc<Sigil>,
    pub tier: u32,
    pub item: Option<ItemRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Live,
    /// Delays pass through instantly and every step is traced.
    DryRun,
}

/// Created fresh for each invocation and discarded when the walk ends.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub player: Entity,
    pub victim: Option<Entity>,
    /// Current target. Starts as the victim, replaced by Target nodes.
    pub target: Option<Entity>,
    pub signal: Option<Signal>,
    pub damage: f64,
    pub variables: AHashMap<String, Scalar>,
    pub source: Option<SigilSource>,
    pub metadata: AHashMap<String, Scalar>,
    pub mode: ExecutionMode,
}

impl ExecutionContext {
    pub fn new(player: Entity) -> Self {
        Self {
            player,
            victim: None,
            target: None,
            signal: None,
            damage: 0.0,
            variables: AHashMap::new(),
            source: None,
            metadata: AHashMap::new(),
            mode: ExecutionMode::Live,
        }
    }

    /// Builds a context for one dispatched event.
    pub fn for_event(event: &SignalEvent) -> Self {
        let mut ctx = Self::new(event.player.clone())
            .with_signal(event.signal.clone())
            .with_damage(event.damage);
        if let Some(victim) = &event.victim {
            ctx = ctx.with_victim(victim.clone());
        }
        ctx.metadata = event.metadata.clone();
        ctx
    }

    pub fn with_victim(mut self, victim: Entity) -> Self {
        self.target = Some(victim.clone());
        self.victim = Some(victim);
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_damage(mut self, damage: f64) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_source(mut self, sigil: Arc<Sigil>, tier: u32, item: Option<ItemRef>) -> Self {
        self.source = Some(SigilSource { sigil, tier, item });
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.mode = ExecutionMode::DryRun;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode == ExecutionMode::DryRun
    }

    /// Tier of the owning sigil instance, 1 when there is none.
    pub fn tier(&self) -> u32 {
        self.source.as_ref().map_or(1, |s| s.tier.max(1))
    }

    pub fn tier_config(&self) -> Option<&TierScalingConfig> {
        self.source.as_ref().map(|s| &s.sigil.tier_scaling)
    }

    pub fn sigil_id(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.sigil.id.as_str())
    }

    pub fn variable(&self, name: &str) -> Option<&Scalar> {
        self.variables.get(name)
    }

    pub fn variable_number(&self, name: &str) -> f64 {
        self.variable(name).and_then(Scalar::as_number).unwrap_or(0.0)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Scalar>) {
        self.variables.insert(name.into(), value.into());
    }
}
