//! Interfaces of the collaborators the engine calls out to.
//!
//! The engine never knows what an effect does or how a named condition is
//! checked; hosts (and tests) inject implementations of these traits into the
//! executor and dispatcher builders.

use crate::context::{Entity, EntityId, ExecutionContext, Position};
use crate::error::{ConditionError, EffectError};
use crate::executor::Continuation;
use crate::node::Scalar;
use crate::sigil::ItemRef;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::time::Instant;

/// Leaf operations a flow can invoke (damage, potions, particles...).
pub trait EffectRegistry: Send + Sync {
    fn invoke(
        &self,
        effect_type: &str,
        params: &AHashMap<String, Scalar>,
        target: &Entity,
        ctx: &ExecutionContext,
    ) -> Result<(), EffectError>;
}

/// String-keyed predicates such as `HEALTH_BELOW:10` or `HAS_MARK:PHARAOH`.
pub trait ConditionRegistry: Send + Sync {
    fn evaluate(&self, predicate: &str, ctx: &ExecutionContext) -> Result<bool, ConditionError>;
}

/// Receives one call per successful activation.
pub trait ProgressionService: Send + Sync {
    fn award_activation(&self, player: &Entity, item: Option<&ItemRef>, sigil_id: &str, tier: u32);
}

/// The parts of the game world the engine queries.
pub trait World: Send + Sync {
    /// Entities within `radius` of `origin`, nearest first is not required.
    fn nearby_entities(&self, origin: &Position, radius: f64) -> Vec<Entity>;

    /// Online players anywhere in the player's world.
    fn online_players(&self) -> Vec<Entity> {
        Vec::new()
    }

    fn is_player_online(&self, player: EntityId) -> bool;

    /// Whether `player` still has `sigil_id` equipped. Checked before a
    /// delayed continuation resumes.
    fn holds_sigil(&self, player: EntityId, sigil_id: &str, item: Option<&ItemRef>) -> bool;
}

/// Runs a continuation once, `delay_secs` seconds of game time from now.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay_secs: f64, continuation: Continuation);
}

/// Source of "now" in seconds, for cooldown expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock measured from construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to. Useful for tick-driven hosts and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock() += secs;
    }

    pub fn set(&self, secs: f64) {
        *self.now.lock() = secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

/// Condition registry that knows no predicates. Every lookup is an error,
/// which the executor treats as false.
#[derive(Debug, Default)]
pub struct NoConditions;

impl ConditionRegistry for NoConditions {
    fn evaluate(&self, predicate: &str, _ctx: &ExecutionContext) -> Result<bool, ConditionError> {
        Err(ConditionError::UnknownCondition(predicate.to_string()))
    }
}

/// Progression service that ignores awards.
#[derive(Debug, Default)]
pub struct NoProgression;

impl ProgressionService for NoProgression {
    fn award_activation(&self, _player: &Entity, _item: Option<&ItemRef>, _sigil_id: &str, _tier: u32) {}
}

/// A world with nobody else in it. Players are always online and keep their sigils.
#[derive(Debug, Default)]
pub struct EmptyWorld;

impl World for EmptyWorld {
    fn nearby_entities(&self, _origin: &Position, _radius: f64) -> Vec<Entity> {
        Vec::new()
    }

    fn is_player_online(&self, _player: EntityId) -> bool {
        true
    }

    fn holds_sigil(&self, _player: EntityId, _sigil_id: &str, _item: Option<&ItemRef>) -> bool {
        true
    }
}
