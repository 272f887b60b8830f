use crate::context::Entity;
use crate::node::Scalar;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! signals {
    ($($variant:ident => $key:literal),+ $(,)?) => {
        /// A named game event that can trigger flows.
        ///
        /// Unknown names are kept as `Custom` so content can introduce new
        /// events without an engine change.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Signal {
            $($variant,)+
            Custom(String),
        }

        impl Signal {
            pub const BUILT_IN: &'static [Signal] = &[$(Signal::$variant),+];

            /// The configuration key, e.g. `KILL_MOB`.
            pub fn key(&self) -> &str {
                match self {
                    $(Signal::$variant => $key,)+
                    Signal::Custom(name) => name,
                }
            }

            /// Parses a configuration key. Matching ignores case and an
            /// optional `ON_` prefix.
            pub fn parse(raw: &str) -> Signal {
                let key = raw.trim().to_uppercase();
                let key = key.strip_prefix("ON_").unwrap_or(&key);
                match key {
                    $($key => Signal::$variant,)+
                    other => Signal::Custom(other.to_string()),
                }
            }
        }
    };
}

signals! {
    Attack => "ATTACK",
    Defense => "DEFENSE",
    KillMob => "KILL_MOB",
    KillPlayer => "KILL_PLAYER",
    Shift => "SHIFT",
    FallDamage => "FALL_DAMAGE",
    EffectStatic => "EFFECT_STATIC",
    BowShoot => "BOW_SHOOT",
    BowHit => "BOW_HIT",
    TridentThrow => "TRIDENT_THROW",
    Tick => "TICK",
    BlockBreak => "BLOCK_BREAK",
    BlockPlace => "BLOCK_PLACE",
    Interact => "INTERACT",
    ItemBreak => "ITEM_BREAK",
    Fish => "FISH",
    EntityDeath => "ENTITY_DEATH",
    PlayerNear => "PLAYER_NEAR",
    PlayerStand => "PLAYER_STAND",
    Expire => "EXPIRE",
    ProjectileHit => "PROJECTILE_HIT",
    OwnerAttack => "OWNER_ATTACK",
    OwnerDefend => "OWNER_DEFEND",
}

impl Signal {
    /// Passive signals fire every eligible flow; all others are a priority contest.
    pub fn is_passive(&self) -> bool {
        matches!(self, Signal::Tick | Signal::EffectStatic)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl From<&str> for Signal {
    fn from(raw: &str) -> Self {
        Signal::parse(raw)
    }
}

/// One game event as the host reports it.
#[derive(Debug, Clone)]
pub struct SignalEvent {
    pub signal: Signal,
    pub player: Entity,
    pub victim: Option<Entity>,
    pub damage: f64,
    pub metadata: AHashMap<String, Scalar>,
}

impl SignalEvent {
    pub fn new(signal: Signal, player: Entity) -> Self {
        Self {
            signal,
            player,
            victim: None,
            damage: 0.0,
            metadata: AHashMap::new(),
        }
    }

    pub fn with_victim(mut self, victim: Entity) -> Self {
        self.victim = Some(victim);
        self
    }

    pub fn with_damage(mut self, damage: f64) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
