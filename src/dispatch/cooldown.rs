use crate::context::EntityId;
use ahash::AHashMap;
use parking_lot::Mutex;

/// Identifies one cooldown timer: a flow of a sigil, for a signal, per player.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub player: EntityId,
    pub sigil_id: String,
    pub signal: String,
    pub flow_id: String,
}

impl CooldownKey {
    pub fn new(player: EntityId, sigil_id: &str, signal: &str, flow_id: &str) -> Self {
        Self {
            player,
            sigil_id: sigil_id.to_string(),
            signal: signal.to_string(),
            flow_id: flow_id.to_string(),
        }
    }
}

/// Thread-safe map of cooldown expiry times (seconds on the dispatcher's clock).
///
/// Check and arm are separate calls; two racing activations may both pass the
/// check, which is tolerated.
#[derive(Debug, Default)]
pub struct CooldownStore {
    expiries: Mutex<AHashMap<CooldownKey, f64>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is still cooling down at `now`. Expired entries are pruned.
    pub fn is_active(&self, key: &CooldownKey, now: f64) -> bool {
        self.remaining(key, now) > 0.0
    }

    /// Seconds left on `key`, 0 when not cooling down.
    pub fn remaining(&self, key: &CooldownKey, now: f64) -> f64 {
        let mut expiries = self.expiries.lock();
        match expiries.get(key) {
            Some(&expiry) if expiry > now => expiry - now,
            Some(_) => {
                expiries.remove(key);
                0.0
            }
            None => 0.0,
        }
    }

    /// Starts (or restarts) the timer for `duration` seconds.
    pub fn arm(&self, key: CooldownKey, now: f64, duration: f64) {
        if duration <= 0.0 {
            return;
        }
        self.expiries.lock().insert(key, now + duration);
    }

    pub fn clear(&self, key: &CooldownKey) {
        self.expiries.lock().remove(key);
    }

    /// Drops every timer of one player, e.g. on logout.
    pub fn clear_player(&self, player: EntityId) {
        self.expiries.lock().retain(|key, _| key.player != player);
    }

    pub fn clear_all(&self) {
        self.expiries.lock().clear();
    }

    /// Drops expired entries.
    pub fn prune(&self, now: f64) {
        self.expiries.lock().retain(|_, expiry| *expiry > now);
    }

    pub fn len(&self) -> usize {
        self.expiries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(player: u64) -> CooldownKey {
        CooldownKey::new(EntityId(player), "ember", "ATTACK", "flow")
    }

    #[test]
    fn expires_and_prunes() {
        let store = CooldownStore::new();
        store.arm(key(1), 10.0, 5.0);
        assert!(store.is_active(&key(1), 12.0));
        assert_eq!(store.remaining(&key(1), 12.0), 3.0);
        assert!(!store.is_active(&key(1), 15.0));
        assert!(store.is_empty());
    }

    #[test]
    fn zero_duration_is_not_armed() {
        let store = CooldownStore::new();
        store.arm(key(1), 0.0, 0.0);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_player_keeps_others() {
        let store = CooldownStore::new();
        store.arm(key(1), 0.0, 5.0);
        store.arm(key(2), 0.0, 5.0);
        store.clear_player(EntityId(1));
        assert_eq!(store.len(), 1);
        assert!(store.is_active(&key(2), 1.0));
    }
}
