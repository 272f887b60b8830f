//! Per-sigil tier tables: one numeric value per upgrade tier for each parameter key.

use crate::error::TierError;
use crate::node::format_number;
use ahash::AHashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// What the tier of a sigil instance scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScalingMode {
    /// Effect parameters scale through `{key}` placeholders.
    #[default]
    Parameter,
    /// Only the activation gates (chance, cooldown) scale.
    ActivationOnly,
    Both,
}

/// Maps parameter keys to one value per tier (tier 1 first).
///
/// Keys are case-insensitive. Reading past the end of a list clamps to the
/// last value; a missing key reads as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierScalingConfig {
    pub mode: ScalingMode,
    max_tier: u32,
    params: AHashMap<String, Vec<f64>>,
}

impl Default for TierScalingConfig {
    fn default() -> Self {
        Self::new(1)
    }
}

impl TierScalingConfig {
    pub fn new(max_tier: u32) -> Self {
        Self {
            mode: ScalingMode::default(),
            max_tier: max_tier.max(1),
            params: AHashMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: ScalingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_tier(&self) -> u32 {
        self.max_tier
    }

    /// Changes the tier count. Longer lists are truncated, shorter ones are
    /// padded with their last value.
    pub fn set_max_tier(&mut self, max_tier: u32) {
        self.max_tier = max_tier.max(1);
        let len = self.max_tier as usize;
        for values in self.params.values_mut() {
            let last = values.last().copied().unwrap_or(0.0);
            values.resize(len, last);
        }
    }

    /// Sets the full value list of a key. The list must have one entry per tier.
    pub fn set_values(&mut self, key: &str, values: Vec<f64>) -> Result<(), TierError> {
        if values.len() != self.max_tier as usize {
            return Err(TierError::LengthMismatch {
                key: key.to_string(),
                expected: self.max_tier as usize,
                found: values.len(),
            });
        }
        self.params.insert(key.to_lowercase(), values);
        Ok(())
    }

    /// Sets one tier of a key, creating the key (all zeros) if needed.
    pub fn set_value(&mut self, key: &str, tier: u32, value: f64) -> Result<(), TierError> {
        if tier == 0 {
            return Err(TierError::ZeroTier);
        }
        if tier > self.max_tier {
            return Err(TierError::TierOutOfRange {
                tier,
                max_tier: self.max_tier,
            });
        }
        let len = self.max_tier as usize;
        let values = self
            .params
            .entry(key.to_lowercase())
            .or_insert_with(|| vec![0.0; len]);
        values[(tier - 1) as usize] = value;
        Ok(())
    }

    /// Adds a key that scales linearly from `base` at tier 1 to `2 * base` at
    /// the max tier, rounded to two decimals.
    pub fn add_scaled_param(&mut self, key: &str, base: f64) {
        let steps = self.max_tier.saturating_sub(1);
        let values = (0..self.max_tier)
            .map(|i| {
                let progress = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
                (base * (1.0 + progress) * 100.0).round() / 100.0
            })
            .collect();
        self.params.insert(key.to_lowercase(), values);
    }

    /// Value of `key` at `tier` (1-based), clamped into the table.
    pub fn value(&self, key: &str, tier: u32) -> Option<f64> {
        let values = self.params.get(&key.to_lowercase())?;
        let last = values.len().checked_sub(1)?;
        let index = (tier.max(1) as usize - 1).min(last);
        values.get(index).copied()
    }

    /// Like `value`, rendered without a trailing `.0` for integral values.
    pub fn value_as_string(&self, key: &str, tier: u32) -> Option<String> {
        self.value(key, tier).map(format_number)
    }

    pub fn values(&self, key: &str) -> Option<&[f64]> {
        self.params.get(&key.to_lowercase()).map(Vec::as_slice)
    }

    pub fn has_param(&self, key: &str) -> bool {
        self.params.contains_key(&key.to_lowercase())
    }

    pub fn remove_param(&mut self, key: &str) -> Option<Vec<f64>> {
        self.params.remove(&key.to_lowercase())
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.params.keys().map(String::as_str).sorted().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn scales_parameters(&self) -> bool {
        matches!(self.mode, ScalingMode::Parameter | ScalingMode::Both)
    }

    pub fn scales_activation(&self) -> bool {
        matches!(self.mode, ScalingMode::ActivationOnly | ScalingMode::Both)
    }
}
