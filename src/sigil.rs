//! Sigils, the items they are socketed into, and a player's equipped loadout.

use crate::dispatch::Signal;
use crate::flow::{FlowConfig, FlowType};
use crate::tier::TierScalingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A sigil definition: its tier table and the flows it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sigil {
    pub id: String,
    pub name: String,
    pub max_tier: u32,
    pub tier_scaling: TierScalingConfig,
    pub flows: Vec<FlowConfig>,
}

impl Sigil {
    pub fn new(id: impl Into<String>, max_tier: u32) -> Self {
        let id = id.into();
        let max_tier = max_tier.max(1);
        Self {
            name: id.clone(),
            id,
            max_tier,
            tier_scaling: TierScalingConfig::new(max_tier),
            flows: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tier_scaling(mut self, tier_scaling: TierScalingConfig) -> Self {
        self.tier_scaling = tier_scaling;
        self
    }

    pub fn with_flow(mut self, flow: FlowConfig) -> Self {
        self.flows.push(flow);
        self
    }

    /// Signal flows listening for `signal`, in declaration order.
    pub fn flows_for<'a>(&'a self, signal: &Signal) -> impl Iterator<Item = &'a FlowConfig> {
        self.flows.iter().filter(move |f| f.matches(signal))
    }

    pub fn ability(&self) -> Option<&FlowConfig> {
        self.flows.iter().find(|f| f.flow_type == FlowType::Ability)
    }

    pub fn flow(&self, id: &str) -> Option<&FlowConfig> {
        self.flows.iter().find(|f| f.id() == id)
    }
}

/// Host-side reference to an item, passed back to the progression service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef(pub String);

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sigil socketed at a particular tier.
#[derive(Debug, Clone)]
pub struct SigilInstance {
    pub sigil: Arc<Sigil>,
    pub tier: u32,
}

impl SigilInstance {
    pub fn new(sigil: Arc<Sigil>, tier: u32) -> Self {
        Self { sigil, tier: tier.max(1) }
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub reference: ItemRef,
    pub sigils: Vec<SigilInstance>,
}

impl Item {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: ItemRef(reference.into()),
            sigils: Vec::new(),
        }
    }

    pub fn with_sigil(mut self, sigil: Arc<Sigil>, tier: u32) -> Self {
        self.sigils.push(SigilInstance::new(sigil, tier));
        self
    }
}

/// The items a player has equipped when a signal fires.
#[derive(Debug, Clone, Default)]
pub struct Loadout {
    pub armor: Vec<Item>,
    pub main_hand: Option<Item>,
    pub off_hand: Option<Item>,
}

impl Loadout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_armor(mut self, item: Item) -> Self {
        self.armor.push(item);
        self
    }

    pub fn with_main_hand(mut self, item: Item) -> Self {
        self.main_hand = Some(item);
        self
    }

    pub fn with_off_hand(mut self, item: Item) -> Self {
        self.off_hand = Some(item);
        self
    }

    /// Armor first, then main hand, then off hand.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.armor
            .iter()
            .chain(self.main_hand.iter())
            .chain(self.off_hand.iter())
    }

    pub fn find_sigil(&self, sigil_id: &str) -> Option<(&Item, &SigilInstance)> {
        self.items().find_map(|item| {
            item.sigils
                .iter()
                .find(|s| s.sigil.id == sigil_id)
                .map(|s| (item, s))
        })
    }
}
