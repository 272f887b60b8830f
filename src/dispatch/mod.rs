//! Signal dispatch: which flows run for one game event, in what order, and how often.
//!
//! For each event the dispatcher collects every flow listening for the signal
//! across the player's equipped items, then gates each candidate on cooldown,
//! chance and declared conditions before handing it to the executor.
//!
//! - **Active** signals (attack, defense, interact...) are a priority contest:
//!   candidates are tried highest priority first and dispatch stops at the
//!   first flow that executes an effect or suspends on a Delay.
//! - **Passive** signals (tick, static effects) try every candidate.

mod cooldown;
mod signal;

pub use cooldown::{CooldownKey, CooldownStore};
pub use signal::{Signal, SignalEvent};

use crate::context::{Entity, ExecutionContext};
use crate::executor::{ExecutionRecord, FlowExecutor};
use crate::flow::{ConditionLogic, FlowConfig};
use crate::registry::{Clock, NoProgression, ProgressionService, SystemClock};
use crate::resolver::ParameterResolver;
use crate::sigil::{Item, Loadout, SigilInstance};
use ahash::AHashSet;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cooldown key signal name used for ability activations.
pub const ABILITY_KEY: &str = "ABILITY";

/// Why a candidate flow did or did not activate.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// The flow ran and executed at least one effect, or suspended on a Delay.
    Activated(ExecutionRecord),
    /// The flow ran to the end without executing an effect. It does not count as an activation.
    NoEffect(ExecutionRecord),
    OnCooldown { remaining: f64 },
    ChanceFailed { chance: f64 },
    ConditionsFailed,
}

/// One gated candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowAttempt {
    pub sigil_id: String,
    pub flow_id: String,
    pub priority: i32,
    pub outcome: AttemptOutcome,
}

impl FlowAttempt {
    pub fn activated(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Activated(_))
    }

    /// The execution record, when the flow ran.
    pub fn record(&self) -> Option<&ExecutionRecord> {
        match &self.outcome {
            AttemptOutcome::Activated(record) | AttemptOutcome::NoEffect(record) => Some(record),
            _ => None,
        }
    }
}

/// Everything one dispatch did, in attempt order.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub signal: Signal,
    pub passive: bool,
    /// Flows listening for the signal across the loadout.
    pub candidates: usize,
    pub attempts: Vec<FlowAttempt>,
}

impl DispatchReport {
    pub fn activations(&self) -> impl Iterator<Item = &FlowAttempt> {
        self.attempts.iter().filter(|a| a.activated())
    }

    pub fn activation_count(&self) -> usize {
        self.activations().count()
    }

    pub fn any_activated(&self) -> bool {
        self.attempts.iter().any(FlowAttempt::activated)
    }
}

/// A flow picked from the loadout, with its context and effective gates.
struct Candidate<'l> {
    item: &'l Item,
    instance: &'l SigilInstance,
    flow: &'l FlowConfig,
    ctx: ExecutionContext,
    gates: Gates,
}

#[derive(Debug, Clone, Copy)]
struct Gates {
    chance: f64,
    cooldown: f64,
    priority: i32,
}

/// Selects and gates flows for game events. Safe to share between threads.
pub struct SignalDispatcher {
    executor: Arc<FlowExecutor>,
    progression: Arc<dyn ProgressionService>,
    clock: Arc<dyn Clock>,
    cooldowns: CooldownStore,
    rng: Mutex<StdRng>,
    passive: AHashSet<Signal>,
}

impl SignalDispatcher {
    pub fn builder(executor: Arc<FlowExecutor>) -> DispatcherBuilder {
        DispatcherBuilder::new(executor)
    }

    pub fn executor(&self) -> &Arc<FlowExecutor> {
        &self.executor
    }

    pub fn cooldowns(&self) -> &CooldownStore {
        &self.cooldowns
    }

    pub fn is_passive(&self, signal: &Signal) -> bool {
        signal.is_passive() || self.passive.contains(signal)
    }

    /// Runs the flows `event` selects from `loadout`.
    pub fn dispatch(&self, event: &SignalEvent, loadout: &Loadout) -> DispatchReport {
        let passive = self.is_passive(&event.signal);
        let mut candidates = self.collect(event, loadout);
        let mut report = DispatchReport {
            signal: event.signal.clone(),
            passive,
            candidates: candidates.len(),
            attempts: Vec::with_capacity(candidates.len()),
        };
        if candidates.is_empty() {
            return report;
        }

        if !passive {
            // Stable: equal priorities keep loadout order.
            candidates.sort_by(|a, b| b.gates.priority.cmp(&a.gates.priority));
        }
        debug!(signal = %event.signal, player = %event.player.id, candidates = candidates.len(), passive, "dispatching");

        for candidate in candidates {
            let attempt = self.attempt(candidate, event.signal.key(), true);
            let activated = attempt.activated();
            report.attempts.push(attempt);
            if activated && !passive {
                break;
            }
        }
        report
    }

    /// Runs the ability flow of `sigil_id`, if the player has it equipped.
    ///
    /// Chance does not apply to abilities; cooldown and conditions do.
    pub fn activate_ability(&self, player: &Entity, loadout: &Loadout, sigil_id: &str) -> Option<FlowAttempt> {
        let (item, instance) = loadout.find_sigil(sigil_id)?;
        let Some(flow) = instance.sigil.ability() else {
            debug!(sigil = sigil_id, "sigil has no ability flow");
            return None;
        };
        let ctx = ExecutionContext::new(player.clone()).with_source(
            Arc::clone(&instance.sigil),
            instance.tier,
            Some(item.reference.clone()),
        );
        let gates = self.gates(flow, &ctx);
        let candidate = Candidate {
            item,
            instance,
            flow,
            ctx,
            gates,
        };
        Some(self.attempt(candidate, ABILITY_KEY, false))
    }

    fn collect<'l>(&self, event: &SignalEvent, loadout: &'l Loadout) -> Vec<Candidate<'l>> {
        let mut candidates = Vec::new();
        for item in loadout.items() {
            for instance in &item.sigils {
                for flow in instance.sigil.flows_for(&event.signal) {
                    let ctx = ExecutionContext::for_event(event).with_source(
                        Arc::clone(&instance.sigil),
                        instance.tier,
                        Some(item.reference.clone()),
                    );
                    let gates = self.gates(flow, &ctx);
                    candidates.push(Candidate {
                        item,
                        instance,
                        flow,
                        ctx,
                        gates,
                    });
                }
            }
        }
        candidates
    }

    /// Effective chance, cooldown and priority.
    ///
    /// A Start node parameter wins over the cached config field. Tables in an
    /// activation-scaling mode supply `chance` and `cooldown` per tier when
    /// the Start node does not.
    fn gates(&self, flow: &FlowConfig, ctx: &ExecutionContext) -> Gates {
        let resolver = ParameterResolver::new(ctx).with_tier(ctx.tier());
        let table = ctx.tier_config().filter(|t| t.scales_activation());
        let gate = |key: &str, cached: f64| match flow.graph.start_node() {
            Some(start) if start.param(key).is_some() => resolver.number(start, key, cached),
            _ => table.and_then(|t| t.value(key, ctx.tier())).unwrap_or(cached),
        };
        Gates {
            chance: gate("chance", flow.chance),
            cooldown: gate("cooldown", flow.cooldown).max(0.0),
            priority: match flow.graph.start_node() {
                Some(start) if start.param("priority").is_some() => {
                    resolver.number(start, "priority", flow.priority as f64) as i32
                }
                _ => flow.priority,
            },
        }
    }

    fn attempt(&self, candidate: Candidate<'_>, signal_key: &str, roll_chance: bool) -> FlowAttempt {
        let Candidate {
            item,
            instance,
            flow,
            ctx,
            gates,
        } = candidate;
        let sigil_id = instance.sigil.id.as_str();
        let finish = |outcome| FlowAttempt {
            sigil_id: sigil_id.to_string(),
            flow_id: flow.id().to_string(),
            priority: gates.priority,
            outcome,
        };

        let key = CooldownKey::new(ctx.player.id, sigil_id, signal_key, flow.id());
        if gates.cooldown > 0.0 {
            let remaining = self.cooldowns.remaining(&key, self.clock.now());
            if remaining > 0.0 {
                debug!(sigil = sigil_id, flow = flow.id(), remaining, "on cooldown");
                return finish(AttemptOutcome::OnCooldown { remaining });
            }
        }

        if roll_chance && !self.roll_chance(gates.chance) {
            debug!(sigil = sigil_id, flow = flow.id(), chance = gates.chance, "chance roll failed");
            return finish(AttemptOutcome::ChanceFailed { chance: gates.chance });
        }

        if !self.conditions_pass(flow, &ctx) {
            debug!(sigil = sigil_id, flow = flow.id(), "conditions failed");
            return finish(AttemptOutcome::ConditionsFailed);
        }

        let player = ctx.player.clone();
        let tier = instance.tier;
        let record = self.executor.execute(&flow.graph, ctx);
        // Suspended on a Delay counts as activated.
        if !record.effects_executed && record.suspended == 0 {
            return finish(AttemptOutcome::NoEffect(record));
        }

        self.progression
            .award_activation(&player, Some(&item.reference), sigil_id, tier);
        if record.skip_cooldown {
            debug!(sigil = sigil_id, flow = flow.id(), "cooldown skipped");
        } else {
            self.cooldowns.arm(key, self.clock.now(), gates.cooldown);
        }
        debug!(sigil = sigil_id, flow = flow.id(), effects = record.effect_count, "activated");
        finish(AttemptOutcome::Activated(record))
    }

    /// `chance` is a percentage. A draw in `[0, 100)` must not exceed it.
    fn roll_chance(&self, chance: f64) -> bool {
        if chance >= 100.0 {
            return true;
        }
        if chance <= 0.0 {
            return false;
        }
        self.roll() * 100.0 <= chance
    }

    fn roll(&self) -> f64 {
        self.rng.lock().random::<f64>()
    }

    fn conditions_pass(&self, flow: &FlowConfig, ctx: &ExecutionContext) -> bool {
        if flow.conditions.is_empty() {
            return true;
        }
        let mut results = flow.conditions.iter().map(|c| self.condition(c, ctx));
        match flow.condition_logic {
            ConditionLogic::And => results.all(|pass| pass),
            ConditionLogic::Or => results.any(|pass| pass),
        }
    }

    fn condition(&self, predicate: &str, ctx: &ExecutionContext) -> bool {
        let roll = || self.roll();
        let local = ParameterResolver::new(ctx).with_roll(&roll).evaluate_local(predicate);
        match local {
            Ok(Some(result)) => result,
            Ok(None) => self
                .executor
                .conditions()
                .evaluate(predicate, ctx)
                .unwrap_or_else(|e| {
                    warn!(predicate, error = %e, "flow condition failed");
                    false
                }),
            Err(e) => {
                warn!(predicate, error = %e, "flow condition could not be resolved");
                false
            }
        }
    }
}

/// Fluent configuration of a `SignalDispatcher`.
pub struct DispatcherBuilder {
    executor: Arc<FlowExecutor>,
    progression: Arc<dyn ProgressionService>,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
    passive: AHashSet<Signal>,
}

impl DispatcherBuilder {
    pub fn new(executor: Arc<FlowExecutor>) -> Self {
        Self {
            executor,
            progression: Arc::new(NoProgression),
            clock: Arc::new(SystemClock::default()),
            seed: None,
            passive: AHashSet::new(),
        }
    }

    pub fn with_progression(mut self, progression: Arc<dyn ProgressionService>) -> Self {
        self.progression = progression;
        self
    }

    /// Clock used for cooldown expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Seeds the chance rolls.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Treats `signal` as passive in addition to the built-in passive signals.
    pub fn passive_signal(mut self, signal: Signal) -> Self {
        self.passive.insert(signal);
        self
    }

    pub fn build(self) -> SignalDispatcher {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        SignalDispatcher {
            executor: self.executor,
            progression: self.progression,
            clock: self.clock,
            cooldowns: CooldownStore::new(),
            rng: Mutex::new(rng),
            passive: self.passive,
        }
    }
}
