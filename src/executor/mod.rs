//! The flow interpreter.
//!
//! A walk starts at the Start node and follows one port per node until it
//! reaches an End node, an unconnected port, a Delay, or the step budget.
//! Errors from effects, conditions and parameter resolution are recovered
//! where they happen and reported in the record; nothing here returns `Result`.

mod scheduler;
mod trace;
mod walk;

pub use scheduler::{Continuation, TickScheduler};
pub use trace::{TraceEntry, TraceFormatter};

use crate::context::{EntityId, ExecutionContext};
use crate::graph::FlowGraph;
use crate::registry::{ConditionRegistry, EffectRegistry, EmptyWorld, NoConditions, Scheduler, World};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scheduler::SuspensionTracker;
use std::sync::Arc;
use tracing::{debug, warn};
use walk::Walk;

/// Hard ceilings that guarantee every walk terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorLimits {
    /// Node visits per walk, loop bodies included.
    pub max_steps: usize,
    /// Count loops are clamped to this many iterations.
    pub max_loop_count: usize,
    /// While loops stop after this many iterations even if the predicate holds.
    pub max_while_iterations: usize,
    /// Delays a single execution may chain through.
    pub max_delay_depth: u32,
    /// Pending continuations per (player, sigil, flow).
    pub max_suspended_per_flow: usize,
}

impl Default for ExecutorLimits {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            max_loop_count: 100,
            max_while_iterations: 100,
            max_delay_depth: 50,
            max_suspended_per_flow: 8,
        }
    }
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Reached an End node or an unconnected port.
    Completed,
    /// A Delay scheduled the rest of the walk.
    Suspended,
    /// The step budget ran out; effects already run stay applied.
    BudgetExceeded,
    /// No unique start node, or the graph failed validation. Nothing ran.
    Invalid,
    /// A continuation found its player or sigil gone and did not resume.
    Abandoned,
}

/// The result of one walk.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub effects_executed: bool,
    pub effect_count: usize,
    pub skip_cooldown: bool,
    pub steps: usize,
    /// Continuations scheduled by this walk.
    pub suspended: usize,
    pub outcome: WalkOutcome,
    pub diagnostics: Vec<String>,
    /// Filled only in dry-run mode.
    pub trace: Vec<TraceEntry>,
}

impl ExecutionRecord {
    pub(crate) fn new(outcome: WalkOutcome) -> Self {
        Self {
            effects_executed: false,
            effect_count: 0,
            skip_cooldown: false,
            steps: 0,
            suspended: 0,
            outcome,
            diagnostics: Vec::new(),
            trace: Vec::new(),
        }
    }
}

/// Executes flow graphs against injected registries.
///
/// Shareable across threads: the only interior state is the random source
/// and the suspension counters.
pub struct FlowExecutor {
    effects: Arc<dyn EffectRegistry>,
    conditions: Arc<dyn ConditionRegistry>,
    world: Arc<dyn World>,
    scheduler: Option<Arc<dyn Scheduler>>,
    limits: ExecutorLimits,
    rng: Mutex<StdRng>,
    suspensions: Arc<SuspensionTracker>,
}

impl FlowExecutor {
    pub fn builder(effects: Arc<dyn EffectRegistry>) -> ExecutorBuilder {
        ExecutorBuilder::new(effects)
    }

    pub fn limits(&self) -> &ExecutorLimits {
        &self.limits
    }

    /// Uniform draw in `[0, 1)`.
    pub fn roll(&self) -> f64 {
        self.rng.lock().random::<f64>()
    }

    pub(crate) fn conditions(&self) -> &dyn ConditionRegistry {
        self.conditions.as_ref()
    }

    /// Runs `graph` from its start node.
    pub fn execute(&self, graph: &Arc<FlowGraph>, ctx: ExecutionContext) -> ExecutionRecord {
        let Some(start) = graph.start_node() else {
            warn!(flow = %graph.id, "flow has no unique start node, skipping");
            let mut record = ExecutionRecord::new(WalkOutcome::Invalid);
            record.diagnostics.push("Flow has no unique start node".to_string());
            return record;
        };
        let problems = graph.validate();
        if !problems.is_empty() {
            warn!(flow = %graph.id, problems = problems.len(), "flow failed validation, skipping");
            let mut record = ExecutionRecord::new(WalkOutcome::Invalid);
            record.diagnostics = problems.iter().map(ToString::to_string).collect();
            return record;
        }

        debug!(flow = %graph.id, player = %ctx.player.id, "executing flow");
        Walk::new(self, Arc::clone(graph), ctx, 0).run(&start.id)
    }

    /// Continues a walk suspended on a Delay node.
    ///
    /// The continuation is dropped without running when the player went
    /// offline or no longer holds the owning sigil.
    pub fn resume(&self, continuation: Continuation) -> ExecutionRecord {
        let Continuation {
            graph,
            node_id,
            ctx,
            depth,
            permit,
        } = continuation;
        drop(permit);

        if !self.still_valid(&ctx) {
            debug!(flow = %graph.id, player = %ctx.player.id, "dropping continuation, context no longer valid");
            return ExecutionRecord::new(WalkOutcome::Abandoned);
        }
        debug!(flow = %graph.id, node = %node_id, depth, "resuming flow");
        Walk::new(self, graph, ctx, depth).run(&node_id)
    }

    /// Pending continuations for one player, sigil and flow.
    pub fn pending_suspensions(&self, player: EntityId, sigil_id: &str, flow_id: &str) -> usize {
        self.suspensions.pending(&scheduler::SuspensionKey {
            player,
            sigil_id: sigil_id.to_string(),
            flow_id: flow_id.to_string(),
        })
    }

    fn still_valid(&self, ctx: &ExecutionContext) -> bool {
        let player = ctx.player.id;
        if !self.world.is_player_online(player) {
            return false;
        }
        match &ctx.source {
            Some(source) => self.world.holds_sigil(player, &source.sigil.id, source.item.as_ref()),
            None => true,
        }
    }
}

/// Fluent configuration of a `FlowExecutor`.
pub struct ExecutorBuilder {
    effects: Arc<dyn EffectRegistry>,
    conditions: Arc<dyn ConditionRegistry>,
    world: Arc<dyn World>,
    scheduler: Option<Arc<dyn Scheduler>>,
    limits: ExecutorLimits,
    seed: Option<u64>,
}

impl ExecutorBuilder {
    pub fn new(effects: Arc<dyn EffectRegistry>) -> Self {
        Self {
            effects,
            conditions: Arc::new(NoConditions),
            world: Arc::new(EmptyWorld),
            scheduler: None,
            limits: ExecutorLimits::default(),
            seed: None,
        }
    }

    pub fn with_conditions(mut self, conditions: Arc<dyn ConditionRegistry>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_world(mut self, world: Arc<dyn World>) -> Self {
        self.world = world;
        self
    }

    /// Without a scheduler, Delay nodes end their path in live mode.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_limits(mut self, limits: ExecutorLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.limits.max_steps = max_steps;
        self
    }

    /// Seeds the random source for reproducible Random nodes and chance rolls.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> FlowExecutor {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        FlowExecutor {
            effects: self.effects,
            conditions: self.conditions,
            world: self.world,
            scheduler: self.scheduler,
            limits: self.limits,
            rng: Mutex::new(rng),
            suspensions: Arc::new(SuspensionTracker::default()),
        }
    }
}
