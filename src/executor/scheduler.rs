use super::{ExecutionRecord, FlowExecutor};
use crate::context::{EntityId, ExecutionContext};
use crate::graph::FlowGraph;
use crate::registry::Scheduler;
use ahash::AHashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A walk suspended on a Delay node.
///
/// Holds everything needed to continue: the graph, the node to resume at and
/// the context as it was when the delay was reached. Dropping a continuation
/// without resuming it is fine; it releases its suspension slot.
pub struct Continuation {
    pub graph: Arc<FlowGraph>,
    pub node_id: String,
    pub ctx: ExecutionContext,
    pub(crate) depth: u32,
    pub(crate) permit: SuspensionPermit,
}

impl Continuation {
    /// Number of delays this walk has already passed through.
    pub fn depth(&self) -> u32 {
        self.depth
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("flow", &self.graph.id)
            .field("node_id", &self.node_id)
            .field("player", &self.ctx.player.id)
            .field("depth", &self.depth)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SuspensionKey {
    pub player: EntityId,
    pub sigil_id: String,
    pub flow_id: String,
}

/// Counts pending continuations per (player, sigil, flow).
#[derive(Debug, Default)]
pub(crate) struct SuspensionTracker {
    pending: Mutex<AHashMap<SuspensionKey, usize>>,
}

impl SuspensionTracker {
    /// Takes a slot unless `cap` continuations are already pending for `key`.
    pub fn acquire(self: &Arc<Self>, key: SuspensionKey, cap: usize) -> Option<SuspensionPermit> {
        let mut pending = self.pending.lock();
        let count = pending.entry(key.clone()).or_insert(0);
        if *count >= cap {
            return None;
        }
        *count += 1;
        Some(SuspensionPermit {
            tracker: Arc::clone(self),
            key,
        })
    }

    pub fn pending(&self, key: &SuspensionKey) -> usize {
        self.pending.lock().get(key).copied().unwrap_or(0)
    }

    fn release(&self, key: &SuspensionKey) {
        let mut pending = self.pending.lock();
        if let Some(count) = pending.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                pending.remove(key);
            }
        }
    }
}

/// Releases its slot on drop.
#[derive(Debug)]
pub(crate) struct SuspensionPermit {
    tracker: Arc<SuspensionTracker>,
    key: SuspensionKey,
}

impl Drop for SuspensionPermit {
    fn drop(&mut self) {
        self.tracker.release(&self.key);
    }
}

/// An in-process scheduler driven by the host's tick loop.
///
/// `schedule` files continuations against an internal clock; `advance`
/// moves the clock and hands back whatever became due, earliest first.
#[derive(Debug, Default)]
pub struct TickScheduler {
    state: Mutex<TickState>,
}

#[derive(Debug, Default)]
struct TickState {
    now: f64,
    seq: u64,
    queue: Vec<(f64, u64, Continuation)>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.state.lock().now
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Advances the clock by `secs` and returns the continuations now due.
    pub fn advance(&self, secs: f64) -> Vec<Continuation> {
        let mut state = self.state.lock();
        state.now += secs.max(0.0);
        let now = state.now;
        let (mut due, waiting): (Vec<_>, Vec<_>) = state.queue.drain(..).partition(|(at, _, _)| *at <= now);
        state.queue = waiting;
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        due.into_iter().map(|(_, _, c)| c).collect()
    }

    /// Advances the clock and resumes every due continuation on `executor`.
    ///
    /// Continuations scheduled while resuming wait for a later call.
    pub fn run_due(&self, executor: &FlowExecutor, secs: f64) -> Vec<ExecutionRecord> {
        self.advance(secs)
            .into_iter()
            .map(|c| executor.resume(c))
            .collect()
    }

    /// Drops every pending continuation.
    pub fn clear(&self) {
        self.state.lock().queue.clear();
    }
}

impl Scheduler for TickScheduler {
    fn schedule(&self, delay_secs: f64, continuation: Continuation) {
        let mut state = self.state.lock();
        let at = state.now + delay_secs.max(0.0);
        state.seq += 1;
        let seq = state.seq;
        state.queue.push((at, seq, continuation));
    }
}
