use super::scheduler::{Continuation, SuspensionKey};
use super::{ExecutionRecord, FlowExecutor, TraceEntry, WalkOutcome};
use crate::context::{Entity, EntityKind, ExecutionContext};
use crate::error::ResolutionError;
use crate::graph::FlowGraph;
use crate::node::{
    format_number, FlowNode, LoopMode, MathOp, NodeKind, Scalar, TargetType, VariableOp, PORT_NEXT, PORT_NO,
    PORT_YES, RANDOM_PORTS,
};
use crate::resolver::ParameterResolver;
use itertools::Itertools;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a node visit asks the walk to do next.
enum Step {
    Follow(&'static str),
    Stop,
    Suspend,
    Halt,
}

/// How a path (the main walk, or one loop iteration) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathEnd {
    Finished,
    Suspended,
    Halted,
}

pub(super) struct Walk<'e> {
    exec: &'e FlowExecutor,
    graph: Arc<FlowGraph>,
    ctx: ExecutionContext,
    record: ExecutionRecord,
    delay_depth: u32,
}

impl<'e> Walk<'e> {
    pub(super) fn new(exec: &'e FlowExecutor, graph: Arc<FlowGraph>, ctx: ExecutionContext, delay_depth: u32) -> Self {
        Self {
            exec,
            graph,
            ctx,
            record: ExecutionRecord::new(WalkOutcome::Completed),
            delay_depth,
        }
    }

    pub(super) fn run(mut self, entry: &str) -> ExecutionRecord {
        self.record.outcome = match self.run_path(entry) {
            PathEnd::Finished => WalkOutcome::Completed,
            PathEnd::Suspended => WalkOutcome::Suspended,
            PathEnd::Halted => WalkOutcome::BudgetExceeded,
        };
        self.record.effects_executed = self.record.effect_count > 0;
        debug!(
            flow = %self.graph.id,
            outcome = ?self.record.outcome,
            steps = self.record.steps,
            effects = self.record.effect_count,
            "walk finished"
        );
        self.record
    }

    fn run_path(&mut self, entry: &str) -> PathEnd {
        let graph = Arc::clone(&self.graph);
        let Some(mut node) = graph.node(entry) else {
            self.note(format!("Node '{}' does not exist", entry));
            return PathEnd::Finished;
        };

        loop {
            self.record.steps += 1;
            if self.record.steps > self.exec.limits.max_steps {
                warn!(flow = %graph.id, node = %node.id, limit = self.exec.limits.max_steps, "step budget exceeded");
                self.record.steps = self.exec.limits.max_steps;
                self.note(format!(
                    "Step budget of {} exceeded at {} ({})",
                    self.exec.limits.max_steps, node.kind, node.id
                ));
                return PathEnd::Halted;
            }

            debug!(flow = %graph.id, node = %node.id, kind = %node.kind, "visiting node");
            let port = match self.visit(&graph, node) {
                Step::Follow(port) => port,
                Step::Stop => return PathEnd::Finished,
                Step::Suspend => return PathEnd::Suspended,
                Step::Halt => return PathEnd::Halted,
            };

            let Some(target) = graph.target(&node.id, port) else {
                return PathEnd::Finished;
            };
            match graph.node(target) {
                Some(next) => node = next,
                None => {
                    self.note(format!("{} ({}): port '{}' leads to missing node '{}'", node.kind, node.id, port, target));
                    return PathEnd::Finished;
                }
            }
        }
    }

    fn visit(&mut self, graph: &FlowGraph, node: &FlowNode) -> Step {
        match node.kind {
            NodeKind::Start => {
                self.trace(node, "", Some(PORT_NEXT));
                Step::Follow(PORT_NEXT)
            }
            NodeKind::End => {
                self.trace(node, "", None);
                Step::Stop
            }
            NodeKind::Effect => self.visit_effect(node),
            NodeKind::Condition => {
                let predicate = node.text_param("condition").unwrap_or_default();
                let holds = self.evaluate_predicate(node, &predicate);
                let port = if holds { PORT_YES } else { PORT_NO };
                self.trace(node, &predicate, Some(port));
                Step::Follow(port)
            }
            NodeKind::Delay => self.visit_delay(graph, node),
            NodeKind::Loop => self.visit_loop(graph, node),
            NodeKind::Random => self.visit_random(node),
            NodeKind::Variable => self.visit_variable(node),
            NodeKind::Target => self.visit_target(node),
            NodeKind::Math => self.visit_math(node),
            NodeKind::SkipCooldown => {
                self.record.skip_cooldown = true;
                self.trace(node, "cooldown will be skipped", Some(PORT_NEXT));
                Step::Follow(PORT_NEXT)
            }
        }
    }

    fn visit_effect(&mut self, node: &FlowNode) -> Step {
        let chance = self.number(node, "chance", 100.0);
        if chance < 100.0 && self.exec.roll() * 100.0 >= chance {
            self.store_effect_result(node, false);
            self.trace(node, &format!("skipped by {}% chance", format_number(chance)), Some(PORT_NEXT));
            return Step::Follow(PORT_NEXT);
        }

        let effect_type = self.text(node, "effectType", "");
        if effect_type.is_empty() {
            self.note(format!("Effect ({}): no effect type", node.id));
            return Step::Follow(PORT_NEXT);
        }
        let selector = self.text(node, "target", "@Self");
        let targets = self.select_targets(node, &selector);

        let exec = self.exec;
        let roll = move || exec.roll();
        let (params, failures) = ParameterResolver::new(&self.ctx).with_roll(&roll).resolve_all(node);
        for (key, error) in failures {
            self.resolution_failed(node, &key, &error);
        }

        let mut succeeded = Vec::new();
        for target in &targets {
            match exec.effects.invoke(&effect_type, &params, target, &self.ctx) {
                Ok(()) => succeeded.push(target.name.clone()),
                Err(e) => {
                    warn!(node = %node.id, effect = %effect_type, error = %e, "effect failed");
                    self.note(format!("Effect ({}): {}", node.id, e));
                }
            }
        }

        self.record.effect_count += succeeded.len();
        self.store_effect_result(node, !succeeded.is_empty());
        let detail = if targets.is_empty() {
            format!("{} ({}: no target)", effect_type, selector)
        } else {
            format!("{} on {}", effect_type, succeeded.iter().join(", "))
        };
        self.trace(node, &detail, Some(PORT_NEXT));
        Step::Follow(PORT_NEXT)
    }

    fn store_effect_result(&mut self, node: &FlowNode, success: bool) {
        if let Some(var) = node.text_param("storeAs").filter(|v| !v.is_empty()) {
            self.ctx.set_variable(var, if success { 1.0 } else { 0.0 });
        }
    }

    /// `@Self`, `@Victim` / `@Target` (the current target), and
    /// `@Nearby:<r>`, `@NearbyPlayers:<r>`, `@NearbyHostiles:<r>`.
    fn select_targets(&mut self, node: &FlowNode, selector: &str) -> Vec<Entity> {
        let (name, arg) = match selector.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (selector.trim(), None),
        };
        match name.to_lowercase().as_str() {
            "" | "@self" | "@player" => vec![self.ctx.player.clone()],
            "@victim" | "@target" => self.ctx.target.iter().cloned().collect(),
            "@nearby" | "@nearbyplayers" | "@nearbyhostiles" => {
                let radius = arg.and_then(|r| r.parse::<f64>().ok()).unwrap_or(5.0);
                let me = self.ctx.player.id;
                self.exec
                    .world
                    .nearby_entities(&self.ctx.player.position, radius)
                    .into_iter()
                    .filter(|e| e.id != me)
                    .filter(|e| match name.to_lowercase().as_str() {
                        "@nearbyplayers" => e.kind == EntityKind::Player,
                        "@nearbyhostiles" => e.kind == EntityKind::Hostile,
                        _ => true,
                    })
                    .collect()
            }
            _ => {
                self.note(format!("Effect ({}): unknown target selector '{}'", node.id, selector));
                Vec::new()
            }
        }
    }

    /// Local predicates first, then the condition registry. Errors read as false.
    fn evaluate_predicate(&mut self, node: &FlowNode, predicate: &str) -> bool {
        let exec = self.exec;
        let roll = move || exec.roll();
        let local = ParameterResolver::new(&self.ctx).with_roll(&roll).evaluate_local(predicate);
        match local {
            Ok(Some(result)) => result,
            Ok(None) => match exec.conditions().evaluate(predicate, &self.ctx) {
                Ok(result) => result,
                Err(e) => {
                    warn!(node = %node.id, predicate, error = %e, "condition failed");
                    self.note(format!("{} ({}): {}", node.kind, node.id, e));
                    false
                }
            },
            Err(e) => {
                self.resolution_failed(node, "condition", &e);
                false
            }
        }
    }

    fn visit_delay(&mut self, graph: &FlowGraph, node: &FlowNode) -> Step {
        let duration = self.number(node, "duration", 1.0).max(0.0);
        if self.ctx.is_dry_run() {
            self.trace(node, &format!("{}s (skipped in dry run)", format_number(duration)), Some(PORT_NEXT));
            return Step::Follow(PORT_NEXT);
        }

        let Some(resume_at) = graph.target(&node.id, PORT_NEXT) else {
            return Step::Stop;
        };
        if self.delay_depth + 1 > self.exec.limits.max_delay_depth {
            self.note(format!(
                "Delay ({}): more than {} chained delays, stopping",
                node.id, self.exec.limits.max_delay_depth
            ));
            return Step::Stop;
        }
        let Some(scheduler) = self.exec.scheduler.clone() else {
            self.note(format!("Delay ({}): no scheduler configured, stopping", node.id));
            return Step::Stop;
        };

        let key = SuspensionKey {
            player: self.ctx.player.id,
            sigil_id: self.ctx.sigil_id().unwrap_or_default().to_string(),
            flow_id: graph.id.clone(),
        };
        let Some(permit) = self
            .exec
            .suspensions
            .acquire(key, self.exec.limits.max_suspended_per_flow)
        else {
            warn!(flow = %graph.id, node = %node.id, "suspension cap reached, dropping delayed remainder");
            self.note(format!(
                "Delay ({}): {} delayed executions already pending, stopping",
                node.id, self.exec.limits.max_suspended_per_flow
            ));
            return Step::Stop;
        };

        scheduler.schedule(
            duration,
            Continuation {
                graph: Arc::clone(&self.graph),
                node_id: resume_at.to_string(),
                ctx: self.ctx.clone(),
                depth: self.delay_depth + 1,
                permit,
            },
        );
        self.record.suspended += 1;
        debug!(flow = %graph.id, node = %node.id, duration, "walk suspended");
        Step::Suspend
    }

    fn visit_loop(&mut self, graph: &FlowGraph, node: &FlowNode) -> Step {
        let mode = crate::graph::loop_mode(node).unwrap_or(LoopMode::Count);
        let body = graph.target(&node.id, PORT_NEXT).map(str::to_string);
        let limits = self.exec.limits;

        let ceiling = match mode {
            LoopMode::Count => {
                let count = self.number(node, "count", 0.0).max(0.0) as usize;
                if count > limits.max_loop_count {
                    self.note(format!(
                        "Loop ({}): count {} clamped to {}",
                        node.id, count, limits.max_loop_count
                    ));
                }
                count.min(limits.max_loop_count)
            }
            LoopMode::While => limits.max_while_iterations,
        };
        let predicate = node.text_param("condition").unwrap_or_default();

        let mut iteration = 0;
        loop {
            let proceed = if iteration >= ceiling {
                if mode == LoopMode::While {
                    warn!(node = %node.id, limit = ceiling, "while loop hit its iteration ceiling");
                    self.note(format!("Loop ({}): stopped after {} iterations", node.id, ceiling));
                }
                false
            } else {
                mode == LoopMode::Count || self.evaluate_predicate(node, &predicate)
            };
            if !proceed {
                break;
            }
            iteration += 1;
            self.ctx.set_variable("iteration", iteration as f64);

            let Some(body) = body.as_deref() else {
                continue;
            };
            if self.run_path(body) == PathEnd::Halted {
                return Step::Halt;
            }
        }

        self.trace(node, &format!("{} iteration(s)", iteration), None);
        Step::Stop
    }

    fn visit_random(&mut self, node: &FlowNode) -> Step {
        let paths = node.path_count();
        let mut weights: Vec<f64> = (1..=paths)
            .map(|i| self.number(node, &format!("weight{}", i), 1.0).max(0.0))
            .collect();
        let mut total: f64 = weights.iter().sum();
        if total <= 0.0 {
            self.note(format!("Random ({}): all weights are zero, using equal weights", node.id));
            weights = vec![1.0; paths];
            total = paths as f64;
        }

        let roll = self.exec.roll() * total;
        let mut cumulative = 0.0;
        let mut chosen = paths - 1;
        for (i, weight) in weights.iter().enumerate() {
            cumulative += weight;
            if roll < cumulative {
                chosen = i;
                break;
            }
        }
        let port = RANDOM_PORTS[chosen];
        self.trace(node, &format!("rolled {:.2} of {}", roll, format_number(total)), Some(port));
        Step::Follow(port)
    }

    fn visit_variable(&mut self, node: &FlowNode) -> Step {
        let name = self.text(node, "name", "");
        if name.is_empty() {
            self.note(format!("Variable ({}): no variable name", node.id));
            return Step::Follow(PORT_NEXT);
        }
        let op = self
            .text(node, "operation", "SET")
            .parse::<VariableOp>()
            .unwrap_or(VariableOp::Set);
        let value = self.resolve(node, "value").unwrap_or(Scalar::Number(0.0));

        let updated = if op == VariableOp::Set {
            value
        } else {
            let current = self.ctx.variable_number(&name);
            let operand = value.as_number().unwrap_or_else(|| {
                self.note(format!("Variable ({}): '{}' is not a number", node.id, value));
                0.0
            });
            Scalar::Number(match op {
                VariableOp::Add => current + operand,
                VariableOp::Subtract => current - operand,
                VariableOp::Multiply => current * operand,
                VariableOp::Divide if operand == 0.0 => current,
                VariableOp::Divide => current / operand,
                VariableOp::Set => operand,
            })
        };
        self.trace(node, &format!("{} {} -> {}", op, name, updated), Some(PORT_NEXT));
        self.ctx.set_variable(name, updated);
        Step::Follow(PORT_NEXT)
    }

    fn visit_target(&mut self, node: &FlowNode) -> Step {
        let target_type = self
            .text(node, "targetType", "SELF")
            .parse::<TargetType>()
            .unwrap_or(TargetType::Caster);
        let range = self.number(node, "range", 10.0).max(0.0);

        let player = &self.ctx.player;
        let candidates = || {
            self.exec
                .world
                .nearby_entities(&player.position, range)
                .into_iter()
                .filter(move |e| e.id != player.id)
        };
        let nearest = |entities: Vec<Entity>| {
            entities.into_iter().min_by(|a, b| {
                a.position
                    .distance(&player.position)
                    .total_cmp(&b.position.distance(&player.position))
            })
        };

        let selected = match target_type {
            TargetType::Caster => Some(player.clone()),
            TargetType::Victim => self.ctx.victim.clone(),
            TargetType::NearestPlayer => nearest(candidates().filter(Entity::is_player).collect()),
            TargetType::NearestHostile => nearest(candidates().filter(|e| e.kind == EntityKind::Hostile).collect()),
            TargetType::NearestEntity => nearest(candidates().collect()),
            TargetType::RandomPlayer => {
                let players: Vec<Entity> = candidates().filter(Entity::is_player).collect();
                if players.is_empty() {
                    None
                } else {
                    let index = self.exec.rng.lock().random_range(0..players.len());
                    players.into_iter().nth(index)
                }
            }
        };

        let detail = match &selected {
            Some(entity) => format!("{} -> {}", target_type, entity.name),
            None => format!("{} -> none", target_type),
        };
        self.ctx.target = selected;
        self.trace(node, &detail, Some(PORT_NEXT));
        Step::Follow(PORT_NEXT)
    }

    fn visit_math(&mut self, node: &FlowNode) -> Step {
        let op = self
            .text(node, "operation", "ADD")
            .parse::<MathOp>()
            .unwrap_or(MathOp::Add);
        let left = self.number(node, "left", 0.0);
        let right = self.number(node, "right", 0.0);
        let result = match op {
            MathOp::Add => left + right,
            MathOp::Subtract => left - right,
            MathOp::Multiply => left * right,
            MathOp::Divide if right == 0.0 => 0.0,
            MathOp::Divide => left / right,
            MathOp::Modulo if right == 0.0 => 0.0,
            MathOp::Modulo => left % right,
            MathOp::Min => left.min(right),
            MathOp::Max => left.max(right),
            MathOp::Abs => left.abs(),
            MathOp::Round => left.round(),
            MathOp::Floor => left.floor(),
            MathOp::Ceil => left.ceil(),
            MathOp::Random => left + self.exec.roll() * (right - left),
            MathOp::Power => left.powf(right),
            MathOp::Sqrt => left.sqrt(),
        };
        let result = if result.is_finite() { result } else { 0.0 };
        let var = self.text(node, "result", "result");

        self.trace(
            node,
            &format!(
                "${} = {} {} {} = {}",
                var,
                format_number(left),
                op.symbol(),
                format_number(right),
                format_number(result)
            ),
            Some(PORT_NEXT),
        );
        self.ctx.set_variable(var, result);
        Step::Follow(PORT_NEXT)
    }

    fn resolve(&mut self, node: &FlowNode, key: &str) -> Option<Scalar> {
        let exec = self.exec;
        let roll = move || exec.roll();
        let result = ParameterResolver::new(&self.ctx).with_roll(&roll).resolve(node, key);
        match result {
            Ok(scalar) => Some(scalar),
            Err(ResolutionError::MissingParameter(_)) => None,
            Err(e) => {
                self.resolution_failed(node, key, &e);
                None
            }
        }
    }

    fn number(&mut self, node: &FlowNode, key: &str, default: f64) -> f64 {
        match self.resolve(node, key) {
            Some(scalar) => match scalar.as_number() {
                Some(n) => n,
                None => {
                    self.resolution_failed(node, key, &ResolutionError::NotANumber(scalar.to_string()));
                    default
                }
            },
            None => default,
        }
    }

    fn text(&mut self, node: &FlowNode, key: &str, default: &str) -> String {
        self.resolve(node, key)
            .map(|s| s.to_string())
            .unwrap_or_else(|| default.to_string())
    }

    fn resolution_failed(&mut self, node: &FlowNode, key: &str, error: &ResolutionError) {
        warn!(node = %node.id, key, error = %error, "parameter resolution failed, using default");
        self.note(format!("{} ({}): parameter '{}': {}", node.kind, node.id, key, error));
    }

    fn note(&mut self, diagnostic: String) {
        self.record.diagnostics.push(diagnostic);
    }

    fn trace(&mut self, node: &FlowNode, detail: &str, port: Option<&str>) {
        if !self.ctx.is_dry_run() {
            return;
        }
        self.record.trace.push(TraceEntry {
            step: self.record.steps,
            node_id: node.id.clone(),
            kind: node.kind,
            detail: detail.to_string(),
            port: port.map(str::to_string),
        });
    }
}
