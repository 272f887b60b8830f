//! Flow execution: node semantics, loops, randomness, budgets and delays.
mod common;
use common::*;
use sigilflow::executor::ExecutorLimits;
use sigilflow::prelude::*;
use std::sync::Arc;

fn run(executor: &FlowExecutor, graph: FlowGraph, ctx: ExecutionContext) -> ExecutionRecord {
    executor.execute(&Arc::new(graph), ctx)
}

#[cfg(test)]
mod executor_tests {
    use super::*;

    #[test]
    fn test_heal_runs_only_when_health_is_low() {
        let effects = RecordingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = Arc::new(heal_when_low_graph());

        let healthy = executor.execute(&graph, ExecutionContext::new(player()));
        assert!(!healthy.effects_executed);
        assert_eq!(effects.total(), 0);

        let wounded = executor.execute(&graph, ExecutionContext::new(player().with_health(4.0, 20.0)));
        assert!(wounded.effects_executed);
        assert_eq!(wounded.outcome, WalkOutcome::Completed);
        let calls = effects.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].effect, "HEAL");
        assert_eq!(calls[0].target, "Alex");
        assert_eq!(calls[0].params.get("amount"), Some(&Scalar::Number(5.0)));
    }

    #[test]
    fn test_condition_registry_errors_take_the_no_branch() {
        let effects = RecordingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("check", NodeKind::Condition)
            .param("condition", "NOT_A_REAL_CONDITION")
            .node("yes", NodeKind::Effect)
            .param("effectType", "YES")
            .node("no", NodeKind::Effect)
            .param("effectType", "NO")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "check")
            .connect("check", PORT_YES, "yes")
            .connect("check", PORT_NO, "no")
            .connect("yes", PORT_NEXT, "end")
            .connect("no", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let record = run(&executor, graph, ExecutionContext::new(player()));
        assert_eq!(effects.names(), vec!["NO"]);
        assert_eq!(record.diagnostics.len(), 1);
    }

    #[test]
    fn test_failing_effect_is_recovered() {
        let effects = RecordingEffects::new();
        effects.fail("BROKEN");
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("broken", NodeKind::Effect)
            .param("effectType", "BROKEN")
            .node("after", NodeKind::Effect)
            .param("effectType", "AFTER")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "broken")
            .connect("broken", PORT_NEXT, "after")
            .connect("after", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let record = run(&executor, graph, ExecutionContext::new(player()));
        assert_eq!(record.outcome, WalkOutcome::Completed);
        assert_eq!(record.effect_count, 1);
        assert_eq!(effects.names(), vec!["AFTER"]);
        assert!(record.diagnostics.iter().any(|d| d.contains("BROKEN")));
    }

    #[test]
    fn test_invalid_graph_is_not_executed() {
        let effects = RecordingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("fx", NodeKind::Effect)
            .param("effectType", "HEAL")
            .node("end", NodeKind::End)
            .connect("fx", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let record = run(&executor, graph, ExecutionContext::new(player()));
        assert_eq!(record.outcome, WalkOutcome::Invalid);
        assert!(!record.diagnostics.is_empty());
        assert_eq!(effects.total(), 0);
    }

    #[test]
    fn test_count_loop_runs_body_each_iteration() {
        let effects = RecordingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("loop", NodeKind::Loop)
            .param("count", 3)
            .node("fx", NodeKind::Effect)
            .param("effectType", "PULSE")
            .param("index", "{iteration}")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "loop")
            .connect("loop", PORT_NEXT, "fx")
            .connect("fx", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let record = run(&executor, graph, ExecutionContext::new(player()));
        assert_eq!(record.effect_count, 3);
        let indices: Vec<f64> = effects
            .calls()
            .iter()
            .filter_map(|c| c.params.get("index").and_then(Scalar::as_number))
            .collect();
        assert_eq!(indices, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_while_loop_terminates_at_ceiling() {
        let effects = RecordingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("loop", NodeKind::Loop)
            .param("mode", "WHILE")
            .param("condition", "true")
            .node("fx", NodeKind::Effect)
            .param("effectType", "PULSE")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "loop")
            .connect("loop", PORT_NEXT, "fx")
            .connect("fx", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let record = run(&executor, graph, ExecutionContext::new(player()));
        assert_eq!(record.outcome, WalkOutcome::Completed);
        assert_eq!(record.effect_count, ExecutorLimits::default().max_while_iterations);
        assert!(!record.diagnostics.is_empty());
    }

    #[test]
    fn test_while_loop_reads_variables() {
        let effects = RecordingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("loop", NodeKind::Loop)
            .param("mode", "WHILE")
            .param("condition", "{$hits} < 4")
            .node("count", NodeKind::Variable)
            .param("name", "hits")
            .param("operation", "ADD")
            .param("value", 1)
            .node("fx", NodeKind::Effect)
            .param("effectType", "PULSE")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "loop")
            .connect("loop", PORT_NEXT, "count")
            .connect("count", PORT_NEXT, "fx")
            .connect("fx", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let ctx = ExecutionContext::new(player()).with_variable("hits", 0.0);
        let record = run(&executor, graph, ctx);
        assert_eq!(record.effect_count, 4);
        assert!(record.diagnostics.is_empty(), "{:?}", record.diagnostics);
    }

    #[test]
    fn test_nested_loops_hit_step_budget() {
        let effects = CountingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("outer", NodeKind::Loop)
            .param("count", 100)
            .node("inner", NodeKind::Loop)
            .param("count", 100)
            .node("fx", NodeKind::Effect)
            .param("effectType", "PULSE")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "outer")
            .connect("outer", PORT_NEXT, "inner")
            .connect("inner", PORT_NEXT, "fx")
            .connect("fx", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let record = run(&executor, graph, ExecutionContext::new(player()));
        assert_eq!(record.outcome, WalkOutcome::BudgetExceeded);
        assert_eq!(record.steps, ExecutorLimits::default().max_steps);
        assert!(record.effects_executed);
        assert!(effects.count("PULSE") < 100 * 100);
    }

    #[test]
    fn test_random_split_follows_weights() {
        let effects = CountingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = Arc::new(
            GraphBuilder::new("g")
                .node("start", NodeKind::Start)
                .node("roll", NodeKind::Random)
                .param("weight1", 70)
                .param("weight2", 30)
                .node("a", NodeKind::Effect)
                .param("effectType", "A")
                .node("b", NodeKind::Effect)
                .param("effectType", "B")
                .node("end", NodeKind::End)
                .connect("start", PORT_NEXT, "roll")
                .connect("roll", "path1", "a")
                .connect("roll", "path2", "b")
                .connect("a", PORT_NEXT, "end")
                .connect("b", PORT_NEXT, "end")
                .build()
                .expect("graph should build"),
        );

        let trials = 100_000;
        for _ in 0..trials {
            executor.execute(&graph, ExecutionContext::new(player()));
        }
        let share = effects.count("A") as f64 / trials as f64;
        println!("path1 share: {:.4}", share);
        assert!((share - 0.7).abs() < 0.02);
        assert_eq!(effects.count("A") + effects.count("B"), trials);
    }

    #[test]
    fn test_variables_and_math() {
        let effects = RecordingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("base", NodeKind::Variable)
            .param("name", "base")
            .param("operation", "SET")
            .param("value", "{damage}")
            .node("double", NodeKind::Math)
            .param("operation", "MULTIPLY")
            .param("left", "{$base}")
            .param("right", 2)
            .param("result", "bonus")
            .node("safe", NodeKind::Math)
            .param("operation", "DIVIDE")
            .param("left", 1)
            .param("right", 0)
            .param("result", "zero")
            .node("fx", NodeKind::Effect)
            .param("effectType", "DAMAGE")
            .param("amount", "{$bonus} + 1")
            .param("zero", "{$zero}")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "base")
            .connect("base", PORT_NEXT, "double")
            .connect("double", PORT_NEXT, "safe")
            .connect("safe", PORT_NEXT, "fx")
            .connect("fx", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let ctx = ExecutionContext::new(player()).with_damage(6.0);
        let record = run(&executor, graph, ctx);
        assert!(record.diagnostics.is_empty(), "{:?}", record.diagnostics);
        let call = &effects.calls()[0];
        assert_eq!(call.params.get("amount"), Some(&Scalar::Number(13.0)));
        assert_eq!(call.params.get("zero"), Some(&Scalar::Number(0.0)));
    }

    #[test]
    fn test_target_node_retargets_effects() {
        let effects = RecordingEffects::new();
        let near = Entity::new(3, EntityKind::Hostile, "Skeleton").at(Position::new(2.0, 0.0, 0.0));
        let far = Entity::new(4, EntityKind::Hostile, "Creeper").at(Position::new(8.0, 0.0, 0.0));
        let world = StaticWorld::new(vec![player(), far, near]);
        let executor = FlowExecutor::builder(effects.clone())
            .with_world(world)
            .with_seed(1)
            .build();
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("aim", NodeKind::Target)
            .param("targetType", "NEAREST_HOSTILE")
            .param("range", 10)
            .node("fx", NodeKind::Effect)
            .param("effectType", "IGNITE")
            .param("target", "@Target")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "aim")
            .connect("aim", PORT_NEXT, "fx")
            .connect("fx", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        run(&executor, graph, ExecutionContext::new(player()).with_victim(zombie()));
        assert_eq!(effects.calls()[0].target, "Skeleton");
    }

    #[test]
    fn test_effect_chance_and_store_as() {
        let effects = RecordingEffects::new();
        let executor = executor_with(effects.clone(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("never", NodeKind::Effect)
            .param("effectType", "NEVER")
            .param("chance", 0)
            .param("storeAs", "landed")
            .node("report", NodeKind::Effect)
            .param("effectType", "REPORT")
            .param("landed", "{$landed}")
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "never")
            .connect("never", PORT_NEXT, "report")
            .connect("report", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        run(&executor, graph, ExecutionContext::new(player()));
        assert_eq!(effects.names(), vec!["REPORT"]);
        assert_eq!(effects.calls()[0].params.get("landed"), Some(&Scalar::Number(0.0)));
    }

    #[test]
    fn test_skip_cooldown_is_recorded() {
        let executor = executor_with(RecordingEffects::new(), ScriptedConditions::new());
        let graph = GraphBuilder::new("g")
            .node("start", NodeKind::Start)
            .node("skip", NodeKind::SkipCooldown)
            .node("end", NodeKind::End)
            .connect("start", PORT_NEXT, "skip")
            .connect("skip", PORT_NEXT, "end")
            .build()
            .expect("graph should build");

        let record = run(&executor, graph, ExecutionContext::new(player()));
        assert!(record.skip_cooldown);
        assert!(!record.effects_executed);
    }

    fn delayed_graph() -> Arc<FlowGraph> {
        Arc::new(
            GraphBuilder::new("delayed")
                .node("start", NodeKind::Start)
                .node("first", NodeKind::Effect)
                .param("effectType", "FIRST")
                .node("wait", NodeKind::Delay)
                .param("duration", 2)
                .node("second", NodeKind::Effect)
                .param("effectType", "SECOND")
                .node("end", NodeKind::End)
                .connect("start", PORT_NEXT, "first")
                .connect("first", PORT_NEXT, "wait")
                .connect("wait", PORT_NEXT, "second")
                .connect("second", PORT_NEXT, "end")
                .build()
                .expect("graph should build"),
        )
    }

    #[test]
    fn test_delay_suspends_and_resumes() {
        let effects = RecordingEffects::new();
        let scheduler = Arc::new(TickScheduler::new());
        let executor = FlowExecutor::builder(effects.clone())
            .with_scheduler(scheduler.clone())
            .with_seed(3)
            .build();

        let record = executor.execute(&delayed_graph(), ExecutionContext::new(player()));
        assert_eq!(record.outcome, WalkOutcome::Suspended);
        assert_eq!(record.suspended, 1);
        assert_eq!(effects.names(), vec!["FIRST"]);
        assert_eq!(scheduler.pending(), 1);

        assert!(scheduler.run_due(&executor, 1.0).is_empty());
        let resumed = scheduler.run_due(&executor, 1.5);
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].outcome, WalkOutcome::Completed);
        assert_eq!(effects.names(), vec!["FIRST", "SECOND"]);
        assert_eq!(executor.pending_suspensions(EntityId(1), "", "delayed"), 0);
    }

    #[test]
    fn test_suspensions_are_capped_per_flow() {
        let effects = RecordingEffects::new();
        let scheduler = Arc::new(TickScheduler::new());
        let executor = FlowExecutor::builder(effects.clone())
            .with_scheduler(scheduler.clone())
            .build();
        let graph = delayed_graph();
        let cap = executor.limits().max_suspended_per_flow;

        let records: Vec<ExecutionRecord> = (0..cap + 2)
            .map(|_| executor.execute(&graph, ExecutionContext::new(player())))
            .collect();
        let suspended = records.iter().filter(|r| r.outcome == WalkOutcome::Suspended).count();
        assert_eq!(suspended, cap);
        assert_eq!(scheduler.pending(), cap);
        assert_eq!(executor.pending_suspensions(EntityId(1), "", "delayed"), cap);

        scheduler.run_due(&executor, 5.0);
        assert_eq!(executor.pending_suspensions(EntityId(1), "", "delayed"), 0);
        assert_eq!(effects.count("SECOND"), cap);
    }

    #[test]
    fn test_continuation_is_dropped_when_player_leaves() {
        let effects = RecordingEffects::new();
        let scheduler = Arc::new(TickScheduler::new());
        let world = StaticWorld::new(Vec::new());
        let executor = FlowExecutor::builder(effects.clone())
            .with_scheduler(scheduler.clone())
            .with_world(world.clone())
            .build();

        executor.execute(&delayed_graph(), ExecutionContext::new(player()));
        world.set_online(false);
        let resumed = scheduler.run_due(&executor, 2.0);
        assert_eq!(resumed[0].outcome, WalkOutcome::Abandoned);
        assert_eq!(effects.names(), vec!["FIRST"]);
    }

    #[test]
    fn test_dry_run_skips_delays_and_traces() {
        let effects = RecordingEffects::new();
        let executor = FlowExecutor::builder(effects.clone()).build();

        let record = executor.execute(&delayed_graph(), ExecutionContext::new(player()).dry_run());
        assert_eq!(record.outcome, WalkOutcome::Completed);
        assert_eq!(effects.names(), vec!["FIRST", "SECOND"]);
        assert_eq!(record.trace.len(), 5);

        let text = TraceFormatter::format_record(&record);
        println!("{}", text);
        assert!(text.contains("Delay (wait)"));
        assert!(text.ends_with("completed after 5 steps, 2 effect(s)"));
    }
}
