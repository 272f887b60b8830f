//! Integration tests for sigilflow
//!
//! End-to-end: content JSON to runtime sigils, binary bundles, and dispatch.
//!
mod common;
use common::*;
use sigilflow::error::{FlowConversionError, PersistError};
use sigilflow::prelude::*;
use std::fs;
use std::sync::Arc;

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn load() -> Sigil {
        SigilDefinition::from_json_str(SIGIL_JSON)
            .expect("sigil JSON should parse")
            .into_sigil()
            .expect("sigil should convert")
    }

    #[test]
    fn test_json_definition_converts() {
        let sigil = load();
        assert_eq!(sigil.id, "vampiric");
        assert_eq!(sigil.name, "Vampiric");
        assert_eq!(sigil.max_tier, 3);
        assert_eq!(sigil.tier_scaling.value("heal", 2), Some(4.0));
        assert_eq!(sigil.flows.len(), 2);

        let drain = sigil.flow("drain").expect("drain flow");
        assert_eq!(drain.trigger, Some(Signal::Attack));
        assert_eq!(drain.priority, 3);
        assert!(drain.is_valid(), "{:?}", drain.validate());
        assert_eq!(drain.graph.target("check", PORT_YES), Some("heal"));
        assert_eq!(
            drain.graph.node("heal").and_then(|n| n.param("effectType")),
            Some(&Value::Text("HEAL".to_string()))
        );

        let burst = sigil.ability().expect("ability flow");
        assert_eq!(burst.id(), "burst");
        assert_eq!(burst.cooldown, 30.0);
        assert!(burst.is_valid(), "{:?}", burst.validate());
    }

    #[test]
    fn test_unknown_node_type_is_rejected() {
        let json = r#"{
            "id": "bad",
            "flows": [{ "trigger": "ATTACK", "nodes": [{ "id": "x", "type": "TELEPORT" }] }]
        }"#;
        let result = SigilDefinition::from_json_str(json)
            .expect("JSON is well formed")
            .into_sigil();
        assert!(matches!(result, Err(FlowConversionError::UnknownNodeType { .. })));
    }

    #[test]
    fn test_definition_round_trip() {
        let sigil = load();
        let json = SigilDefinition::from(&sigil).to_json_pretty().expect("serialize");
        let again = SigilDefinition::from_json_str(&json)
            .expect("parse")
            .into_sigil()
            .expect("convert");
        assert_eq!(sigil, again);
    }

    #[test]
    fn test_bundle_save_and_load() {
        let bundle = SigilBundle::from_definitions(
            SigilDefinition::list_from_json_str(&format!("[{}]", SIGIL_JSON)).expect("list parses"),
        )
        .expect("bundle converts");

        let path = std::env::temp_dir().join("sigilflow_bundle_test.bin");
        let path = path.to_str().expect("utf-8 temp path");
        bundle.save(path).expect("save bundle");
        let loaded = SigilBundle::from_file(path).expect("load bundle");
        fs::remove_file(path).ok();

        assert_eq!(bundle, loaded);
        assert!(loaded.get("vampiric").is_some());
    }

    #[test]
    fn test_corrupt_bundle_is_an_error() {
        let result = SigilBundle::from_bytes(&[0xff, 0x01, 0x02]);
        assert!(matches!(result, Err(PersistError::Decode(_))));
        assert!(matches!(
            SigilBundle::from_file("/nonexistent/bundle.bin"),
            Err(PersistError::Io { .. })
        ));
    }

    #[test]
    fn test_loaded_sigil_dispatches_with_tier_values() {
        let effects = RecordingEffects::new();
        let conditions = ScriptedConditions::new();
        let clock = Arc::new(ManualClock::new(0.0));
        let executor = Arc::new(executor_with(effects.clone(), conditions));
        let dispatcher = SignalDispatcher::builder(executor)
            .with_clock(clock.clone())
            .with_seed(5)
            .build();
        let loadout = loadout_with(load(), 2);
        let event = SignalEvent::new(Signal::Attack, player()).with_victim(zombie());

        let report = dispatcher.dispatch(&event, &loadout);
        assert!(report.any_activated());
        let calls = effects.calls();
        assert_eq!(calls[0].effect, "HEAL");
        assert_eq!(calls[0].target, "Alex");
        assert_eq!(calls[0].params.get("amount"), Some(&Scalar::Number(4.0)));

        // Tier 2 cooldown is 8 seconds.
        clock.advance(7.0);
        assert!(!dispatcher.dispatch(&event, &loadout).any_activated());
        clock.advance(1.0);
        assert!(dispatcher.dispatch(&event, &loadout).any_activated());

        let ability = dispatcher
            .activate_ability(&player(), &loadout, "vampiric")
            .expect("sigil equipped");
        assert!(ability.activated());
        assert_eq!(effects.count("BURST"), 1);
    }

    #[test]
    fn test_dry_run_trace_of_loaded_flow() {
        let sigil = load();
        let drain = sigil.flow("drain").expect("drain flow");
        let executor = executor_with(RecordingEffects::new(), ScriptedConditions::new());
        let ctx = ExecutionContext::new(player())
            .with_victim(zombie())
            .with_source(Arc::new(sigil.clone()), 3, None)
            .dry_run();

        let record = executor.execute(&drain.graph, ctx);
        let text = TraceFormatter::format_record(&record);
        println!("{}", text);
        assert!(text.contains("Condition (check): HAS_VICTIM -> yes"));
        assert!(text.contains("HEAL on Alex"));
    }
}
