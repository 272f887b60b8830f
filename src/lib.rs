//! # Sigilflow - Flow Graph Effect Engine
//!
//! **Sigilflow** runs the node graphs that give socketed sigils their behaviour.
//! A graph is a small state machine of Start, Effect, Condition, Delay, Loop,
//! Random, Variable, Target, Math, SkipCooldown and End nodes. A game event
//! selects which graphs run; the executor walks them, calling out to
//! host-provided effect and condition registries.
//!
//! ## Core Workflow
//!
//! 1.  **Author or load flows**: Build a `FlowGraph` with `GraphBuilder`, or parse
//!     a JSON `SigilDefinition` and convert it with `into_sigil` (any custom format
//!     can implement `IntoFlow`).
//! 2.  **Wire collaborators**: Implement `EffectRegistry` (and optionally
//!     `ConditionRegistry`, `World`, `Scheduler`, `ProgressionService`) and hand
//!     them to `FlowExecutor::builder`.
//! 3.  **Dispatch events**: Build a `SignalDispatcher` over the executor and call
//!     `dispatch` with each `SignalEvent` and the player's equipped `Loadout`.
//!     It applies priority, cooldown, chance and conditions, then runs the winners.
//! 4.  **Inspect**: Every run returns an `ExecutionRecord`; dry-run contexts add a
//!     step trace that `TraceFormatter` renders.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sigilflow::prelude::*;
//! use std::sync::Arc;
//!
//! struct LogEffects;
//!
//! impl EffectRegistry for LogEffects {
//!     fn invoke(
//!         &self,
//!         effect_type: &str,
//!         params: &ahash::AHashMap<String, Scalar>,
//!         target: &Entity,
//!         _ctx: &ExecutionContext,
//!     ) -> std::result::Result<(), EffectError> {
//!         println!("{} on {} with {:?}", effect_type, target.name, params);
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     // 1. A flow that heals the attacker by a tier-scaled amount.
//!     let graph = GraphBuilder::new("lifesteal")
//!         .node("start", NodeKind::Start)
//!         .node("heal", NodeKind::Effect)
//!         .param("effectType", "HEAL")
//!         .param("amount", "{heal}")
//!         .node("end", NodeKind::End)
//!         .connect("start", PORT_NEXT, "heal")
//!         .connect("heal", PORT_NEXT, "end")
//!         .build()?;
//!
//!     let mut tiers = TierScalingConfig::new(3);
//!     tiers.set_values("heal", vec![1.0, 2.0, 4.0])?;
//!     let sigil = Arc::new(
//!         Sigil::new("lifesteal", 3)
//!             .with_tier_scaling(tiers)
//!             .with_flow(FlowConfig::signal(Signal::Attack, graph).with_cooldown(2.0)),
//!     );
//!
//!     // 2. Executor and dispatcher.
//!     let executor = Arc::new(FlowExecutor::builder(Arc::new(LogEffects)).build());
//!     let dispatcher = SignalDispatcher::builder(executor).build();
//!
//!     // 3. One attack event from a player wielding the sigil at tier 2.
//!     let loadout = Loadout::new().with_main_hand(Item::new("sword").with_sigil(sigil, 2));
//!     let event = SignalEvent::new(Signal::Attack, Entity::player(1, "Alex"))
//!         .with_victim(Entity::new(2, EntityKind::Hostile, "Zombie"));
//!     let report = dispatcher.dispatch(&event, &loadout);
//!
//!     println!("activated {} flow(s)", report.activation_count());
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod flow;
pub mod graph;
pub mod node;
pub mod prelude;
pub mod registry;
pub mod resolver;
pub mod sigil;
pub mod tier;
