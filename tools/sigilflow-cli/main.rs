use ahash::AHashMap;
use clap::{Parser, Subcommand};
use sigilflow::error::EffectError;
use sigilflow::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Sigil content tooling: validate, inspect, simulate and pack sigil definitions
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert and validate every flow in a sigil JSON file
    Validate {
        /// Path to a sigil definition (or a list of them)
        path: String,
    },
    /// Print each flow as a tree
    Inspect { path: String },
    /// Dispatch one signal against a sigil and print a dry-run trace per flow
    Simulate {
        path: String,
        /// Sigil id, required when the file holds more than one sigil
        #[arg(long)]
        sigil: Option<String>,
        #[arg(long, default_value = "ATTACK")]
        signal: String,
        #[arg(long, default_value_t = 1)]
        tier: u32,
        /// Player health for the simulated event
        #[arg(long, default_value_t = 20.0)]
        health: f64,
        /// Damage carried by the event
        #[arg(long, default_value_t = 5.0)]
        damage: f64,
        /// Seed for chance rolls and random nodes
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Convert sigil definitions into a binary bundle
    Pack {
        path: String,
        #[arg(short, long, default_value = "sigils.bin")]
        output: String,
    },
}

/// Prints each effect instead of applying it.
struct PrintingEffects;

impl EffectRegistry for PrintingEffects {
    fn invoke(
        &self,
        effect_type: &str,
        params: &AHashMap<String, Scalar>,
        target: &Entity,
        _ctx: &ExecutionContext,
    ) -> std::result::Result<(), EffectError> {
        let mut shown: Vec<String> = params
            .iter()
            .filter(|(k, _)| k.as_str() != "effectType")
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        shown.sort();
        println!("    * {} -> {} [{}]", effect_type, target.name, shown.join(", "));
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { path } => run_validate(&path),
        Command::Inspect { path } => run_inspect(&path),
        Command::Simulate {
            path,
            sigil,
            signal,
            tier,
            health,
            damage,
            seed,
        } => run_simulate(&path, sigil.as_deref(), &signal, tier, health, damage, seed),
        Command::Pack { path, output } => run_pack(&path, &output),
    }
}

fn load_sigils(path: &str) -> Vec<Sigil> {
    let json = std::fs::read_to_string(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to read '{}': {}", path, e)));
    let definitions = SigilDefinition::list_from_json_str(&json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse '{}': {}", path, e)));
    definitions
        .into_iter()
        .map(|def| {
            let id = def.id.clone();
            def.into_sigil()
                .unwrap_or_else(|e| exit_with_error(&format!("Sigil '{}' failed to convert: {}", id, e)))
        })
        .collect()
}

fn run_validate(path: &str) {
    let sigils = load_sigils(path);
    let mut problems = 0;
    for sigil in &sigils {
        println!("{} (max tier {})", sigil.id, sigil.max_tier);
        for flow in &sigil.flows {
            let errors = flow.validate();
            if errors.is_empty() {
                println!("  ok   {} ({} nodes)", flow.id(), flow.graph.node_count());
            } else {
                println!("  FAIL {}", flow.id());
                for error in &errors {
                    println!("         - {}", error);
                }
                problems += errors.len();
            }
        }
    }
    if problems > 0 {
        exit_with_error(&format!("{} problem(s) found", problems));
    }
}

fn run_inspect(path: &str) {
    for sigil in load_sigils(path) {
        println!("=== {} ({}) ===", sigil.name, sigil.id);
        for key in sigil.tier_scaling.keys() {
            let values = sigil.tier_scaling.values(key).unwrap_or_default();
            println!("  {:<12} {:?}", key, values);
        }
        for flow in &sigil.flows {
            let trigger = flow.trigger.as_ref().map_or("ABILITY".to_string(), |s| s.to_string());
            println!(
                "\n[{}] {} chance={} cooldown={} priority={}",
                trigger,
                flow.id(),
                flow.chance,
                flow.cooldown,
                flow.priority
            );
            println!("{}", GraphDisplay::new(&flow.graph));
        }
    }
}

fn run_simulate(
    path: &str,
    sigil_id: Option<&str>,
    signal: &str,
    tier: u32,
    health: f64,
    damage: f64,
    seed: Option<u64>,
) {
    let sigils = load_sigils(path);
    let sigil = match sigil_id {
        Some(id) => sigils.into_iter().find(|s| s.id == id),
        None if sigils.len() == 1 => sigils.into_iter().next(),
        None => exit_with_error("File holds several sigils, pick one with --sigil"),
    }
    .unwrap_or_else(|| exit_with_error("Sigil not found"));
    let sigil = Arc::new(sigil);
    let signal = Signal::parse(signal);

    let mut executor = FlowExecutor::builder(Arc::new(PrintingEffects));
    let mut dispatcher_seed = None;
    if let Some(seed) = seed {
        executor = executor.with_seed(seed);
        dispatcher_seed = Some(seed.wrapping_add(1));
    }
    let executor = Arc::new(executor.build());
    let mut dispatcher = SignalDispatcher::builder(Arc::clone(&executor));
    if let Some(seed) = dispatcher_seed {
        dispatcher = dispatcher.with_seed(seed);
    }
    let dispatcher = dispatcher.build();

    let player = Entity::player(1, "Player").with_health(health, 20.0);
    let victim = Entity::new(2, EntityKind::Hostile, "Dummy").at(Position::new(2.0, 0.0, 0.0));
    let event = SignalEvent::new(signal.clone(), player)
        .with_victim(victim)
        .with_damage(damage);
    let loadout = Loadout::new().with_main_hand(Item::new("simulated").with_sigil(Arc::clone(&sigil), tier));

    println!("--- Dry run: {} on {} (tier {}) ---", signal, sigil.id, tier);
    for flow in sigil.flows_for(&signal) {
        let ctx = ExecutionContext::for_event(&event)
            .with_source(Arc::clone(&sigil), tier, None)
            .dry_run();
        println!("\n{}:", flow.id());
        let record = executor.execute(&flow.graph, ctx);
        println!("{}", TraceFormatter::format_record(&record));
    }

    println!("\n--- Dispatch ---");
    let start = Instant::now();
    let report = dispatcher.dispatch(&event, &loadout);
    let elapsed = start.elapsed();
    for attempt in &report.attempts {
        let outcome = match &attempt.outcome {
            AttemptOutcome::Activated(record) => format!("activated, {} effect(s)", record.effect_count),
            AttemptOutcome::NoEffect(_) => "ran, no effect".to_string(),
            AttemptOutcome::OnCooldown { remaining } => format!("on cooldown ({:.1}s)", remaining),
            AttemptOutcome::ChanceFailed { chance } => format!("chance roll failed ({}%)", chance),
            AttemptOutcome::ConditionsFailed => "conditions failed".to_string(),
        };
        println!("  {} (priority {}): {}", attempt.flow_id, attempt.priority, outcome);
    }
    println!(
        "{} of {} candidate(s) activated in {:?} ({})",
        report.activation_count(),
        report.candidates,
        elapsed,
        if report.passive { "passive" } else { "active" }
    );
}

fn run_pack(path: &str, output: &str) {
    let start = Instant::now();
    let bundle = SigilBundle::new(load_sigils(path));
    bundle
        .save(output)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to write bundle: {}", e)));
    println!(
        "Packed {} sigil(s) into '{}' in {:?}",
        bundle.sigils.len(),
        output,
        start.elapsed()
    );
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
