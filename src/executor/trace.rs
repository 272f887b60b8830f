use super::{ExecutionRecord, WalkOutcome};
use crate::node::NodeKind;
use serde::{Deserialize, Serialize};

/// One visited node in a dry-run walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: usize,
    pub node_id: String,
    pub kind: NodeKind,
    /// What the node did, e.g. `HEAL on Alex` or `roll 0.42`.
    pub detail: String,
    /// The port the walk left through, if any.
    pub port: Option<String>,
}

/// Formats execution records into human-readable text.
pub struct TraceFormatter;

impl TraceFormatter {
    /// One line per traced step followed by a summary line.
    pub fn format_record(record: &ExecutionRecord) -> String {
        let mut out = String::new();
        for entry in &record.trace {
            out.push_str(&Self::format_entry(entry));
            out.push('\n');
        }
        for diagnostic in &record.diagnostics {
            out.push_str(&format!("  ! {}\n", diagnostic));
        }
        out.push_str(&Self::format_summary(record));
        out
    }

    pub fn format_entry(entry: &TraceEntry) -> String {
        let mut line = format!("{:>4}. {} ({})", entry.step, entry.kind, entry.node_id);
        if !entry.detail.is_empty() {
            line.push_str(&format!(": {}", entry.detail));
        }
        if let Some(port) = &entry.port {
            line.push_str(&format!(" -> {}", port));
        }
        line
    }

    pub fn format_summary(record: &ExecutionRecord) -> String {
        let outcome = match record.outcome {
            WalkOutcome::Completed => "completed",
            WalkOutcome::Suspended => "suspended",
            WalkOutcome::BudgetExceeded => "step budget exceeded",
            WalkOutcome::Invalid => "invalid graph",
            WalkOutcome::Abandoned => "abandoned",
        };
        format!(
            "{} after {} steps, {} effect(s){}",
            outcome,
            record.steps,
            record.effect_count,
            if record.skip_cooldown { ", cooldown skipped" } else { "" }
        )
    }
}
