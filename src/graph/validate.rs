use super::FlowGraph;
use crate::error::GraphStructureError;
use crate::node::{FlowNode, LoopMode, MathOp, NodeKind, TargetType, Value, VariableOp};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

impl FlowGraph {
    /// Checks the structural invariants and node parameters.
    ///
    /// Returns every problem found, in node order. An empty list means the
    /// graph may be executed or saved as ready.
    pub fn validate(&self) -> Vec<GraphStructureError> {
        let mut errors = Vec::new();

        let starts: Vec<&FlowNode> = self.nodes().filter(|n| n.kind == NodeKind::Start).collect();
        match starts.len() {
            0 => errors.push(GraphStructureError::NoStartNode),
            1 => {}
            _ => errors.push(GraphStructureError::MultipleStartNodes(
                starts.iter().map(|n| n.id.clone()).collect(),
            )),
        }

        for node in self.nodes() {
            for (port, target) in self.outgoing(&node.id) {
                if self.node(target).is_none() {
                    errors.push(GraphStructureError::DanglingConnection {
                        node_id: node.id.clone(),
                        kind: node.kind,
                        port: port.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }

        let entry = self
            .start_node_id()
            .and_then(|id| self.node(id))
            .filter(|n| n.kind == NodeKind::Start)
            .or_else(|| starts.first().copied());
        if let Some(entry) = entry {
            let reached = self.reachable_from(&entry.id);
            for node in self.nodes() {
                if node.kind != NodeKind::Start && !reached.contains(node.id.as_str()) {
                    errors.push(GraphStructureError::UnreachableNode {
                        node_id: node.id.clone(),
                        kind: node.kind,
                    });
                }
            }
        }

        for node in self.nodes() {
            if !node.kind.is_terminal() && self.outgoing(&node.id).is_empty() {
                errors.push(GraphStructureError::MissingOutput {
                    node_id: node.id.clone(),
                    kind: node.kind,
                });
            }
        }

        errors.extend(self.find_cycles());

        for node in self.nodes() {
            for message in check_params(node) {
                errors.push(GraphStructureError::InvalidParameter {
                    node_id: node.id.clone(),
                    kind: node.kind,
                    message,
                });
            }
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    fn reachable_from<'a>(&'a self, entry: &'a str) -> AHashSet<&'a str> {
        let mut seen = AHashSet::new();
        let mut queue = VecDeque::from([entry]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            for (_, target) in self.outgoing(id) {
                if self.node(target).is_some() && !seen.contains(target) {
                    queue.push_back(target);
                }
            }
        }
        seen
    }

    /// Reports each node that closes a back edge, once.
    fn find_cycles(&self) -> Vec<GraphStructureError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: AHashMap<&str, Mark> = AHashMap::new();
        let mut reported: AHashSet<&str> = AHashSet::new();
        let mut errors = Vec::new();

        for root in self.nodes() {
            if marks.contains_key(root.id.as_str()) {
                continue;
            }
            // Iterative DFS: (node, index of next outgoing edge to visit)
            let mut stack: Vec<(&str, usize)> = vec![(root.id.as_str(), 0)];
            marks.insert(root.id.as_str(), Mark::Visiting);

            while let Some((id, edge)) = stack.last().copied() {
                let outgoing = self.outgoing(id);
                if edge >= outgoing.len() {
                    marks.insert(id, Mark::Done);
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let target = outgoing[edge].1;
                let Some(target_node) = self.node(target) else {
                    continue;
                };
                match marks.get(target) {
                    Some(Mark::Visiting) => {
                        if reported.insert(target) {
                            errors.push(GraphStructureError::CycleDetected {
                                node_id: target.to_string(),
                                kind: target_node.kind,
                            });
                        }
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(target, Mark::Visiting);
                        stack.push((target, 0));
                    }
                }
            }
        }
        errors
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn non_empty_text(node: &FlowNode, key: &str) -> bool {
    node.text_param(key).is_some_and(|s| !s.trim().is_empty()) || node.param(key).is_some_and(Value::is_placeholder)
}

/// A literal number, or something only known at run time.
enum Literal {
    Number(f64),
    Deferred,
    Invalid,
    Missing,
}

fn literal(node: &FlowNode, key: &str) -> Literal {
    match node.param(key) {
        None => Literal::Missing,
        Some(Value::Placeholder(_)) => Literal::Deferred,
        Some(v) if v.is_expression() => Literal::Deferred,
        Some(v) => match v.as_number() {
            Some(n) => Literal::Number(n),
            None => Literal::Invalid,
        },
    }
}

fn check_params(node: &FlowNode) -> Vec<String> {
    let mut problems = Vec::new();
    match node.kind {
        NodeKind::Start | NodeKind::End | NodeKind::SkipCooldown => {}
        NodeKind::Effect => {
            if !non_empty_text(node, "effectType") {
                problems.push("Effect type is required".to_string());
            }
            if let Literal::Number(c) = literal(node, "chance") {
                if !(0.0..=100.0).contains(&c) {
                    problems.push(format!("Chance {} must be between 0 and 100", c));
                }
            }
            if let Some(var) = node.text_param("storeAs") {
                if !var.is_empty() && !is_identifier(&var) {
                    problems.push(format!("Invalid variable name '{}'", var));
                }
            }
        }
        NodeKind::Condition => {
            if !non_empty_text(node, "condition") {
                problems.push("Condition is required".to_string());
            }
        }
        NodeKind::Delay => match literal(node, "duration") {
            Literal::Number(d) if d <= 0.0 => problems.push("Duration must be greater than 0".to_string()),
            Literal::Invalid => problems.push("Duration must be a number".to_string()),
            _ => {}
        },
        NodeKind::Loop => {
            let mode = loop_mode(node);
            match mode {
                Some(LoopMode::While) => {
                    if !non_empty_text(node, "condition") {
                        problems.push("While loop requires a condition".to_string());
                    }
                }
                Some(LoopMode::Count) => match literal(node, "count") {
                    Literal::Number(c) if c > 0.0 => {}
                    Literal::Deferred => {}
                    _ => problems.push("Loop count must be greater than 0".to_string()),
                },
                None => problems.push("Unknown loop mode".to_string()),
            }
        }
        NodeKind::Random => {
            if let Literal::Number(n) = literal(node, "pathCount") {
                if !(2.0..=4.0).contains(&n) {
                    problems.push("Path count must be between 2 and 4".to_string());
                }
            }
            let mut total = 0.0;
            let mut all_literal = true;
            for i in 1..=node.path_count() {
                match literal(node, &format!("weight{}", i)) {
                    Literal::Number(w) if w < 0.0 => {
                        problems.push(format!("Weight {} must not be negative", i));
                        all_literal = false;
                    }
                    Literal::Number(w) => total += w,
                    Literal::Missing => total += 1.0,
                    Literal::Deferred => all_literal = false,
                    Literal::Invalid => {
                        problems.push(format!("Weight {} must be a number", i));
                        all_literal = false;
                    }
                }
            }
            if all_literal && total <= 0.0 {
                problems.push("Total weight must be greater than 0".to_string());
            }
        }
        NodeKind::Variable => {
            match node.text_param("name") {
                Some(name) if is_identifier(&name) => {}
                Some(name) if !name.is_empty() => problems.push(format!("Invalid variable name '{}'", name)),
                _ => problems.push("Variable name is required".to_string()),
            }
            if let Some(op) = node.text_param("operation") {
                if op.parse::<VariableOp>().is_err() {
                    problems.push(format!("Unknown operation '{}'", op));
                }
            }
        }
        NodeKind::Target => {
            match node.text_param("targetType") {
                Some(t) if t.parse::<TargetType>().is_ok() => {}
                Some(t) => problems.push(format!("Unknown target type '{}'", t)),
                None => problems.push("Target type is required".to_string()),
            }
            if let Literal::Number(r) = literal(node, "range") {
                if r < 0.0 {
                    problems.push("Range must not be negative".to_string());
                }
            }
        }
        NodeKind::Math => {
            match node.text_param("result") {
                Some(name) if is_identifier(&name) => {}
                Some(name) if !name.is_empty() => problems.push(format!("Invalid result variable name '{}'", name)),
                _ => problems.push("Result variable name is required".to_string()),
            }
            if let Some(op) = node.text_param("operation") {
                if op.parse::<MathOp>().is_err() {
                    problems.push(format!("Unknown operation '{}'", op));
                }
            }
        }
    }
    problems
}

/// Loop mode from `mode` (or the older `type` key), defaulting to Count.
pub(crate) fn loop_mode(node: &FlowNode) -> Option<LoopMode> {
    match node.text_param("mode").or_else(|| node.text_param("type")) {
        Some(mode) => mode.parse().ok(),
        None => Some(LoopMode::Count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::node::{PORT_NEXT, PORT_YES};

    #[test]
    fn identifiers() {
        assert!(is_identifier("_total2"));
        assert!(!is_identifier("2total"));
        assert!(!is_identifier("to tal"));
    }

    #[test]
    fn flags_cycles_once() {
        let graph = GraphBuilder::new("g")
            .node("s", NodeKind::Start)
            .node("a", NodeKind::SkipCooldown)
            .node("b", NodeKind::SkipCooldown)
            .connect("s", PORT_NEXT, "a")
            .connect("a", PORT_NEXT, "b")
            .connect("b", PORT_NEXT, "a")
            .build()
            .unwrap();
        let cycles: Vec<_> = graph
            .validate()
            .into_iter()
            .filter(|e| matches!(e, GraphStructureError::CycleDetected { .. }))
            .collect();
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn condition_with_one_branch_is_fine() {
        let graph = GraphBuilder::new("g")
            .node("s", NodeKind::Start)
            .node("c", NodeKind::Condition)
            .param("condition", "IN_WATER")
            .node("e", NodeKind::End)
            .connect("s", PORT_NEXT, "c")
            .connect("c", PORT_YES, "e")
            .build()
            .unwrap();
        assert_eq!(graph.validate(), vec![]);
    }
}
