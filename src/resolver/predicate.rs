use super::{evaluate_arithmetic, looks_arithmetic, ParameterResolver};
use crate::error::ResolutionError;

const EPSILON: f64 = 0.0001;
const COMPARISONS: [&str; 6] = ["<=", ">=", "==", "!=", "<", ">"];

impl ParameterResolver<'_> {
    /// Evaluates the predicates the engine understands itself.
    ///
    /// * comparisons over `{...}` placeholders, e.g. `{player.health} < 50`;
    /// * `random(N%)`;
    /// * `true` / `false` / `1` / `0`.
    ///
    /// Returns `Ok(None)` for anything else, which belongs to the condition
    /// registry and is passed there unparsed.
    pub fn evaluate_local(&self, predicate: &str) -> Result<Option<bool>, ResolutionError> {
        let trimmed = predicate.trim();
        if trimmed.is_empty() {
            return Ok(Some(true));
        }

        let resolved = if trimmed.contains('{') {
            let resolved = self.substitute(trimmed)?;
            if let Some(result) = compare(&resolved)? {
                return Ok(Some(result));
            }
            resolved
        } else {
            trimmed.to_string()
        };

        if let Some(percent) = resolved
            .strip_prefix("random(")
            .and_then(|rest| rest.strip_suffix("%)"))
        {
            let chance: f64 = percent.trim().parse().map_err(|_| ResolutionError::NotANumber(percent.to_string()))?;
            let roll = self
                .roll
                .ok_or_else(|| ResolutionError::UnknownPlaceholder("random".to_string()))?;
            return Ok(Some(roll() * 100.0 < chance));
        }

        match resolved.to_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Ok(None),
        }
    }
}

/// `left OP right` over resolved text. Numbers compare with a small
/// tolerance for equality; anything else only supports `==` and `!=`.
fn compare(resolved: &str) -> Result<Option<bool>, ResolutionError> {
    for op in COMPARISONS {
        let Some(idx) = resolved.find(op).filter(|i| *i > 0) else {
            continue;
        };
        let left = resolved[..idx].trim();
        let right = resolved[idx + op.len()..].trim();

        return Ok(Some(match (operand(left)?, operand(right)?) {
            (Some(l), Some(r)) => match op {
                "<" => l < r,
                ">" => l > r,
                "<=" => l <= r,
                ">=" => l >= r,
                "==" => (l - r).abs() < EPSILON,
                _ => (l - r).abs() >= EPSILON,
            },
            _ => match op {
                "==" => left == right,
                "!=" => left != right,
                _ => false,
            },
        }));
    }
    Ok(None)
}

fn operand(text: &str) -> Result<Option<f64>, ResolutionError> {
    if let Ok(n) = text.parse::<f64>() {
        return Ok(Some(n));
    }
    if looks_arithmetic(text) {
        return evaluate_arithmetic(text).map(Some);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use crate::context::{Entity, ExecutionContext};
    use crate::resolver::ParameterResolver;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Entity::player(1, "Alex").with_health(5.0, 20.0)).with_damage(12.0)
    }

    #[test]
    fn placeholder_comparisons() {
        let c = ctx();
        let r = ParameterResolver::new(&c);
        assert_eq!(r.evaluate_local("{player.health} < 10").unwrap(), Some(true));
        assert_eq!(r.evaluate_local("{damage} * 2 >= 25").unwrap(), Some(false));
        assert_eq!(r.evaluate_local("{damage} == 12.00001").unwrap(), Some(true));
        assert_eq!(r.evaluate_local("{player.name} == Alex").unwrap(), Some(true));
    }

    #[test]
    fn registry_predicates_are_not_touched() {
        let c = ctx();
        let r = ParameterResolver::new(&c);
        assert_eq!(r.evaluate_local("HEALTH_PERCENT:<50").unwrap(), None);
        assert_eq!(r.evaluate_local("HEALTH_BELOW:10").unwrap(), None);
    }

    #[test]
    fn random_and_literals() {
        let c = ctx();
        let low = || 0.1;
        let r = ParameterResolver::new(&c).with_roll(&low);
        assert_eq!(r.evaluate_local("random(25%)").unwrap(), Some(true));
        assert_eq!(r.evaluate_local("random(5%)").unwrap(), Some(false));
        assert_eq!(r.evaluate_local("TRUE").unwrap(), Some(true));
        assert_eq!(r.evaluate_local("0").unwrap(), Some(false));
    }
}
