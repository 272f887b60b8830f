use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A raw node parameter as the editor stores it.
///
/// Placeholders are never stored resolved: `{damage}` stays a
/// `Placeholder("damage")` until the resolver reads it against a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Placeholder(String),
}

// Manual implementation to handle f64
impl Eq for Value {}

// Hash f64 by its bits
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Number(n) => n.to_bits().hash(state),
            Value::Text(s) | Value::Placeholder(s) => s.hash(state),
        }
    }
}

impl Value {
    /// Interprets an editor string. A string of the exact form `{key}` becomes
    /// a placeholder, numeric strings become numbers, everything else is text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(key) = placeholder_key(trimmed) {
            return Value::Placeholder(key.to_string());
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Placeholder(_) => None,
        }
    }

    /// The literal text of a `Text` value; numbers are rendered, placeholders are not.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Number(n) => Some(format_number(*n)),
            Value::Text(s) => Some(s.clone()),
            Value::Placeholder(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Value::Placeholder(_))
    }

    /// True for text values that embed `{...}` tokens and must be resolved at read time.
    pub fn is_expression(&self) -> bool {
        matches!(self, Value::Text(s) if s.contains('{') && s.contains('}'))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Placeholder(key) => write!(f, "{{{}}}", key),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::parse(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::parse(&s)
    }
}

/// A resolved value: what the executor works with after placeholders are gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view. Text that parses as a number counts as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn number_or(&self, default: f64) -> f64 {
        self.as_number().unwrap_or(default)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => f.write_str(&format_number(*n)),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

/// Renders integral numbers without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Returns `key` for a string of the exact form `{key}`.
pub(crate) fn placeholder_key(s: &str) -> Option<&str> {
    let inner = s.strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(['{', '}']) {
        return None;
    }
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognises_placeholders_and_numbers() {
        assert_eq!(Value::parse("{damage}"), Value::Placeholder("damage".into()));
        assert_eq!(Value::parse("12.5"), Value::Number(12.5));
        assert_eq!(Value::parse("{a} + 1"), Value::Text("{a} + 1".into()));
        assert!(Value::parse("{a} + 1").is_expression());
    }

    #[test]
    fn integers_display_without_fraction() {
        assert_eq!(Value::Number(20.0).to_string(), "20");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Placeholder("x".into()).to_string(), "{x}");
    }
}
