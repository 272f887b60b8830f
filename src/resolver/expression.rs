//! A small arithmetic evaluator for resolved parameter text such as `12 * (3 + 1)`.
//!
//! Grammar:
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/' | '%') unary)*
//! unary  := '-' unary | atom
//! atom   := number | '(' expr ')'
//! ```
//! Division and modulo by zero yield 0. Parentheses and unary minus nest at
//! most `MAX_DEPTH` deep.

use crate::error::ResolutionError;

const MAX_DEPTH: usize = 64;

/// True when `text` only contains characters the evaluator understands.
pub fn looks_arithmetic(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || "+-*/%().eE".contains(c))
}

pub fn evaluate(text: &str) -> Result<f64, ResolutionError> {
    let mut parser = Parser {
        text,
        chars: text.char_indices().peekable(),
        depth: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if let Some(&(_, c)) = parser.chars.peek() {
        return Err(parser.error(format!("unexpected '{}'", c)));
    }
    Ok(if value.is_finite() { value } else { 0.0 })
}

struct Parser<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> ResolutionError {
        ResolutionError::MalformedExpression {
            expression: self.text.to_string(),
            message: message.into(),
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, wanted: char) -> bool {
        self.skip_ws();
        self.chars.next_if(|(_, c)| *c == wanted).is_some()
    }

    fn expr(&mut self) -> Result<f64, ResolutionError> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64, ResolutionError> {
        let mut value = self.unary()?;
        loop {
            if self.eat('*') {
                value *= self.unary()?;
            } else if self.eat('/') {
                let rhs = self.unary()?;
                value = if rhs == 0.0 { 0.0 } else { value / rhs };
            } else if self.eat('%') {
                let rhs = self.unary()?;
                value = if rhs == 0.0 { 0.0 } else { value % rhs };
            } else {
                return Ok(value);
            }
        }
    }

    fn descend(&mut self) -> Result<(), ResolutionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("nested more than {} levels deep", MAX_DEPTH)));
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<f64, ResolutionError> {
        if self.eat('-') {
            self.descend()?;
            let value = -self.unary()?;
            self.depth -= 1;
            return Ok(value);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<f64, ResolutionError> {
        if self.eat('(') {
            self.descend()?;
            let value = self.expr()?;
            if !self.eat(')') {
                return Err(self.error("missing ')'"));
            }
            self.depth -= 1;
            return Ok(value);
        }
        self.skip_ws();
        let Some(&(start, _)) = self.chars.peek() else {
            return Err(self.error("unexpected end of expression"));
        };
        let mut end = start;
        while let Some((i, c)) = self
            .chars
            .next_if(|(_, c)| c.is_ascii_digit() || matches!(*c, '.' | 'e' | 'E'))
        {
            end = i + c.len_utf8();
            // exponent sign, as in 1e-3
            if matches!(c, 'e' | 'E') {
                if let Some((j, sign)) = self.chars.next_if(|(_, c)| matches!(*c, '-' | '+')) {
                    end = j + sign.len_utf8();
                }
            }
        }
        let literal = &self.text[start..end];
        literal
            .parse::<f64>()
            .map_err(|_| self.error(format!("'{}' is not a number", literal)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("-3 + 10 % 4").unwrap(), -1.0);
        assert_eq!(evaluate("1e-1 * 10").unwrap(), 1.0);
    }

    #[test]
    fn divide_by_zero_is_zero() {
        assert_eq!(evaluate("5 / 0").unwrap(), 0.0);
        assert_eq!(evaluate("5 % (2 - 2)").unwrap(), 0.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("(2").is_err());
        assert!(evaluate("2 3").is_err());
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let parens = format!("{}1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(evaluate(&parens).unwrap(), 1.0);
        let too_deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(evaluate(&too_deep).is_err());
    }

    #[test]
    fn arithmetic_detection() {
        assert!(looks_arithmetic("20 * 1.5"));
        assert!(!looks_arithmetic("POTION:SPEED:5:1"));
        assert!(!looks_arithmetic("()"));
    }
}
