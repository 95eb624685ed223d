use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Result, XrfError};

/// Atom counts of a chemical formula.
///
/// Symbols are an upper-case letter followed by lower-case letters; counts
/// may be decimal or in scientific notation and groups may be nested in
/// parentheses. Whether a symbol names a known element is left to the
/// caller.
///
/// # Examples
/// ```
/// let counts = xrfcalc::chemparser::parse_formula("Ca(OH)2").unwrap();
/// assert_eq!(counts["O"], 2.0);
/// assert_eq!(counts["Ca"], 1.0);
/// ```
pub fn parse_formula(formula: &str) -> Result<BTreeMap<String, f64>> {
    let compact: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(XrfError::invalid("empty chemical formula"));
    }
    let mut parser = FormulaParser {
        chars: compact.chars().peekable(),
        formula,
    };
    let counts = parser.group(0)?;
    if parser.chars.peek().is_some() {
        return Err(parser.error("unbalanced ')'"));
    }
    if counts.is_empty() {
        return Err(parser.error("no element symbol"));
    }
    Ok(counts)
}

struct FormulaParser<'a> {
    chars: Peekable<Chars<'a>>,
    formula: &'a str,
}

impl FormulaParser<'_> {
    fn error(&self, what: &str) -> XrfError {
        XrfError::invalid(format!("invalid chemical formula '{}': {what}", self.formula))
    }

    fn group(&mut self, depth: usize) -> Result<BTreeMap<String, f64>> {
        let mut counts = BTreeMap::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                '(' => {
                    self.chars.next();
                    let inner = self.group(depth + 1)?;
                    if self.chars.next() != Some(')') {
                        return Err(self.error("missing ')'"));
                    }
                    let n = self.count()?;
                    for (symbol, count) in inner {
                        *counts.entry(symbol).or_insert(0.0) += n * count;
                    }
                }
                ')' if depth > 0 => break,
                c if c.is_ascii_uppercase() => {
                    let symbol = self.symbol();
                    let n = self.count()?;
                    *counts.entry(symbol).or_insert(0.0) += n;
                }
                _ => return Err(self.error(&format!("unexpected character '{c}'"))),
            }
        }
        Ok(counts)
    }

    fn symbol(&mut self) -> String {
        let mut symbol = String::new();
        if let Some(c) = self.chars.next() {
            symbol.push(c);
        }
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_lowercase() {
                break;
            }
            symbol.push(c);
            self.chars.next();
        }
        symbol
    }

    /// `Er` after a count is erbium, not an exponent.
    fn exponent_follows(&self) -> bool {
        let mut ahead = self.chars.clone();
        ahead.next();
        matches!(ahead.next(), Some(c) if c.is_ascii_digit() || c == '+' || c == '-')
    }

    /// Optional count after a symbol or group; 1 when absent.
    fn count(&mut self) -> Result<f64> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            let accept = c.is_ascii_digit()
                || c == '.'
                || ((c == 'e' || c == 'E') && !text.is_empty() && self.exponent_follows())
                || ((c == '+' || c == '-') && text.ends_with(['e', 'E']));
            if !accept {
                break;
            }
            text.push(c);
            self.chars.next();
        }
        if text.is_empty() {
            return Ok(1.0);
        }
        let value: f64 = text
            .parse()
            .map_err(|_| self.error(&format!("invalid count '{text}'")))?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.error(&format!("invalid count '{text}'")));
        }
        Ok(value)
    }
}
