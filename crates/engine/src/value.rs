//! Scalar cell values.
//!
//! A cell holds an integer (raw categorical code), a floating-point number,
//! or text. Missing data is encoded per measure type: empty text for
//! nominal-text columns, NaN for continuous columns, and a reserved integer
//! sentinel for everything else.

use serde::{Deserialize, Serialize};

/// Reserved integer meaning "missing" for non-continuous, non-text cells.
pub const INT_MISSING: i32 = -2147483648;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Int(i32),
    Number(f64),
    Text(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Int(INT_MISSING)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            // NaN == NaN here: two missing continuous cells compare equal
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Parse raw input the way a grid editor would: integer, then float,
    /// then text. Empty input becomes empty text.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Value::Text(String::new());
        }
        if let Ok(i) = trimmed.parse::<i32>() {
            return Value::Int(i);
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            return Value::Number(n);
        }
        Value::Text(trimmed.to_string())
    }

    /// True if this value is a missing-data marker of any representation.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Int(i) => *i == INT_MISSING,
            Value::Number(n) => n.is_nan(),
            Value::Text(s) => s.is_empty(),
        }
    }

    /// Numeric coercion for evaluation. Missing values and non-numeric text
    /// yield `None`; NaN passes through (it already means missing).
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) if *i == INT_MISSING => None,
            Value::Int(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Render for display with a fixed number of decimal places for
    /// floating-point values. Missing values render as empty.
    pub fn display(&self, dps: u8) -> String {
        match self {
            _ if self.is_missing() => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Number(n) => format!("{:.*}", dps as usize, n),
            Value::Text(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_input_classification() {
        assert_eq!(Value::from_input("42"), Value::Int(42));
        assert_eq!(Value::from_input("3.25"), Value::Number(3.25));
        assert_eq!(Value::from_input(" spam "), Value::Text("spam".into()));
        assert_eq!(Value::from_input(""), Value::Text(String::new()));
    }

    #[test]
    fn test_missing_markers() {
        assert!(Value::Int(INT_MISSING).is_missing());
        assert!(Value::Number(f64::NAN).is_missing());
        assert!(Value::Text(String::new()).is_missing());
        assert!(!Value::Int(0).is_missing());
        assert!(!Value::Number(0.0).is_missing());
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::Int(3).to_number(), Some(3.0));
        assert_eq!(Value::Int(INT_MISSING).to_number(), None);
        assert_eq!(Value::Number(1.5).to_number(), Some(1.5));
        assert_eq!(Value::Text("2.5".into()).to_number(), Some(2.5));
        assert_eq!(Value::Text("spam".into()).to_number(), None);
    }

    #[test]
    fn test_display_dps() {
        assert_eq!(Value::Number(1.5).display(2), "1.50");
        assert_eq!(Value::Int(7).display(2), "7");
        assert_eq!(Value::Number(f64::NAN).display(2), "");
        assert_eq!(Value::Text(String::new()).display(0), "");
    }
}
