//! Error taxonomy.
//!
//! Formula compilation failures never escape as hard errors: the model
//! consumes them into the per-column formula status and message. Lookup
//! failures surface to the caller immediately. Row evaluation failures stay
//! local to the row that produced them.

use thiserror::Error;

use crate::column::ColumnId;

/// Failure of the formula compilation pipeline. The `Display` text is the
/// exact message installed on the column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// The formula references its own column, directly or through existing
    /// dependency edges.
    #[error("Circular reference detected")]
    Circular,

    /// The formula text could not be parsed.
    #[error("The formula is mis-specified")]
    Syntax,

    /// A bare name reference did not resolve to a column.
    #[error("Column '{0}' does not exist")]
    UnknownName(String),

    /// Structural or type violation found during validation.
    #[error("{0}")]
    Invalid(String),

    /// Anything unexpected, wrapped with its cause.
    #[error("Unexpected error ({0})")]
    Internal(String),
}

/// Column lookup failure, surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("No such column: {0}")]
    Name(String),

    #[error("No such column: {0}")]
    Id(ColumnId),

    #[error("Column index out of range: {0}")]
    Index(usize),
}

/// Per-row evaluation failure. Degrades to a missing value for that row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("value is not numeric")]
    NotNumeric,

    #[error("row tree references an unknown column")]
    UnknownColumn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_error_messages() {
        assert_eq!(FormulaError::Circular.to_string(), "Circular reference detected");
        assert_eq!(FormulaError::Syntax.to_string(), "The formula is mis-specified");
        assert_eq!(
            FormulaError::UnknownName("spam".into()).to_string(),
            "Column 'spam' does not exist"
        );
        assert_eq!(
            FormulaError::Invalid("MEAN() expects a column".into()).to_string(),
            "MEAN() expects a column"
        );
        assert_eq!(
            FormulaError::Internal("overflow".into()).to_string(),
            "Unexpected error (overflow)"
        );
    }

    #[test]
    fn test_lookup_error_messages() {
        assert_eq!(LookupError::Name("eggs".into()).to_string(), "No such column: eggs");
        assert_eq!(
            LookupError::Id(ColumnId::from_raw(4)).to_string(),
            "No such column: #4"
        );
    }
}
