//! Column identity, metadata, and formula state.
//!
//! A `Column` is the logical spreadsheet column: a stable identity, a
//! position, optional formula state, and either live backing storage or
//! "virtual" status. Virtual columns are the trailing pad of the grid; they
//! behave as fully-typed empty columns until first written.

use serde::{Deserialize, Serialize};

use crate::formula::expr::{ColumnExpr, RowExpr};
use crate::value::{Value, INT_MISSING};

/// Stable column identity, assigned once at creation and never reused.
///
/// Graph edges are keyed by `ColumnId`, not by name or position, so renames
/// and repositioning never invalidate dependency bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(u32);

impl ColumnId {
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        ColumnId(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    None,
    Data,
    Computed,
    Recoded,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasureType {
    #[default]
    None,
    Continuous,
    NominalText,
    Nominal,
    Ordinal,
}

impl MeasureType {
    /// The missing-value sentinel appropriate for cells of this measure.
    pub fn missing_value(self) -> Value {
        match self {
            MeasureType::NominalText => Value::Text(String::new()),
            MeasureType::Continuous => Value::Number(f64::NAN),
            _ => Value::Int(INT_MISSING),
        }
    }
}

/// Tri-state outcome of formula compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormulaStatus {
    /// No formula (empty text).
    #[default]
    Empty,
    /// Compiled, wired into the graph, row tree installed.
    Ok,
    /// Compilation or validation failed; see the formula message.
    Error,
}

/// Realization state. A column is created `Virtual` and transitions to
/// `Realized` exactly once, on first mutation; the transition is
/// irreversible for the column's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
    Virtual,
    Realized { handle: usize },
}

/// A logical column in the instance model.
///
/// Metadata (name, types, decimal places, levels) lives in backing storage
/// once realized; virtual columns answer with type-appropriate defaults.
/// Formula state and compiled artifacts live here. Dependency edges live in
/// the model's graphs, keyed by `self.id`.
#[derive(Debug)]
pub struct Column {
    id: ColumnId,
    index: usize,
    backing: Backing,
    formula: String,
    formula_status: FormulaStatus,
    formula_message: String,
    pub(crate) column_tree: Option<ColumnExpr>,
    pub(crate) row_tree: Option<RowExpr>,
}

impl Column {
    /// Create a virtual column with a pre-assigned identity.
    pub fn new(id: ColumnId, index: usize) -> Self {
        Self {
            id,
            index,
            backing: Backing::Virtual,
            formula: String::new(),
            formula_status: FormulaStatus::Empty,
            formula_message: String::new(),
            column_tree: None,
            row_tree: None,
        }
    }

    /// Create a column already backed by storage (dataset load path).
    pub fn realized(id: ColumnId, index: usize, handle: usize) -> Self {
        let mut column = Self::new(id, index);
        column.backing = Backing::Realized { handle };
        column
    }

    #[inline]
    pub fn id(&self) -> ColumnId {
        self.id
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        self.backing == Backing::Virtual
    }

    /// Storage handle, if realized.
    #[inline]
    pub fn handle(&self) -> Option<usize> {
        match self.backing {
            Backing::Virtual => None,
            Backing::Realized { handle } => Some(handle),
        }
    }

    /// The single virtual-to-realized transition. Only the model calls
    /// this, as part of its materialization protocol.
    pub(crate) fn attach(&mut self, handle: usize) {
        debug_assert!(self.is_virtual(), "column realized twice");
        self.backing = Backing::Realized { handle };
    }

    pub(crate) fn set_handle(&mut self, handle: usize) {
        debug_assert!(!self.is_virtual());
        self.backing = Backing::Realized { handle };
    }

    #[inline]
    pub fn formula(&self) -> &str {
        &self.formula
    }

    #[inline]
    pub fn has_formula(&self) -> bool {
        !self.formula.is_empty()
    }

    #[inline]
    pub fn formula_status(&self) -> FormulaStatus {
        self.formula_status
    }

    #[inline]
    pub fn formula_message(&self) -> &str {
        &self.formula_message
    }

    pub(crate) fn set_formula_text(&mut self, text: &str) {
        self.formula = text.to_string();
    }

    pub(crate) fn set_formula_outcome(&mut self, status: FormulaStatus, message: &str) {
        self.formula_status = status;
        self.formula_message = message.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_id_identity() {
        let a = ColumnId::from_raw(1);
        let b = ColumnId::from_raw(1);
        let c = ColumnId::from_raw(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(format!("{}", c), "#2");
    }

    #[test]
    fn test_missing_value_per_measure() {
        assert_eq!(
            MeasureType::NominalText.missing_value(),
            Value::Text(String::new())
        );
        assert!(matches!(
            MeasureType::Continuous.missing_value(),
            Value::Number(n) if n.is_nan()
        ));
        assert_eq!(MeasureType::None.missing_value(), Value::Int(INT_MISSING));
        assert_eq!(MeasureType::Nominal.missing_value(), Value::Int(INT_MISSING));
        assert_eq!(MeasureType::Ordinal.missing_value(), Value::Int(INT_MISSING));
    }

    #[test]
    fn test_realization_transition() {
        let mut column = Column::new(ColumnId::from_raw(7), 3);
        assert!(column.is_virtual());
        assert_eq!(column.handle(), None);

        column.attach(3);
        assert!(!column.is_virtual());
        assert_eq!(column.handle(), Some(3));
        assert_eq!(column.id(), ColumnId::from_raw(7));
    }

    #[test]
    fn test_new_column_has_no_formula() {
        let column = Column::new(ColumnId::from_raw(0), 0);
        assert!(!column.has_formula());
        assert_eq!(column.formula_status(), FormulaStatus::Empty);
        assert_eq!(column.formula_message(), "");
    }
}
