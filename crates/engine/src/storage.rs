//! Storage adapter contract.
//!
//! The model owns one `DataSource`: the physical columnar store behind the
//! realized columns. The model never reads or writes cells except through
//! this trait, and virtual columns have no presence here at all.
//!
//! Handles are positional: the model keeps the realized prefix contiguous,
//! so a realized column's handle always equals its position, and structural
//! renumbering updates both together.

use crate::column::{ColumnId, ColumnType, MeasureType};
use crate::value::Value;

pub type ColumnHandle = usize;

/// One entry of a categorical column's level table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub raw: i32,
    pub label: String,
}

impl Level {
    pub fn new(raw: i32, label: impl Into<String>) -> Self {
        Self {
            raw,
            label: label.into(),
        }
    }
}

/// Physical column/row storage.
///
/// Row and column delete ranges are inclusive `[start, end]`, matching the
/// structural edit protocol upstream of this trait.
pub trait DataSource {
    // Structure
    fn append_column(&mut self, name: &str, import_name: Option<&str>) -> ColumnHandle;
    fn insert_column(&mut self, index: usize, name: &str) -> ColumnHandle;
    fn delete_columns(&mut self, start: usize, end: usize);
    fn column_count(&self) -> usize;
    fn row_count(&self) -> usize;
    fn set_row_count(&mut self, rows: usize);
    fn insert_rows(&mut self, start: usize, end: usize);
    fn delete_rows(&mut self, start: usize, end: usize);
    fn is_edited(&self) -> bool;
    fn set_edited(&mut self, edited: bool);

    // Per-column identity and metadata
    fn column_id(&self, column: ColumnHandle) -> ColumnId;
    fn set_column_id(&mut self, column: ColumnHandle, id: ColumnId);
    fn name(&self, column: ColumnHandle) -> &str;
    fn set_name(&mut self, column: ColumnHandle, name: &str);
    fn import_name(&self, column: ColumnHandle) -> &str;
    fn column_type(&self, column: ColumnHandle) -> ColumnType;
    fn set_column_type(&mut self, column: ColumnHandle, column_type: ColumnType);
    fn measure_type(&self, column: ColumnHandle) -> MeasureType;
    fn set_measure_type(&mut self, column: ColumnHandle, measure_type: MeasureType);
    fn auto_measure(&self, column: ColumnHandle) -> bool;
    fn set_auto_measure(&mut self, column: ColumnHandle, auto: bool);
    fn dps(&self, column: ColumnHandle) -> u8;
    fn set_dps(&mut self, column: ColumnHandle, dps: u8);

    // Cells
    fn value(&self, column: ColumnHandle, row: usize) -> Value;
    fn set_value(&mut self, column: ColumnHandle, row: usize, value: Value);
    fn append(&mut self, column: ColumnHandle, value: Value);
    fn clear_at(&mut self, column: ColumnHandle, row: usize);
    fn column_row_count(&self, column: ColumnHandle) -> usize;

    // Levels
    fn levels(&self, column: ColumnHandle) -> &[Level];
    fn insert_level(&mut self, column: ColumnHandle, raw: i32, label: &str);
    fn clear_levels(&mut self, column: ColumnHandle);
    fn value_for_label(&self, column: ColumnHandle, label: &str) -> i32;

    // Bookkeeping
    fn has_changes(&self, column: ColumnHandle) -> bool;
    fn set_changes(&mut self, column: ColumnHandle, changes: bool);
    fn determine_dps(&mut self, column: ColumnHandle);
}
