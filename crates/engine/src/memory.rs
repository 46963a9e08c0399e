//! In-process columnar backend.
//!
//! `MemoryDataSet` is the reference `DataSource`: typed column vectors kept
//! in RAM, with the level tables and decimal-place bookkeeping the model
//! expects. Cell vectors grow lazily; reads past a column's extent answer
//! with the measure-appropriate missing value rather than allocating.

use crate::column::{ColumnId, ColumnType, MeasureType};
use crate::storage::{ColumnHandle, DataSource, Level};
use crate::value::{Value, INT_MISSING};

#[derive(Debug, Default)]
struct StoreColumn {
    id: ColumnId,
    name: String,
    import_name: String,
    column_type: ColumnType,
    measure_type: MeasureType,
    auto_measure: bool,
    dps: u8,
    levels: Vec<Level>,
    cells: Vec<Value>,
    changes: bool,
}

impl StoreColumn {
    fn new(name: &str, import_name: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            import_name: import_name.unwrap_or("").to_string(),
            auto_measure: true,
            ..Default::default()
        }
    }

    fn missing(&self) -> Value {
        self.measure_type.missing_value()
    }

    /// Grow the cell vector so `row` is addressable.
    fn reserve_row(&mut self, row: usize) {
        while self.cells.len() <= row {
            let missing = self.missing();
            self.cells.push(missing);
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryDataSet {
    columns: Vec<StoreColumn>,
    row_count: usize,
    edited: bool,
}

impl MemoryDataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: usize) -> Self {
        Self {
            row_count: rows,
            ..Default::default()
        }
    }

    fn col(&self, column: ColumnHandle) -> &StoreColumn {
        &self.columns[column]
    }

    fn col_mut(&mut self, column: ColumnHandle) -> &mut StoreColumn {
        self.edited = true;
        self.columns[column].changes = true;
        &mut self.columns[column]
    }
}

impl DataSource for MemoryDataSet {
    fn append_column(&mut self, name: &str, import_name: Option<&str>) -> ColumnHandle {
        self.edited = true;
        self.columns.push(StoreColumn::new(name, import_name));
        self.columns.len() - 1
    }

    fn insert_column(&mut self, index: usize, name: &str) -> ColumnHandle {
        self.edited = true;
        self.columns.insert(index, StoreColumn::new(name, None));
        index
    }

    fn delete_columns(&mut self, start: usize, end: usize) {
        self.edited = true;
        self.columns.drain(start..=end);
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn set_row_count(&mut self, rows: usize) {
        self.edited = true;
        self.row_count = rows;
        for column in &mut self.columns {
            column.cells.truncate(rows);
        }
    }

    fn insert_rows(&mut self, start: usize, end: usize) {
        self.edited = true;
        let count = end - start + 1;
        for column in &mut self.columns {
            if start <= column.cells.len() {
                let missing = column.missing();
                for _ in 0..count {
                    column.cells.insert(start, missing.clone());
                }
            }
        }
        self.row_count += count;
    }

    fn delete_rows(&mut self, start: usize, end: usize) {
        self.edited = true;
        let count = end - start + 1;
        for column in &mut self.columns {
            if start < column.cells.len() {
                let upper = (end + 1).min(column.cells.len());
                column.cells.drain(start..upper);
            }
        }
        self.row_count = self.row_count.saturating_sub(count);
    }

    fn is_edited(&self) -> bool {
        self.edited
    }

    fn set_edited(&mut self, edited: bool) {
        self.edited = edited;
    }

    fn column_id(&self, column: ColumnHandle) -> ColumnId {
        self.col(column).id
    }

    fn set_column_id(&mut self, column: ColumnHandle, id: ColumnId) {
        self.columns[column].id = id;
    }

    fn name(&self, column: ColumnHandle) -> &str {
        &self.col(column).name
    }

    fn set_name(&mut self, column: ColumnHandle, name: &str) {
        self.col_mut(column).name = name.to_string();
    }

    fn import_name(&self, column: ColumnHandle) -> &str {
        &self.col(column).import_name
    }

    fn column_type(&self, column: ColumnHandle) -> ColumnType {
        self.col(column).column_type
    }

    fn set_column_type(&mut self, column: ColumnHandle, column_type: ColumnType) {
        self.col_mut(column).column_type = column_type;
    }

    fn measure_type(&self, column: ColumnHandle) -> MeasureType {
        self.col(column).measure_type
    }

    fn set_measure_type(&mut self, column: ColumnHandle, measure_type: MeasureType) {
        self.col_mut(column).measure_type = measure_type;
    }

    fn auto_measure(&self, column: ColumnHandle) -> bool {
        self.col(column).auto_measure
    }

    fn set_auto_measure(&mut self, column: ColumnHandle, auto: bool) {
        self.col_mut(column).auto_measure = auto;
    }

    fn dps(&self, column: ColumnHandle) -> u8 {
        self.col(column).dps
    }

    fn set_dps(&mut self, column: ColumnHandle, dps: u8) {
        self.col_mut(column).dps = dps;
    }

    fn value(&self, column: ColumnHandle, row: usize) -> Value {
        let col = self.col(column);
        col.cells.get(row).cloned().unwrap_or_else(|| col.missing())
    }

    fn set_value(&mut self, column: ColumnHandle, row: usize, value: Value) {
        let col = self.col_mut(column);
        col.reserve_row(row);
        col.cells[row] = value;
    }

    fn append(&mut self, column: ColumnHandle, value: Value) {
        self.col_mut(column).cells.push(value);
    }

    fn clear_at(&mut self, column: ColumnHandle, row: usize) {
        let col = self.col_mut(column);
        if row < col.cells.len() {
            col.cells[row] = col.missing();
        }
    }

    fn column_row_count(&self, column: ColumnHandle) -> usize {
        self.col(column).cells.len()
    }

    fn levels(&self, column: ColumnHandle) -> &[Level] {
        &self.col(column).levels
    }

    fn insert_level(&mut self, column: ColumnHandle, raw: i32, label: &str) {
        let col = self.col_mut(column);
        let level = Level::new(raw, label);
        match col.levels.binary_search_by_key(&raw, |l| l.raw) {
            Ok(pos) => col.levels[pos] = level,
            Err(pos) => col.levels.insert(pos, level),
        }
    }

    fn clear_levels(&mut self, column: ColumnHandle) {
        self.col_mut(column).levels.clear();
    }

    fn value_for_label(&self, column: ColumnHandle, label: &str) -> i32 {
        self.col(column)
            .levels
            .iter()
            .find(|l| l.label == label)
            .map(|l| l.raw)
            .unwrap_or(INT_MISSING)
    }

    fn has_changes(&self, column: ColumnHandle) -> bool {
        self.col(column).changes
    }

    fn set_changes(&mut self, column: ColumnHandle, changes: bool) {
        self.columns[column].changes = changes;
    }

    fn determine_dps(&mut self, column: ColumnHandle) {
        let dps = self
            .col(column)
            .cells
            .iter()
            .filter_map(Value::to_number)
            .filter(|n| n.is_finite())
            .map(decimals_needed)
            .max()
            .unwrap_or(0);
        self.columns[column].dps = dps;
    }
}

/// Decimal places needed to show a value without visible truncation,
/// capped at 3.
fn decimals_needed(n: f64) -> u8 {
    for dps in 0..3u8 {
        let scaled = n * 10f64.powi(dps as i32);
        if (scaled - scaled.round()).abs() < 1e-9 {
            return dps;
        }
    }
    3
}
