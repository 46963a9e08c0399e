//! The instance model: the ordered column list and everything that
//! coordinates it.
//!
//! The model owns the column wrappers, the dependency graphs, the identity
//! counter, and a boxed [`DataSource`] for cell storage. Columns past the
//! realized prefix are virtual: they have an identity and a position but no
//! backing storage until first mutation. The trailing pad always holds
//! exactly [`N_VIRTUAL_COLS`] virtual columns.
//!
//! # Invariants
//!
//! - The realized columns form a contiguous prefix of the sequence, so a
//!   realized column's storage handle always equals its position.
//! - Identities are never reused, not even across delete/insert cycles.
//! - After every structural edit the trailing pad is restored to exactly
//!   `N_VIRTUAL_COLS` virtual columns.

use crate::column::{Column, ColumnId, ColumnType, FormulaStatus, MeasureType};
use crate::dep_graph::ColumnGraphs;
use crate::error::{FormulaError, LookupError};
use crate::formula::analyze::{self, ColumnValues, NameLookup};
use crate::formula::eval::{self, ValueLookup};
use crate::formula::parser;
use crate::recalc::RecalcReport;
use crate::storage::{DataSource, Level};
use crate::value::{Value, INT_MISSING};

/// Trailing virtual columns kept past the realized prefix.
pub const N_VIRTUAL_COLS: usize = 5;

/// Virtual row affordance past the stored row count.
pub const N_VIRTUAL_ROWS: usize = 50;

/// Batched metadata edit, applied in one call. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct ColumnChanges {
    pub name: Option<String>,
    pub column_type: Option<ColumnType>,
    pub measure_type: Option<MeasureType>,
    pub auto_measure: Option<bool>,
    pub dps: Option<u8>,
    pub formula: Option<String>,
}

pub struct InstanceModel {
    dataset: Box<dyn DataSource>,
    columns: Vec<Column>,
    graphs: ColumnGraphs,
    next_id: u32,
    title: String,
    path: String,
}

/// Read-only view over the model for the compilation and evaluation
/// stages. Unknown or virtual columns read as the integer missing
/// sentinel, which fails the row.
struct ModelCells<'a> {
    model: &'a InstanceModel,
}

impl ValueLookup for ModelCells<'_> {
    fn cell(&self, id: ColumnId, row: usize) -> Value {
        match self.model.index_of(id).and_then(|i| self.model.columns[i].handle()) {
            Some(handle) => self.model.dataset.value(handle, row),
            None => Value::Int(INT_MISSING),
        }
    }
}

impl ColumnValues for ModelCells<'_> {
    fn cell(&self, id: ColumnId, row: usize) -> Value {
        ValueLookup::cell(self, id, row)
    }

    fn row_count(&self) -> usize {
        self.model.dataset.row_count()
    }
}

impl NameLookup for ModelCells<'_> {
    fn resolve(&self, name: &str) -> Option<ColumnId> {
        let handle = (0..self.model.dataset.column_count())
            .find(|&h| self.model.dataset.name(h) == name)?;
        Some(self.model.columns[handle].id())
    }
}

/// Default name for a position: 0 is "A", 25 is "Z", 26 is "AA".
fn default_name(mut index: usize) -> String {
    let mut name = String::new();
    loop {
        let i = index % 26;
        name.insert(0, (b'A' + i as u8) as char);
        let next = index / 26;
        if next == 0 {
            break;
        }
        index = next - 1;
    }
    name
}

impl InstanceModel {
    pub fn new(dataset: Box<dyn DataSource>) -> Self {
        let mut model = Self {
            dataset,
            columns: Vec::new(),
            graphs: ColumnGraphs::new(),
            next_id: 1,
            title: String::new(),
            path: String::new(),
        };
        model.refresh();
        model
    }

    /// Rebuild the column wrappers from the dataset, assigning fresh
    /// identities to any stored column without one, then re-pad. Called
    /// after a dataset load; compiled formula state does not survive it.
    pub fn refresh(&mut self) {
        self.columns.clear();
        self.graphs = ColumnGraphs::new();

        let mut max_raw = 0;
        for handle in 0..self.dataset.column_count() {
            max_raw = max_raw.max(self.dataset.column_id(handle).raw());
        }
        self.next_id = self.next_id.max(max_raw + 1);

        for handle in 0..self.dataset.column_count() {
            let mut id = self.dataset.column_id(handle);
            if id.raw() == 0 {
                id = self.alloc_id();
                self.dataset.set_column_id(handle, id);
            }
            self.columns.push(Column::realized(id, handle, handle));
        }
        self.re_pad();
    }

    // -- identity and position

    fn alloc_id(&mut self) -> ColumnId {
        let id = ColumnId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id() == id)
    }

    fn check_index(&self, index: usize) -> Result<(), LookupError> {
        if index < self.columns.len() {
            Ok(())
        } else {
            Err(LookupError::Index(index))
        }
    }

    // -- lookups and iteration

    pub fn column(&self, index: usize) -> Result<&Column, LookupError> {
        self.columns.get(index).ok_or(LookupError::Index(index))
    }

    pub fn column_by_id(&self, id: ColumnId) -> Option<&Column> {
        self.index_of(id).map(|i| &self.columns[i])
    }

    pub fn column_by_name(&self, name: &str) -> Result<&Column, LookupError> {
        let handle = (0..self.dataset.column_count())
            .find(|&h| self.dataset.name(h) == name)
            .ok_or_else(|| LookupError::Name(name.to_string()))?;
        Ok(&self.columns[handle])
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Realized columns only. The virtual pad is not counted.
    pub fn column_count(&self) -> usize {
        self.dataset.column_count()
    }

    /// Trailing virtual columns.
    pub fn virtual_column_count(&self) -> usize {
        self.columns.len() - self.dataset.column_count()
    }

    pub fn total_column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.dataset.row_count()
    }

    pub fn virtual_row_count(&self) -> usize {
        self.dataset.row_count() + N_VIRTUAL_ROWS
    }

    // -- document properties

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn is_edited(&self) -> bool {
        self.dataset.is_edited()
    }

    pub fn set_edited(&mut self, edited: bool) {
        self.dataset.set_edited(edited);
    }

    // -- per-column metadata

    /// A virtual column reads as the fully-typed empty column: empty name,
    /// NONE types, zero decimal places, no levels.
    pub fn name(&self, index: usize) -> Result<&str, LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.name(handle)),
            None => Ok(""),
        }
    }

    pub fn import_name(&self, index: usize) -> Result<&str, LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.import_name(handle)),
            None => Ok(""),
        }
    }

    pub fn column_type(&self, index: usize) -> Result<ColumnType, LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.column_type(handle)),
            None => Ok(ColumnType::None),
        }
    }

    pub fn measure_type(&self, index: usize) -> Result<MeasureType, LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.measure_type(handle)),
            None => Ok(MeasureType::None),
        }
    }

    pub fn auto_measure(&self, index: usize) -> Result<bool, LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.auto_measure(handle)),
            None => Ok(true),
        }
    }

    pub fn dps(&self, index: usize) -> Result<u8, LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.dps(handle)),
            None => Ok(0),
        }
    }

    pub fn levels(&self, index: usize) -> Result<&[Level], LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.levels(handle)),
            None => Ok(&[]),
        }
    }

    /// Rename a column, materializing it first. An explicit name that
    /// collides with another column gets a " (2)"-style suffix. Subscribers
    /// are recalculated; their edges key on identity and survive the rename.
    pub fn set_name(&mut self, index: usize, name: &str) -> Result<RecalcReport, LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        if self.dataset.name(index) == name {
            return Ok(RecalcReport::new());
        }
        let unique = self.unique_name(name, Some(index));
        self.dataset.set_name(index, &unique);
        let id = self.columns[index].id();
        Ok(self.propagate(id))
    }

    pub fn set_column_type(
        &mut self,
        index: usize,
        column_type: ColumnType,
    ) -> Result<(), LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        self.dataset.set_column_type(index, column_type);
        Ok(())
    }

    /// An explicit measure choice also clears the auto-measure flag. The
    /// column's missing sentinel may change, so a computed column is
    /// re-filled and its subscribers follow.
    pub fn set_measure_type(
        &mut self,
        index: usize,
        measure_type: MeasureType,
    ) -> Result<RecalcReport, LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        self.dataset.set_measure_type(index, measure_type);
        self.dataset.set_auto_measure(index, false);
        let id = self.columns[index].id();
        let mut report = self.recalc_column(index);
        report.absorb(&self.propagate(id));
        Ok(report)
    }

    pub fn set_auto_measure(&mut self, index: usize, auto: bool) -> Result<(), LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        self.dataset.set_auto_measure(index, auto);
        Ok(())
    }

    pub fn set_dps(&mut self, index: usize, dps: u8) -> Result<(), LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        self.dataset.set_dps(index, dps);
        Ok(())
    }

    // -- cells

    /// Read a cell. Virtual columns and reads past a column's extent
    /// return the measure-appropriate missing value without materializing
    /// anything.
    pub fn value(&self, index: usize, row: usize) -> Result<Value, LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.value(handle, row)),
            None => Ok(Value::Int(INT_MISSING)),
        }
    }

    pub fn set_value(
        &mut self,
        index: usize,
        row: usize,
        value: Value,
    ) -> Result<RecalcReport, LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        if row >= self.dataset.row_count() {
            self.dataset.set_row_count(row + 1);
        }
        self.dataset.set_value(index, row, value);
        self.dataset.determine_dps(index);
        let id = self.columns[index].id();
        Ok(self.propagate(id))
    }

    pub fn append(&mut self, index: usize, value: Value) -> Result<RecalcReport, LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        self.dataset.append(index, value);
        let extent = self.dataset.column_row_count(index);
        if extent > self.dataset.row_count() {
            self.dataset.set_row_count(extent);
        }
        self.dataset.determine_dps(index);
        let id = self.columns[index].id();
        Ok(self.propagate(id))
    }

    pub fn clear_at(&mut self, index: usize, row: usize) -> Result<RecalcReport, LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        self.dataset.clear_at(index, row);
        let id = self.columns[index].id();
        Ok(self.propagate(id))
    }

    // -- levels

    pub fn insert_level(
        &mut self,
        index: usize,
        raw: i32,
        label: &str,
    ) -> Result<(), LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        self.dataset.insert_level(index, raw, label);
        Ok(())
    }

    pub fn clear_levels(&mut self, index: usize) -> Result<(), LookupError> {
        self.check_index(index)?;
        self.realize_column(index);
        self.dataset.clear_levels(index);
        Ok(())
    }

    pub fn value_for_label(&self, index: usize, label: &str) -> Result<i32, LookupError> {
        match self.column(index)?.handle() {
            Some(handle) => Ok(self.dataset.value_for_label(handle, label)),
            None => Ok(INT_MISSING),
        }
    }

    // -- structural edits: columns

    /// Append a realized column after the current realized prefix.
    pub fn append_column(&mut self, name: Option<&str>) -> usize {
        let index = self.dataset.column_count();
        self.insert_realized(index, name);
        index
    }

    /// Insert a realized column at `index`, shifting later columns right.
    /// Inserting past the realized prefix materializes the gap first so
    /// the prefix stays contiguous.
    pub fn insert_column(
        &mut self,
        index: usize,
        name: Option<&str>,
    ) -> Result<usize, LookupError> {
        self.check_index(index)?;
        if index > self.dataset.column_count() {
            self.realize_column(index - 1);
        }
        self.insert_realized(index, name);
        Ok(index)
    }

    fn insert_realized(&mut self, index: usize, name: Option<&str>) {
        let base = match name {
            Some(n) => n.to_string(),
            None => default_name(index),
        };
        let unique = self.unique_name(&base, None);
        let id = self.alloc_id();
        let handle = self.dataset.insert_column(index, &unique);
        self.dataset.set_column_id(handle, id);
        self.columns.insert(index, Column::realized(id, index, handle));
        self.renumber();
        self.re_pad();
    }

    /// Delete columns `[start, end]` inclusive. Every edge touching a
    /// deleted column is severed in both directions; backing storage for
    /// the realized part of the range is released; the remainder is
    /// renumbered and the pad restored. Surviving subscribers keep their
    /// compiled trees and read the severed column as missing.
    pub fn delete_columns(&mut self, start: usize, end: usize) -> Result<(), LookupError> {
        if start > end {
            return Err(LookupError::Index(start));
        }
        self.check_index(end)?;

        for col in &self.columns[start..=end] {
            self.graphs.remove_column(col.id());
        }

        let realized = self.dataset.column_count();
        if start < realized {
            self.dataset.delete_columns(start, end.min(realized - 1));
        }
        self.columns.drain(start..=end);
        self.renumber();
        self.re_pad();
        Ok(())
    }

    // -- structural edits: rows
    //
    // Row edits delegate to storage and deliberately trigger neither
    // recompilation nor recalculation. Only value and formula edits do.

    pub fn insert_rows(&mut self, start: usize, end: usize) {
        self.dataset.insert_rows(start, end);
    }

    pub fn delete_rows(&mut self, start: usize, end: usize) {
        self.dataset.delete_rows(start, end);
    }

    pub fn set_row_count(&mut self, rows: usize) {
        self.dataset.set_row_count(rows);
    }

    // -- batched edit

    pub fn change(
        &mut self,
        index: usize,
        changes: ColumnChanges,
    ) -> Result<RecalcReport, LookupError> {
        self.check_index(index)?;
        let mut report = RecalcReport::new();
        if let Some(name) = &changes.name {
            report.absorb(&self.set_name(index, name)?);
        }
        if let Some(column_type) = changes.column_type {
            self.set_column_type(index, column_type)?;
        }
        if let Some(measure_type) = changes.measure_type {
            report.absorb(&self.set_measure_type(index, measure_type)?);
        }
        if let Some(auto) = changes.auto_measure {
            self.set_auto_measure(index, auto)?;
        }
        if let Some(dps) = changes.dps {
            self.set_dps(index, dps)?;
        }
        if let Some(formula) = &changes.formula {
            report.absorb(&self.set_formula(index, formula)?);
        }
        Ok(report)
    }

    // -- formulas

    /// Set a column's formula text and run the compilation protocol.
    ///
    /// A no-op when the text matches the current formula. Otherwise the
    /// column is materialized, its existing edges and trees are cleared,
    /// and the pipeline runs stage by stage; the first failing stage
    /// records formula status ERROR with its message and leaves the
    /// dependency sets empty. Compilation failure is not an error to the
    /// caller. Recalculation and propagation always follow, so a failed
    /// or cleared formula fills the column with missing values.
    pub fn set_formula(&mut self, index: usize, text: &str) -> Result<RecalcReport, LookupError> {
        self.check_index(index)?;
        if self.columns[index].formula() == text {
            return Ok(RecalcReport::new());
        }
        self.realize_column(index);
        if !text.trim().is_empty() {
            self.dataset.set_column_type(index, ColumnType::Computed);
            if self.dataset.measure_type(index) == MeasureType::None {
                self.dataset.set_measure_type(index, MeasureType::Continuous);
            }
        }

        let id = self.columns[index].id();
        self.columns[index].set_formula_text(text);
        self.graphs.clear_column(id);
        self.columns[index].column_tree = None;
        self.columns[index].row_tree = None;

        if let Err(err) = self.compile(index, id, text) {
            self.graphs.clear_column(id);
            self.columns[index].column_tree = None;
            self.columns[index].row_tree = None;
            self.columns[index].set_formula_outcome(FormulaStatus::Error, &err.to_string());
        }

        let mut report = self.recalc_column(index);
        report.absorb(&self.propagate(id));
        Ok(report)
    }

    fn compile(&mut self, index: usize, id: ColumnId, text: &str) -> Result<(), FormulaError> {
        let tree = match parser::parse(text)? {
            Some(tree) => tree,
            None => {
                self.columns[index].set_formula_outcome(FormulaStatus::Empty, "");
                return Ok(());
            }
        };
        let resolved = analyze::resolve_names(&tree, &ModelCells { model: self })?;
        let deps = analyze::extract_deps(&resolved);
        if self.graphs.would_create_cycle(id, &deps.union()) {
            return Err(FormulaError::Circular);
        }
        analyze::check(&resolved)?;
        let lowered = analyze::lower(&resolved, &ModelCells { model: self })?;
        self.graphs.install(id, deps.column, deps.row);
        self.columns[index].column_tree = Some(resolved);
        self.columns[index].row_tree = Some(lowered);
        self.columns[index].set_formula_outcome(FormulaStatus::Ok, "");
        Ok(())
    }

    // -- recalculation

    /// Re-evaluate one column over every stored row.
    ///
    /// Aggregate constants are refreshed by re-lowering the column tree
    /// against current values first. A row whose evaluation fails gets the
    /// column's missing sentinel; failures never abort the batch. A
    /// computed column with no tree (empty or failed formula) is filled
    /// with missing values; anything else is left alone.
    fn recalc_column(&mut self, index: usize) -> RecalcReport {
        let (handle, column_tree) = {
            let col = &self.columns[index];
            (col.handle(), col.column_tree.clone())
        };
        let handle = match handle {
            Some(h) => h,
            None => return RecalcReport::new(),
        };
        let rows = self.dataset.row_count();
        let missing = self.dataset.measure_type(handle).missing_value();

        if let Some(column_tree) = column_tree {
            let mut failed = 0;
            let mut out: Vec<Value> = Vec::with_capacity(rows);
            let lowered = {
                let cells = ModelCells { model: self };
                analyze::lower(&column_tree, &cells).ok()
            };
            match &lowered {
                Some(tree) => {
                    let cells = ModelCells { model: self };
                    for row in 0..rows {
                        match eval::evaluate(tree, row, &cells) {
                            Ok(n) => out.push(Value::Number(n)),
                            Err(_) => {
                                failed += 1;
                                out.push(missing.clone());
                            }
                        }
                    }
                }
                None => {
                    failed = rows;
                    out.resize(rows, missing.clone());
                }
            }
            self.columns[index].row_tree = lowered;
            for (row, value) in out.into_iter().enumerate() {
                self.dataset.set_value(handle, row, value);
            }
            self.dataset.determine_dps(handle);
            RecalcReport {
                columns_recomputed: 1,
                rows_written: rows,
                rows_failed: failed,
            }
        } else if self.dataset.column_type(handle) == ColumnType::Computed {
            for row in 0..rows {
                self.dataset.set_value(handle, row, missing.clone());
            }
            RecalcReport {
                columns_recomputed: 1,
                rows_written: rows,
                rows_failed: rows,
            }
        } else {
            RecalcReport::new()
        }
    }

    /// Recalculate every transitive subscriber of `changed`, in
    /// dependency order. Each affected column is visited exactly once.
    fn propagate(&mut self, changed: ColumnId) -> RecalcReport {
        let mut report = RecalcReport::new();
        for id in self.graphs.propagation_order(changed) {
            if let Some(index) = self.index_of(id) {
                report.absorb(&self.recalc_column(index));
            }
        }
        report
    }

    // -- materialization and naming

    /// Materialize the column at `index` and every virtual column before
    /// it, so the realized prefix stays contiguous. Gap columns get
    /// generated names and keep their pre-assigned identities.
    fn realize_column(&mut self, index: usize) {
        let first = self.dataset.column_count();
        if index < first {
            return;
        }
        for i in first..=index {
            let base = default_name(i);
            let unique = self.unique_name(&base, None);
            let handle = self.dataset.append_column(&unique, None);
            debug_assert_eq!(handle, i);
            let id = self.columns[i].id();
            self.dataset.set_column_id(handle, id);
            self.columns[i].attach(handle);
        }
        self.re_pad();
    }

    fn name_taken(&self, name: &str, exclude: Option<usize>) -> bool {
        (0..self.dataset.column_count())
            .any(|h| exclude != Some(h) && self.dataset.name(h) == name)
    }

    fn unique_name(&self, base: &str, exclude: Option<usize>) -> String {
        if !self.name_taken(base, exclude) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base} ({n})");
            if !self.name_taken(&candidate, exclude) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Restore the trailing pad to exactly `N_VIRTUAL_COLS` virtual
    /// columns. Surplus pad columns are dropped; their identities are
    /// retired, never reused.
    fn re_pad(&mut self) {
        let target = self.dataset.column_count() + N_VIRTUAL_COLS;
        while self.columns.len() > target {
            let popped = self.columns.pop();
            debug_assert!(matches!(popped, Some(ref c) if c.is_virtual()));
        }
        while self.columns.len() < target {
            let index = self.columns.len();
            let id = self.alloc_id();
            self.columns.push(Column::new(id, index));
        }
        self.renumber();
    }

    /// Bring every column's position, and realized columns' handles, back
    /// in line with their array index.
    fn renumber(&mut self) {
        for (i, col) in self.columns.iter_mut().enumerate() {
            col.set_index(i);
            if !col.is_virtual() {
                col.set_handle(i);
            }
        }
    }

    // -- test support

    #[cfg(test)]
    fn column_deps(&self, index: usize) -> rustc_hash::FxHashSet<ColumnId> {
        self.graphs
            .column
            .dependencies(self.columns[index].id())
            .collect()
    }

    #[cfg(test)]
    fn row_deps(&self, index: usize) -> rustc_hash::FxHashSet<ColumnId> {
        self.graphs
            .row
            .dependencies(self.columns[index].id())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{empty_model, model_with_data, numbers};
    use rustc_hash::FxHashSet;

    #[test]
    fn test_default_name_sequence() {
        assert_eq!(default_name(0), "A");
        assert_eq!(default_name(1), "B");
        assert_eq!(default_name(25), "Z");
        assert_eq!(default_name(26), "AA");
        assert_eq!(default_name(27), "AB");
        assert_eq!(default_name(51), "AZ");
        assert_eq!(default_name(52), "BA");
        assert_eq!(default_name(701), "ZZ");
        assert_eq!(default_name(702), "AAA");
    }

    #[test]
    fn test_new_model_is_all_pad() {
        let model = empty_model();
        assert_eq!(model.column_count(), 0);
        assert_eq!(model.virtual_column_count(), N_VIRTUAL_COLS);
        assert_eq!(model.total_column_count(), N_VIRTUAL_COLS);
    }

    #[test]
    fn test_pad_restored_after_append() {
        let mut model = empty_model();
        model.append_column(Some("x"));
        model.append_column(Some("y"));
        assert_eq!(model.column_count(), 2);
        assert_eq!(model.virtual_column_count(), N_VIRTUAL_COLS);
    }

    #[test]
    fn test_identities_unique_and_never_reused() {
        let mut model = empty_model();
        model.append_column(Some("x"));
        model.append_column(Some("y"));
        let mut seen: FxHashSet<ColumnId> = model.columns().map(|c| c.id()).collect();
        assert_eq!(seen.len(), model.total_column_count());

        model.delete_columns(0, 1).unwrap();
        model.append_column(Some("z"));
        for col in model.columns() {
            // ids of the two deleted columns must not come back
            seen.insert(col.id());
        }
        assert_eq!(
            seen.len(),
            model.total_column_count() + 2,
            "delete/insert reused an identity"
        );
    }

    #[test]
    fn test_virtual_read_does_not_materialize() {
        let model = empty_model();
        assert_eq!(model.value(3, 10).unwrap(), Value::Int(INT_MISSING));
        assert_eq!(model.name(3).unwrap(), "");
        assert_eq!(model.measure_type(3).unwrap(), MeasureType::None);
        assert_eq!(model.dps(3).unwrap(), 0);
        assert!(model.levels(3).unwrap().is_empty());
        assert_eq!(model.column_count(), 0);
    }

    #[test]
    fn test_write_materializes_prefix_contiguously() {
        let mut model = empty_model();
        model.set_value(3, 0, Value::Number(1.0)).unwrap();
        assert_eq!(model.column_count(), 4);
        assert_eq!(model.virtual_column_count(), N_VIRTUAL_COLS);
        assert_eq!(model.name(0).unwrap(), "A");
        assert_eq!(model.name(1).unwrap(), "B");
        assert_eq!(model.name(2).unwrap(), "C");
        assert_eq!(model.name(3).unwrap(), "D");
        for (i, col) in model.columns().enumerate().take(4) {
            assert_eq!(col.handle(), Some(i));
        }
    }

    #[test]
    fn test_generated_name_collision_gets_suffix() {
        let mut model = empty_model();
        model.append_column(Some("AA"));
        // the generated name for position 26 is "AA", which is taken
        for _ in 0..26 {
            model.append_column(None);
        }
        assert_eq!(model.name(1).unwrap(), "B");
        assert_eq!(model.name(25).unwrap(), "Z");
        assert_eq!(model.name(26).unwrap(), "AA (2)");
    }

    #[test]
    fn test_rename_collision_gets_suffix() {
        let mut model = empty_model();
        model.append_column(Some("x"));
        model.append_column(Some("y"));
        model.set_name(1, "x").unwrap();
        assert_eq!(model.name(1).unwrap(), "x (2)");
    }

    #[test]
    fn test_formula_sum_scenario() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0, 3.0]), ("B", &[10.0, 20.0, 30.0])]);
        let c = model.append_column(Some("C"));
        model.set_formula(c, "A + B").unwrap();

        let col = model.column(c).unwrap();
        assert_eq!(col.formula_status(), FormulaStatus::Ok);
        assert_eq!(col.formula_message(), "");

        let a_id = model.column(0).unwrap().id();
        let b_id = model.column(1).unwrap().id();
        let deps = model.column_deps(c);
        assert!(deps.contains(&a_id) && deps.contains(&b_id));
        assert_eq!(model.row_deps(c), deps);

        assert_eq!(numbers(&model, c), vec![11.0, 22.0, 33.0]);
    }

    #[test]
    fn test_value_edit_propagates() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0]), ("B", &[10.0, 20.0])]);
        let c = model.append_column(Some("C"));
        model.set_formula(c, "A + B").unwrap();
        let report = model.set_value(0, 0, Value::Number(100.0)).unwrap();
        assert_eq!(report.columns_recomputed, 1);
        assert_eq!(numbers(&model, c), vec![110.0, 22.0]);
    }

    #[test]
    fn test_chain_propagation_in_order() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0])]);
        let b = model.append_column(Some("B"));
        model.set_formula(b, "A * 2").unwrap();
        let c = model.append_column(Some("C"));
        model.set_formula(c, "B + 1").unwrap();

        let report = model.set_value(0, 0, Value::Number(5.0)).unwrap();
        assert_eq!(report.columns_recomputed, 2);
        assert_eq!(numbers(&model, b), vec![10.0, 4.0]);
        assert_eq!(numbers(&model, c), vec![11.0, 5.0]);
    }

    #[test]
    fn test_set_formula_idempotent() {
        let mut model = model_with_data(&[("A", &[1.0])]);
        let b = model.append_column(Some("B"));
        model.set_formula(b, "A + 1").unwrap();
        let report = model.set_formula(b, "A + 1").unwrap();
        assert_eq!(report.columns_recomputed, 0);
        assert_eq!(report.rows_written, 0);
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut model = model_with_data(&[("A", &[1.0])]);
        model.set_formula(0, "A + 1").unwrap();
        let col = model.column(0).unwrap();
        assert_eq!(col.formula_status(), FormulaStatus::Error);
        assert_eq!(col.formula_message(), "Circular reference detected");
        assert!(model.column_deps(0).is_empty());
        assert!(model.row_deps(0).is_empty());
    }

    #[test]
    fn test_transitive_cycle_rejected() {
        let mut model = model_with_data(&[("A", &[1.0]), ("B", &[2.0])]);
        model.set_formula(1, "A + 1").unwrap();
        model.set_formula(0, "B * 2").unwrap();
        let col = model.column(0).unwrap();
        assert_eq!(col.formula_status(), FormulaStatus::Error);
        assert_eq!(col.formula_message(), "Circular reference detected");
        assert!(model.column_deps(0).is_empty());
    }

    #[test]
    fn test_syntax_error_fills_missing() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0])]);
        let b = model.append_column(Some("B"));
        model.set_formula(b, "1 +").unwrap();
        let col = model.column(b).unwrap();
        assert_eq!(col.formula_status(), FormulaStatus::Error);
        assert_eq!(col.formula_message(), "The formula is mis-specified");
        for row in 0..2 {
            assert!(model.value(b, row).unwrap().is_missing());
        }
    }

    #[test]
    fn test_unknown_name_message() {
        let mut model = model_with_data(&[("A", &[1.0])]);
        let b = model.append_column(Some("B"));
        model.set_formula(b, "nosuch + 1").unwrap();
        let col = model.column(b).unwrap();
        assert_eq!(col.formula_status(), FormulaStatus::Error);
        assert_eq!(col.formula_message(), "Column 'nosuch' does not exist");
    }

    #[test]
    fn test_clearing_formula_fills_missing() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0])]);
        let b = model.append_column(Some("B"));
        model.set_formula(b, "A * 2").unwrap();
        model.set_formula(b, "").unwrap();
        let col = model.column(b).unwrap();
        assert_eq!(col.formula_status(), FormulaStatus::Empty);
        assert!(model.column_deps(b).is_empty());
        for row in 0..2 {
            assert!(model.value(b, row).unwrap().is_missing());
        }
    }

    #[test]
    fn test_mean_centering_tracks_edits() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0, 3.0])]);
        let b = model.append_column(Some("B"));
        model.set_formula(b, "A - MEAN(A)").unwrap();
        assert_eq!(numbers(&model, b), vec![-1.0, 0.0, 1.0]);

        // the aggregate constant is refreshed on propagation
        model.set_value(0, 0, Value::Number(4.0)).unwrap();
        assert_eq!(numbers(&model, b), vec![1.0, -1.0, 0.0]);
    }

    #[test]
    fn test_missing_input_fails_row_only() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0, 3.0])]);
        model.clear_at(0, 1).unwrap();
        let b = model.append_column(Some("B"));
        let report = model.set_formula(b, "A * 2").unwrap();
        assert_eq!(report.rows_failed, 1);
        assert_eq!(model.value(b, 0).unwrap(), Value::Number(2.0));
        assert!(model.value(b, 1).unwrap().is_missing());
        assert_eq!(model.value(b, 2).unwrap(), Value::Number(6.0));
    }

    #[test]
    fn test_delete_dependency_severs_edges() {
        let mut model = model_with_data(&[("A", &[1.0]), ("B", &[10.0])]);
        let c = model.append_column(Some("C"));
        model.set_formula(c, "A + B").unwrap();
        let b_id = model.column(1).unwrap().id();

        model.delete_columns(1, 1).unwrap();
        let c = 1; // C shifted left
        assert_eq!(model.name(c).unwrap(), "C");
        assert!(!model.column_deps(c).contains(&b_id));
        assert!(!model.row_deps(c).contains(&b_id));
        assert_eq!(model.virtual_column_count(), N_VIRTUAL_COLS);
        // B now reads as missing, so C's rows fail to missing on recalc
        model.set_value(0, 0, Value::Number(2.0)).unwrap();
        assert!(model.value(c, 0).unwrap().is_missing());
    }

    #[test]
    fn test_delete_renumbers_positions() {
        let mut model = model_with_data(&[("x", &[1.0]), ("y", &[2.0]), ("z", &[3.0])]);
        model.delete_columns(0, 1).unwrap();
        assert_eq!(model.column_count(), 1);
        assert_eq!(model.name(0).unwrap(), "z");
        for (i, col) in model.columns().enumerate() {
            assert_eq!(col.index(), i);
        }
    }

    #[test]
    fn test_insert_column_shifts_right() {
        let mut model = model_with_data(&[("x", &[1.0]), ("y", &[2.0])]);
        let idx = model.insert_column(1, Some("mid")).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(model.name(0).unwrap(), "x");
        assert_eq!(model.name(1).unwrap(), "mid");
        assert_eq!(model.name(2).unwrap(), "y");
        assert_eq!(model.virtual_column_count(), N_VIRTUAL_COLS);
    }

    #[test]
    fn test_row_edits_do_not_recalc() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0])]);
        let b = model.append_column(Some("B"));
        model.set_formula(b, "A * 2").unwrap();
        // poke a stored value directly past the formula results to
        // detect an unwanted recalculation
        model.insert_rows(1, 1);
        assert_eq!(model.row_count(), 3);
        // the inserted row was not recomputed; it reads as missing
        assert!(model.value(b, 1).unwrap().is_missing());
        // the old results were shifted, not recomputed
        assert_eq!(model.value(b, 0).unwrap(), Value::Number(2.0));
        assert_eq!(model.value(b, 2).unwrap(), Value::Number(4.0));
    }

    #[test]
    fn test_rename_keeps_subscribers_working() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0])]);
        let b = model.append_column(Some("B"));
        model.set_formula(b, "A * 3").unwrap();
        model.set_name(0, "alpha").unwrap();
        assert_eq!(model.name(0).unwrap(), "alpha");
        assert_eq!(numbers(&model, b), vec![3.0, 6.0]);
        model.set_value(0, 0, Value::Number(10.0)).unwrap();
        assert_eq!(numbers(&model, b), vec![30.0, 6.0]);
    }

    #[test]
    fn test_set_value_extends_row_count() {
        let mut model = empty_model();
        model.set_value(0, 9, Value::Number(1.0)).unwrap();
        assert_eq!(model.row_count(), 10);
        assert_eq!(model.virtual_row_count(), 10 + N_VIRTUAL_ROWS);
    }

    #[test]
    fn test_column_by_name() {
        let mut model = empty_model();
        model.append_column(Some("weight"));
        assert!(model.column_by_name("weight").is_ok());
        assert!(matches!(
            model.column_by_name("height"),
            Err(LookupError::Name(_))
        ));
    }

    #[test]
    fn test_index_out_of_range() {
        let mut model = empty_model();
        let total = model.total_column_count();
        assert!(matches!(
            model.set_formula(total, "1"),
            Err(LookupError::Index(_))
        ));
        assert!(matches!(model.column(total), Err(LookupError::Index(_))));
    }

    #[test]
    fn test_change_batches_edits() {
        let mut model = model_with_data(&[("A", &[1.0, 2.0])]);
        let b = model.append_column(None);
        model
            .change(
                b,
                ColumnChanges {
                    name: Some("double".to_string()),
                    formula: Some("A * 2".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(model.name(b).unwrap(), "double");
        assert_eq!(numbers(&model, b), vec![2.0, 4.0]);
    }

    #[test]
    fn test_refresh_assigns_ids_and_pads() {
        use crate::memory::MemoryDataSet;
        use crate::storage::DataSource;

        let mut ds = MemoryDataSet::new();
        ds.append_column("x", Some("x_raw"));
        ds.append_column("y", None);
        ds.set_row_count(3);

        let model = InstanceModel::new(Box::new(ds));
        assert_eq!(model.column_count(), 2);
        assert_eq!(model.virtual_column_count(), N_VIRTUAL_COLS);
        assert_eq!(model.import_name(0).unwrap(), "x_raw");
        let x = model.column(0).unwrap().id();
        let y = model.column(1).unwrap().id();
        assert_ne!(x, y);
        assert_ne!(x.raw(), 0);
    }

    #[test]
    fn test_levels_round_trip() {
        let mut model = empty_model();
        let c = model.append_column(Some("group"));
        model.set_measure_type(c, MeasureType::Nominal).unwrap();
        model.insert_level(c, 1, "low").unwrap();
        model.insert_level(c, 2, "high").unwrap();
        assert_eq!(model.levels(c).unwrap().len(), 2);
        assert_eq!(model.value_for_label(c, "high").unwrap(), 2);
        assert_eq!(model.value_for_label(c, "absent").unwrap(), INT_MISSING);
        model.clear_levels(c).unwrap();
        assert!(model.levels(c).unwrap().is_empty());
    }

    #[test]
    fn test_edited_flag() {
        let mut model = empty_model();
        assert!(!model.is_edited());
        model.append_column(Some("x"));
        assert!(model.is_edited());
        model.set_edited(false);
        assert!(!model.is_edited());
    }
}
