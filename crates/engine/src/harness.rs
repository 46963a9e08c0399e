//! Test harness: model builders shared across the engine's test modules.

use crate::memory::MemoryDataSet;
use crate::model::InstanceModel;
use crate::value::Value;

/// A model over a fresh in-memory dataset: no realized columns, no rows.
pub fn empty_model() -> InstanceModel {
    InstanceModel::new(Box::new(MemoryDataSet::new()))
}

/// A model with one realized data column per `(name, values)` pair.
pub fn model_with_data(columns: &[(&str, &[f64])]) -> InstanceModel {
    let mut model = empty_model();
    for (name, values) in columns {
        let index = model.append_column(Some(name));
        for (row, v) in values.iter().enumerate() {
            model
                .set_value(index, row, Value::Number(*v))
                .unwrap_or_else(|e| panic!("seeding {name}[{row}]: {e}"));
        }
    }
    model
}

/// A column's stored values as f64s, for compact assertions. Panics on a
/// non-numeric cell.
pub fn numbers(model: &InstanceModel, index: usize) -> Vec<f64> {
    (0..model.row_count())
        .map(|row| {
            let v = model.value(index, row).unwrap();
            v.to_number()
                .unwrap_or_else(|| panic!("non-numeric cell at [{index}][{row}]: {v:?}"))
        })
        .collect()
}
