//! CSV loading and formula-spec parsing for the CLI commands.

use std::path::Path;

use statgrid_engine::memory::MemoryDataSet;
use statgrid_engine::model::InstanceModel;
use statgrid_engine::value::Value;

/// A `name=expression` pair from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaSpec {
    pub name: String,
    pub text: String,
}

/// Parse a `--formula` argument. The expression may itself contain `=`;
/// only the first one splits.
pub fn parse_formula_spec(spec: &str) -> Result<FormulaSpec, String> {
    match spec.split_once('=') {
        Some((name, text)) if !name.trim().is_empty() && !text.trim().is_empty() => {
            Ok(FormulaSpec {
                name: name.trim().to_string(),
                text: text.trim().to_string(),
            })
        }
        _ => Err(format!(
            "invalid formula spec '{spec}' (expected name=expression)"
        )),
    }
}

/// Load a CSV with a header row into a fresh in-memory model. Cell text
/// goes through the usual input coercion: integer, then number, then text.
pub fn load_csv(path: &Path) -> Result<InstanceModel, String> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("{}: {e}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut model = InstanceModel::new(Box::new(MemoryDataSet::new()));
    let indices: Vec<usize> = headers
        .iter()
        .map(|name| model.append_column(Some(name)))
        .collect();

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("{} row {}: {e}", path.display(), row + 2))?;
        for (i, field) in record.iter().enumerate() {
            if let Some(&index) = indices.get(i) {
                model
                    .set_value(index, row, Value::from_input(field))
                    .map_err(|e| e.to_string())?;
            }
        }
    }
    model.set_path(path.display().to_string());
    model.set_edited(false);
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_formula_spec() {
        let spec = parse_formula_spec("total=A + B").unwrap();
        assert_eq!(spec.name, "total");
        assert_eq!(spec.text, "A + B");
    }

    #[test]
    fn test_parse_formula_spec_keeps_later_equals() {
        // only the first '=' splits
        let spec = parse_formula_spec("flag=x=1").unwrap();
        assert_eq!(spec.name, "flag");
        assert_eq!(spec.text, "x=1");
    }

    #[test]
    fn test_parse_formula_spec_rejects_bad_input() {
        assert!(parse_formula_spec("no_equals").is_err());
        assert!(parse_formula_spec("=expr").is_err());
        assert!(parse_formula_spec("name=").is_err());
    }

    #[test]
    fn test_load_csv_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "A,B,label").unwrap();
        writeln!(file, "1,2.5,x").unwrap();
        writeln!(file, "3,,y").unwrap();
        file.flush().unwrap();

        let model = load_csv(file.path()).unwrap();
        assert_eq!(model.column_count(), 3);
        assert_eq!(model.row_count(), 2);
        assert_eq!(model.name(0).unwrap(), "A");
        assert_eq!(model.value(0, 0).unwrap(), Value::Int(1));
        assert_eq!(model.value(1, 0).unwrap(), Value::Number(2.5));
        assert!(model.value(1, 1).unwrap().is_missing());
        assert_eq!(model.value(2, 1).unwrap(), Value::Text("y".into()));
        assert!(!model.is_edited());
    }
}
