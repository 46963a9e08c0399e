// statgrid CLI - headless operations on tabular models

mod exit_codes;
mod load;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use statgrid_engine::column::FormulaStatus;
use statgrid_engine::model::InstanceModel;
use statgrid_engine::value::Value;

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use load::{load_csv, parse_formula_spec};

#[derive(Parser)]
#[command(name = "sgrid")]
#[command(about = "Headless operations on statgrid tabular models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a CSV as a grid
    #[command(after_help = "\
Examples:
  sgrid show data.csv
  sgrid show data.csv --rows 10 --pad")]
    Show {
        /// Input CSV file with a header row
        input: PathBuf,

        /// Print at most this many rows
        #[arg(long)]
        rows: Option<usize>,

        /// Include the trailing virtual pad columns
        #[arg(long)]
        pad: bool,
    },

    /// Attach computed columns and print the recalculated grid
    #[command(after_help = "\
Examples:
  sgrid compute data.csv --formula 'total=A + B'
  sgrid compute data.csv -F 'z=(A - MEAN(A)) / SD(A)' --json")]
    Compute {
        /// Input CSV file with a header row
        input: PathBuf,

        /// Computed column as name=expression (repeatable)
        #[arg(long = "formula", short = 'F', required = true)]
        formulas: Vec<String>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Column metadata listing
    Info {
        /// Input CSV file with a header row
        input: PathBuf,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Show { input, rows, pad } => cmd_show(&input, rows, pad),
        Commands::Compute {
            input,
            formulas,
            json,
        } => cmd_compute(&input, &formulas, json),
        Commands::Info { input, json } => cmd_info(&input, json),
    };
    ExitCode::from(code)
}

fn cmd_show(input: &Path, rows: Option<usize>, pad: bool) -> u8 {
    let model = match load_csv(input) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("sgrid: {e}");
            return EXIT_USAGE;
        }
    };
    print_grid(&model, rows, pad);
    EXIT_SUCCESS
}

fn cmd_compute(input: &Path, formulas: &[String], json: bool) -> u8 {
    let mut model = match load_csv(input) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("sgrid: {e}");
            return EXIT_USAGE;
        }
    };

    let mut computed = Vec::new();
    for spec in formulas {
        let spec = match parse_formula_spec(spec) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("sgrid: {e}");
                return EXIT_USAGE;
            }
        };
        let index = model.append_column(Some(&spec.name));
        if let Err(e) = model.set_formula(index, &spec.text) {
            eprintln!("sgrid: {e}");
            return EXIT_ERROR;
        }
        computed.push(index);
    }

    let mut failed = false;
    for &index in &computed {
        let col = match model.column(index) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("sgrid: {e}");
                return EXIT_ERROR;
            }
        };
        if col.formula_status() == FormulaStatus::Error {
            failed = true;
            let name = model.name(index).unwrap_or("");
            eprintln!("sgrid: {name}: {}", col.formula_message());
        }
    }

    if json {
        match compute_json(&model, &computed) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("sgrid: {e}");
                return EXIT_ERROR;
            }
        }
    } else {
        print_grid(&model, None, false);
    }

    if failed {
        EXIT_ERROR
    } else {
        EXIT_SUCCESS
    }
}

#[derive(Serialize)]
struct ComputedColumn {
    name: String,
    formula: String,
    status: String,
    message: String,
    values: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct ComputeOutput {
    rows: usize,
    columns: Vec<ComputedColumn>,
}

fn compute_json(model: &InstanceModel, computed: &[usize]) -> Result<String, String> {
    let mut columns = Vec::new();
    for &index in computed {
        let col = model.column(index).map_err(|e| e.to_string())?;
        let values = (0..model.row_count())
            .map(|row| {
                model
                    .value(index, row)
                    .map(|v| value_to_json(&v))
                    .map_err(|e| e.to_string())
            })
            .collect::<Result<Vec<_>, _>>()?;
        columns.push(ComputedColumn {
            name: model.name(index).map_err(|e| e.to_string())?.to_string(),
            formula: col.formula().to_string(),
            status: format!("{:?}", col.formula_status()),
            message: col.formula_message().to_string(),
            values,
        });
    }
    let out = ComputeOutput {
        rows: model.row_count(),
        columns,
    };
    serde_json::to_string_pretty(&out).map_err(|e| e.to_string())
}

fn value_to_json(value: &Value) -> serde_json::Value {
    if value.is_missing() {
        return serde_json::Value::Null;
    }
    match value {
        Value::Int(i) => serde_json::json!(i),
        Value::Number(n) => serde_json::json!(n),
        Value::Text(s) => serde_json::json!(s),
    }
}

fn cmd_info(input: &Path, json: bool) -> u8 {
    let model = match load_csv(input) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("sgrid: {e}");
            return EXIT_USAGE;
        }
    };

    if json {
        #[derive(Serialize)]
        struct ColumnInfo {
            name: String,
            column_type: String,
            measure_type: String,
            dps: u8,
            levels: usize,
        }
        #[derive(Serialize)]
        struct Info {
            path: String,
            rows: usize,
            columns: Vec<ColumnInfo>,
        }
        let columns = (0..model.column_count())
            .map(|i| ColumnInfo {
                name: model.name(i).unwrap_or("").to_string(),
                column_type: format!("{:?}", model.column_type(i).unwrap_or_default()),
                measure_type: format!("{:?}", model.measure_type(i).unwrap_or_default()),
                dps: model.dps(i).unwrap_or(0),
                levels: model.levels(i).map(<[_]>::len).unwrap_or(0),
            })
            .collect();
        let info = Info {
            path: model.path().to_string(),
            rows: model.row_count(),
            columns,
        };
        match serde_json::to_string_pretty(&info) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("sgrid: {e}");
                return EXIT_ERROR;
            }
        }
    } else {
        println!("{}", model.path());
        println!(
            "{} columns, {} rows ({} with virtual pad)",
            model.column_count(),
            model.row_count(),
            model.total_column_count(),
        );
        for i in 0..model.column_count() {
            println!(
                "  {:<16} {:?} / {:?}  dps={}",
                model.name(i).unwrap_or(""),
                model.column_type(i).unwrap_or_default(),
                model.measure_type(i).unwrap_or_default(),
                model.dps(i).unwrap_or(0),
            );
        }
    }
    EXIT_SUCCESS
}

/// Tab-separated grid, decimal places applied. Virtual pad columns print
/// as `.` placeholders when requested.
fn print_grid(model: &InstanceModel, rows: Option<usize>, pad: bool) {
    let cols = if pad {
        model.total_column_count()
    } else {
        model.column_count()
    };
    let limit = rows.unwrap_or(usize::MAX).min(model.row_count());

    let header: Vec<String> = (0..cols)
        .map(|i| {
            let name = model.name(i).unwrap_or("");
            if name.is_empty() {
                ".".to_string()
            } else {
                name.to_string()
            }
        })
        .collect();
    println!("{}", header.join("\t"));

    for row in 0..limit {
        let line: Vec<String> = (0..cols)
            .map(|i| {
                let dps = model.dps(i).unwrap_or(0);
                match model.value(i, row) {
                    Ok(v) => v.display(dps),
                    Err(_) => String::new(),
                }
            })
            .collect();
        println!("{}", line.join("\t"));
    }
}
