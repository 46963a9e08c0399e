//! Static analysis and lowering of parsed formulas.
//!
//! Resolution turns bare names into column references, dependency
//! extraction splits references by granularity, checking enforces the
//! aggregate-argument rules, and lowering folds aggregates into constants
//! to produce the per-row tree.

use crate::column::ColumnId;
use crate::error::FormulaError;
use crate::formula::expr::{AggFn, ColumnExpr, DepSets, RowExpr};
use crate::value::Value;

/// Name resolution against whatever owns the columns.
pub trait NameLookup {
    fn resolve(&self, name: &str) -> Option<ColumnId>;
}

/// Read access to column cells, used when lowering aggregates.
pub trait ColumnValues {
    fn cell(&self, id: ColumnId, row: usize) -> Value;
    fn row_count(&self) -> usize;
}

/// Replace every `Ident` node with a `ColumnRef`. Fails on the first name
/// that doesn't resolve.
pub fn resolve_names(
    tree: &ColumnExpr,
    lookup: &dyn NameLookup,
) -> Result<ColumnExpr, FormulaError> {
    match tree {
        ColumnExpr::Number(n) => Ok(ColumnExpr::Number(*n)),
        ColumnExpr::Ident(name) => match lookup.resolve(name) {
            Some(id) => Ok(ColumnExpr::ColumnRef {
                id,
                name: name.clone(),
            }),
            None => Err(FormulaError::UnknownName(name.clone())),
        },
        ColumnExpr::ColumnRef { id, name } => Ok(ColumnExpr::ColumnRef {
            id: *id,
            name: name.clone(),
        }),
        ColumnExpr::Unary(inner) => Ok(ColumnExpr::Unary(Box::new(resolve_names(
            inner, lookup,
        )?))),
        ColumnExpr::Binary { op, lhs, rhs } => Ok(ColumnExpr::Binary {
            op: *op,
            lhs: Box::new(resolve_names(lhs, lookup)?),
            rhs: Box::new(resolve_names(rhs, lookup)?),
        }),
        ColumnExpr::RowFunc { f, arg } => Ok(ColumnExpr::RowFunc {
            f: *f,
            arg: Box::new(resolve_names(arg, lookup)?),
        }),
        ColumnExpr::Agg { f, arg } => Ok(ColumnExpr::Agg {
            f: *f,
            arg: Box::new(resolve_names(arg, lookup)?),
        }),
    }
}

/// Collect the referenced columns, split by granularity. Every reference
/// lands in the column set; references evaluated per row (those outside
/// aggregate arguments) additionally land in the row set, so the column
/// set is always a superset of the row set.
pub fn extract_deps(tree: &ColumnExpr) -> DepSets {
    let mut deps = DepSets::default();
    walk_deps(tree, false, &mut deps);
    deps
}

fn walk_deps(tree: &ColumnExpr, in_agg: bool, deps: &mut DepSets) {
    match tree {
        ColumnExpr::Number(_) | ColumnExpr::Ident(_) => {}
        ColumnExpr::ColumnRef { id, .. } => {
            deps.column.insert(*id);
            if !in_agg {
                deps.row.insert(*id);
            }
        }
        ColumnExpr::Unary(inner) => walk_deps(inner, in_agg, deps),
        ColumnExpr::Binary { lhs, rhs, .. } => {
            walk_deps(lhs, in_agg, deps);
            walk_deps(rhs, in_agg, deps);
        }
        ColumnExpr::RowFunc { arg, .. } => walk_deps(arg, in_agg, deps),
        ColumnExpr::Agg { arg, .. } => walk_deps(arg, true, deps),
    }
}

/// Semantic checks that the parser can't do. Aggregate arguments must be a
/// single column reference, so nesting and arithmetic inside them are
/// rejected here.
pub fn check(tree: &ColumnExpr) -> Result<(), FormulaError> {
    match tree {
        ColumnExpr::Number(_) | ColumnExpr::Ident(_) | ColumnExpr::ColumnRef { .. } => Ok(()),
        ColumnExpr::Unary(inner) => check(inner),
        ColumnExpr::Binary { lhs, rhs, .. } => {
            check(lhs)?;
            check(rhs)
        }
        ColumnExpr::RowFunc { arg, .. } => check(arg),
        ColumnExpr::Agg { arg, .. } => match arg.as_ref() {
            ColumnExpr::ColumnRef { .. } => Ok(()),
            _ => Err(FormulaError::Invalid(
                "Aggregate functions take a single column".to_string(),
            )),
        },
    }
}

/// Fold aggregates to constants and strip names, producing the row tree.
///
/// Aggregates skip missing cells. An aggregate over no usable cells (all
/// missing, or an empty column) lowers to NaN so dependent rows surface as
/// missing rather than zero.
pub fn lower(tree: &ColumnExpr, values: &dyn ColumnValues) -> Result<RowExpr, FormulaError> {
    match tree {
        ColumnExpr::Number(n) => Ok(RowExpr::Number(*n)),
        ColumnExpr::Ident(name) => Err(FormulaError::Internal(format!(
            "unresolved name '{name}' survived to lowering"
        ))),
        ColumnExpr::ColumnRef { id, .. } => Ok(RowExpr::Cell(*id)),
        ColumnExpr::Unary(inner) => Ok(RowExpr::Unary(Box::new(lower(inner, values)?))),
        ColumnExpr::Binary { op, lhs, rhs } => Ok(RowExpr::Binary {
            op: *op,
            lhs: Box::new(lower(lhs, values)?),
            rhs: Box::new(lower(rhs, values)?),
        }),
        ColumnExpr::RowFunc { f, arg } => Ok(RowExpr::Func {
            f: *f,
            arg: Box::new(lower(arg, values)?),
        }),
        ColumnExpr::Agg { f, arg } => {
            let id = match arg.as_ref() {
                ColumnExpr::ColumnRef { id, .. } => *id,
                _ => {
                    return Err(FormulaError::Internal(
                        "aggregate argument survived checking unnormalized".to_string(),
                    ))
                }
            };
            Ok(RowExpr::Number(aggregate(*f, id, values)))
        }
    }
}

fn aggregate(f: AggFn, id: ColumnId, values: &dyn ColumnValues) -> f64 {
    let mut nums = Vec::new();
    for row in 0..values.row_count() {
        let v = values.cell(id, row);
        if v.is_missing() {
            continue;
        }
        if let Some(n) = v.to_number() {
            nums.push(n);
        }
    }
    if nums.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = nums.iter().sum();
    match f {
        AggFn::Sum => sum,
        AggFn::Mean => sum / nums.len() as f64,
        AggFn::Sd => {
            if nums.len() < 2 {
                return f64::NAN;
            }
            let mean = sum / nums.len() as f64;
            let ss: f64 = nums.iter().map(|n| (n - mean) * (n - mean)).sum();
            (ss / (nums.len() - 1) as f64).sqrt()
        }
        AggFn::Min => nums.iter().copied().fold(f64::INFINITY, f64::min),
        AggFn::Max => nums.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}
