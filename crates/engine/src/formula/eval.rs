//! Row-tree evaluation.

use crate::column::ColumnId;
use crate::error::EvalError;
use crate::formula::expr::RowExpr;

/// Cell access during evaluation, keyed by stable column id.
pub trait ValueLookup {
    fn cell(&self, id: ColumnId, row: usize) -> crate::value::Value;
}

/// Evaluate one row of a lowered formula.
///
/// A missing or non-numeric operand fails the row; the caller stores the
/// target's missing sentinel for it and moves on. Division by zero follows
/// IEEE semantics and is not an error here.
pub fn evaluate(tree: &RowExpr, row: usize, values: &dyn ValueLookup) -> Result<f64, EvalError> {
    match tree {
        RowExpr::Number(n) => Ok(*n),
        RowExpr::Cell(id) => {
            let v = values.cell(*id, row);
            if v.is_missing() {
                return Err(EvalError::NotNumeric);
            }
            v.to_number().ok_or(EvalError::NotNumeric)
        }
        RowExpr::Unary(inner) => Ok(-evaluate(inner, row, values)?),
        RowExpr::Binary { op, lhs, rhs } => {
            let l = evaluate(lhs, row, values)?;
            let r = evaluate(rhs, row, values)?;
            Ok(op.apply(l, r))
        }
        RowExpr::Func { f, arg } => Ok(f.apply(evaluate(arg, row, values)?)),
    }
}
