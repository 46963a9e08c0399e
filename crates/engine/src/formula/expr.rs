//! Expression trees for column formulas.
//!
//! Two tree shapes exist. The *column tree* ([`ColumnExpr`]) comes out of the
//! parser and describes the whole column, aggregates included. Lowering
//! evaluates the aggregates and substitutes them as constants, producing the
//! *row tree* ([`RowExpr`]) that recalculation evaluates once per row.

use rustc_hash::FxHashSet;

use crate::column::ColumnId;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
        }
    }
}

/// Row-wise functions, applied cell by cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFn {
    Abs,
    Ln,
    Log10,
    Sqrt,
    Exp,
}

impl RowFn {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            RowFn::Abs => v.abs(),
            RowFn::Ln => v.ln(),
            RowFn::Log10 => v.log10(),
            RowFn::Sqrt => v.sqrt(),
            RowFn::Exp => v.exp(),
        }
    }
}

/// Whole-column aggregate functions. These collapse a column to a single
/// number at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    Mean,
    Sum,
    Sd,
    Min,
    Max,
}

/// Parsed formula over whole columns.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpr {
    Number(f64),
    /// A bare name, not yet resolved against the model.
    Ident(String),
    /// A resolved reference. The name is kept for diagnostics.
    ColumnRef { id: ColumnId, name: String },
    Unary(Box<ColumnExpr>),
    Binary {
        op: BinaryOp,
        lhs: Box<ColumnExpr>,
        rhs: Box<ColumnExpr>,
    },
    RowFunc {
        f: RowFn,
        arg: Box<ColumnExpr>,
    },
    Agg {
        f: AggFn,
        arg: Box<ColumnExpr>,
    },
}

/// Lowered formula, evaluated once per row. Aggregates have already been
/// folded to `Number` nodes, so only row-granularity references remain.
#[derive(Debug, Clone, PartialEq)]
pub enum RowExpr {
    Number(f64),
    Cell(ColumnId),
    Unary(Box<RowExpr>),
    Binary {
        op: BinaryOp,
        lhs: Box<RowExpr>,
        rhs: Box<RowExpr>,
    },
    Func {
        f: RowFn,
        arg: Box<RowExpr>,
    },
}

/// The two dependency sets a compiled formula produces, by granularity.
///
/// Every reference is a column-granularity edge; references outside aggregate
/// arguments are additionally row-granularity edges, so the column set is a
/// superset of the row set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepSets {
    pub column: FxHashSet<ColumnId>,
    pub row: FxHashSet<ColumnId>,
}

impl DepSets {
    pub fn is_empty(&self) -> bool {
        self.column.is_empty() && self.row.is_empty()
    }

    /// All referenced columns regardless of granularity.
    pub fn union(&self) -> FxHashSet<ColumnId> {
        let mut all = self.column.clone();
        all.extend(self.row.iter().copied());
        all
    }
}
