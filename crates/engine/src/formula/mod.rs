//! Formula compilation pipeline.
//!
//! Stages, run in order by the model when formula text changes:
//!
//! 1. `parser::parse` — text to a whole-column expression tree
//! 2. `analyze::resolve_names` — bare names to explicit column references
//! 3. `analyze::extract_deps` — the two dependency sets
//! 4. `analyze::check` — semantic validation
//! 5. `analyze::lower` — aggregates evaluated and substituted, yielding the
//!    row-indexed tree
//! 6. `eval::evaluate` — one row of the row tree, during recalculation

pub mod analyze;
pub mod eval;
pub mod expr;
pub mod parser;
