pub mod column;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod memory;
pub mod model;
pub mod recalc;
pub mod storage;
pub mod value;

#[cfg(test)]
pub mod harness;
