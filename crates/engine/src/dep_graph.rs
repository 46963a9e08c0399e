//! Dependency graphs for computed columns.
//!
//! Tracks, per column, the columns its formula references (dependencies)
//! and the columns whose formulas reference it (subscribers).
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "A's formula references B"  (B is a dependency of A)
//! ```
//!
//! Two granularities exist: whole-column references (aggregates) and
//! per-row references. Each is one `DepGraph`; `ColumnGraphs` holds both so
//! the bidirectional bookkeeping is written once, not four times.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::column::ColumnId;

/// One directed dependency multigraph, keyed by stable column identity.
///
/// Maintains bidirectional adjacency for O(1) lookups:
/// - `deps[A]` = columns A's formula references
/// - `subs[B]` = columns whose formulas reference B
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If B ∈ deps[A] then A ∈ subs[B], and
///    vice versa.
/// 2. **No dangling entries:** Empty sets are removed, not stored.
/// 3. **Atomic updates:** `replace_edges` is the only mutator that touches
///    both maps (besides `remove_column`, which severs both directions).
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    deps: FxHashMap<ColumnId, FxHashSet<ColumnId>>,
    subs: FxHashMap<ColumnId, FxHashSet<ColumnId>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns this column's formula references.
    pub fn dependencies(&self, column: ColumnId) -> impl Iterator<Item = ColumnId> + '_ {
        self.deps
            .get(&column)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Columns whose formulas reference this column (the subscriber set).
    pub fn subscribers(&self, column: ColumnId) -> impl Iterator<Item = ColumnId> + '_ {
        self.subs
            .get(&column)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    pub fn has_dependencies(&self, column: ColumnId) -> bool {
        self.deps.contains_key(&column)
    }

    pub fn has_subscribers(&self, column: ColumnId) -> bool {
        self.subs.contains_key(&column)
    }

    /// Replace all outgoing edges for a column atomically.
    ///
    /// 1. Removes the column from all its old dependencies' subscriber sets
    /// 2. Clears the column's dependency set
    /// 3. Adds the column to all new dependencies' subscriber sets
    /// 4. Stores the new dependency set
    ///
    /// Pass an empty set to unsubscribe the column entirely.
    pub fn replace_edges(&mut self, column: ColumnId, new_deps: FxHashSet<ColumnId>) {
        if let Some(old_deps) = self.deps.remove(&column) {
            for dep in old_deps {
                if let Some(subs) = self.subs.get_mut(&dep) {
                    subs.remove(&column);
                    if subs.is_empty() {
                        self.subs.remove(&dep);
                    }
                }
            }
        }

        if new_deps.is_empty() {
            return;
        }

        for dep in &new_deps {
            self.subs.entry(*dep).or_default().insert(column);
        }
        self.deps.insert(column, new_deps);
    }

    /// Clear all outgoing edges for a column (formula removed).
    pub fn clear_column(&mut self, column: ColumnId) {
        self.replace_edges(column, FxHashSet::default());
    }

    /// Sever every edge touching this column, in both directions.
    ///
    /// Called when a column is deleted: its subscribers lose it from their
    /// dependency sets, its dependencies lose it from their subscriber
    /// sets. No partner is left with a dangling reference to the freed id.
    pub fn remove_column(&mut self, column: ColumnId) {
        self.clear_column(column);

        if let Some(subscribers) = self.subs.remove(&column) {
            for sub in subscribers {
                if let Some(deps) = self.deps.get_mut(&sub) {
                    deps.remove(&column);
                    if deps.is_empty() {
                        self.deps.remove(&sub);
                    }
                }
            }
        }
    }

    /// Check all invariants. Panics if any are violated.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (column, deps) in &self.deps {
            for dep in deps {
                assert!(
                    self.subs.get(dep).is_some_and(|s| s.contains(column)),
                    "Missing sub edge: {:?} should have {:?} in subscribers",
                    dep,
                    column
                );
            }
        }
        for (column, subs) in &self.subs {
            for sub in subs {
                assert!(
                    self.deps.get(sub).is_some_and(|s| s.contains(column)),
                    "Missing dep edge: {:?} should have {:?} in dependencies",
                    sub,
                    column
                );
            }
        }
        for (column, deps) in &self.deps {
            assert!(!deps.is_empty(), "Empty deps set stored for {:?}", column);
        }
        for (column, subs) in &self.subs {
            assert!(!subs.is_empty(), "Empty subs set stored for {:?}", column);
        }
    }
}

/// The two dependency graphs of the model: whole-column granularity and
/// per-row granularity. Cycle probing and propagation ordering operate on
/// the union of both, since a cycle through mixed granularities is still a
/// cycle.
#[derive(Default, Debug, Clone)]
pub struct ColumnGraphs {
    pub column: DepGraph,
    pub row: DepGraph,
}

impl ColumnGraphs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a column's extracted dependency sets into both graphs.
    pub fn install(
        &mut self,
        column: ColumnId,
        column_deps: FxHashSet<ColumnId>,
        row_deps: FxHashSet<ColumnId>,
    ) {
        self.column.replace_edges(column, column_deps);
        self.row.replace_edges(column, row_deps);
    }

    /// Unsubscribe a column from everything it references, both graphs.
    pub fn clear_column(&mut self, column: ColumnId) {
        self.column.clear_column(column);
        self.row.clear_column(column);
    }

    /// Sever every edge touching a deleted column, both graphs.
    pub fn remove_column(&mut self, column: ColumnId) {
        self.column.remove_column(column);
        self.row.remove_column(column);
    }

    /// Direct subscribers of a column across both granularities.
    pub fn subscribers_union(&self, column: ColumnId) -> FxHashSet<ColumnId> {
        self.column
            .subscribers(column)
            .chain(self.row.subscribers(column))
            .collect()
    }

    fn dependencies_union(&self, column: ColumnId) -> FxHashSet<ColumnId> {
        self.column
            .dependencies(column)
            .chain(self.row.dependencies(column))
            .collect()
    }

    /// Would wiring `column` to `new_deps` close a cycle?
    ///
    /// True if `new_deps` contains `column` itself, or if any member of
    /// `new_deps` already depends on `column` transitively. The probe walks
    /// subscriber edges from `column` over the union graph; reaching any
    /// would-be dependency means dep → ... → column → dep.
    pub fn would_create_cycle(&self, column: ColumnId, new_deps: &FxHashSet<ColumnId>) -> bool {
        if new_deps.contains(&column) {
            return true;
        }

        let mut visited = FxHashSet::default();
        let mut stack = vec![column];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for sub in self
                .column
                .subscribers(current)
                .chain(self.row.subscribers(current))
            {
                if new_deps.contains(&sub) {
                    return true;
                }
                stack.push(sub);
            }
        }
        false
    }

    /// Recalculation order for everything downstream of a changed column.
    ///
    /// Collects the transitive subscriber closure (the changed column
    /// excluded), then orders it with Kahn's algorithm over the union
    /// graph restricted to the closure, ties broken by ascending identity
    /// for determinism. Compilation rejects cycles, so the closure is
    /// acyclic; should one slip through anyway, the leftover columns are
    /// appended once in identity order rather than looping.
    pub fn propagation_order(&self, changed: ColumnId) -> Vec<ColumnId> {
        // Transitive closure of subscribers.
        let mut affected: FxHashSet<ColumnId> = FxHashSet::default();
        let mut stack: Vec<ColumnId> = self.subscribers_union(changed).into_iter().collect();
        while let Some(current) = stack.pop() {
            if !affected.insert(current) {
                continue;
            }
            stack.extend(self.subscribers_union(current));
        }
        if affected.is_empty() {
            return Vec::new();
        }

        // Kahn over the closure: in-degree counts only edges to other
        // affected columns.
        let mut in_degree: FxHashMap<ColumnId, usize> = FxHashMap::default();
        for &col in &affected {
            let degree = self
                .dependencies_union(col)
                .iter()
                .filter(|d| affected.contains(d))
                .count();
            in_degree.insert(col, degree);
        }

        let mut queue: Vec<ColumnId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&col, _)| col)
            .collect();
        queue.sort_unstable_by(|a, b| b.cmp(a)); // smallest id popped first

        let mut order = Vec::with_capacity(affected.len());
        while let Some(col) = queue.pop() {
            order.push(col);
            let mut released = Vec::new();
            for sub in self.subscribers_union(col) {
                if let Some(deg) = in_degree.get_mut(&sub) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        released.push(sub);
                    }
                }
            }
            released.sort_unstable();
            for col in released.into_iter().rev() {
                queue.push(col);
            }
        }

        // Bounded fallback: anything not ordered (a cycle that escaped
        // compile-time rejection) gets one pass in identity order.
        if order.len() < affected.len() {
            let mut leftover: Vec<ColumnId> = affected
                .iter()
                .filter(|c| !order.contains(c))
                .copied()
                .collect();
            leftover.sort_unstable();
            order.extend(leftover);
        }

        order
    }

    #[cfg(test)]
    pub fn assert_consistent(&self) {
        self.column.assert_consistent();
        self.row.assert_consistent();
    }
}
