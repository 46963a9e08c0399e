//! Recalculation reporting.
//!
//! A recalculation walks computed columns in propagation order and
//! re-evaluates their row trees. The report is a small summary of one
//! such walk, suitable for logging or a status line.

/// Report from one recalculation pass.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    /// Computed columns that were re-evaluated.
    pub columns_recomputed: usize,

    /// Total rows written across all recomputed columns.
    pub rows_written: usize,

    /// Rows whose evaluation failed and received a missing value instead.
    pub rows_failed: usize,
}

impl RecalcReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, other: &RecalcReport) {
        self.columns_recomputed += other.columns_recomputed;
        self.rows_written += other.rows_written;
        self.rows_failed += other.rows_failed;
    }

    /// Concise one-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "{} columns, {} rows, {} failed",
            self.columns_recomputed, self.rows_written, self.rows_failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_summary() {
        let report = RecalcReport {
            columns_recomputed: 2,
            rows_written: 100,
            rows_failed: 3,
        };
        assert_eq!(report.summary(), "2 columns, 100 rows, 3 failed");
    }

    #[test]
    fn test_report_absorb() {
        let mut total = RecalcReport::new();
        total.absorb(&RecalcReport {
            columns_recomputed: 1,
            rows_written: 10,
            rows_failed: 0,
        });
        total.absorb(&RecalcReport {
            columns_recomputed: 1,
            rows_written: 10,
            rows_failed: 2,
        });
        assert_eq!(total.columns_recomputed, 2);
        assert_eq!(total.rows_written, 20);
        assert_eq!(total.rows_failed, 2);
    }
}
