//! Parameter-bounded batch planning for bulk writes.
//!
//! Backends that cap the number of bound parameters per statement (SQLite:
//! 999) force multi-row writes to split. The planner computes the largest
//! row count per statement such that `rows * fields` stays under the cap,
//! clamped by any caller override, and splits the input into consecutive
//! batches preserving order.

use relwrite_core::BackendFeatures;

/// Default rows per statement on backends without a parameter cap.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Compute the batch size for rows of `num_fields` bound parameters each.
///
/// Never returns zero: a single row always forms a batch even when one row
/// exceeds the cap on its own (the backend will reject it with its own
/// error, which is more informative than an empty write).
#[must_use]
pub fn batch_size(
    num_fields: usize,
    features: &BackendFeatures,
    max_batch_size: Option<usize>,
) -> usize {
    let cap = match features.max_query_params {
        Some(max_params) if num_fields > 0 => (max_params / num_fields).max(1),
        _ => DEFAULT_BATCH_SIZE,
    };
    match max_batch_size {
        Some(requested) => requested.clamp(1, cap),
        None => cap,
    }
}

/// A batch plan over `total_rows` pending rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    /// Rows per statement.
    pub batch_size: usize,
    /// Total rows across all batches.
    pub total_rows: usize,
}

impl BatchPlan {
    /// Plan batches for `total_rows` rows of `num_fields` parameters each.
    #[must_use]
    pub fn plan(
        total_rows: usize,
        num_fields: usize,
        features: &BackendFeatures,
        max_batch_size: Option<usize>,
    ) -> Self {
        Self {
            batch_size: batch_size(num_fields, features, max_batch_size),
            total_rows,
        }
    }

    /// Number of statements the plan will issue.
    #[must_use]
    pub fn num_batches(&self) -> usize {
        self.total_rows.div_ceil(self.batch_size)
    }

    /// Split a slice into the planned consecutive batches.
    pub fn split<'a, T>(&self, items: &'a [T]) -> impl Iterator<Item = &'a [T]> {
        items.chunks(self.batch_size)
    }
}
