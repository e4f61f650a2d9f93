//! Splitting a candidate-index range into one contiguous slice per worker.

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Half-open slice `[start, end)` of candidate indices assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRange {
    pub start: u64,
    pub end: u64,
}

impl WorkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn indices(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// Partition `[0, total)` into `workers` ranges.
///
/// Every range has `total / workers` elements except the last, which also
/// takes the remainder.
pub fn partition(total: u64, workers: usize) -> Result<Vec<WorkRange>, PartitionError> {
    partition_range(0..total, workers)
}

/// Partition an arbitrary window the same way as [`partition`]
pub fn partition_range(window: Range<u64>, workers: usize) -> Result<Vec<WorkRange>, PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }

    let start = window.start;
    let end = window.end.max(start);
    let chunk = (end - start) / workers as u64;

    let mut ranges: Vec<WorkRange> = (0..workers as u64)
        .map(|i| WorkRange {
            start: start + i * chunk,
            end: start + (i + 1) * chunk,
        })
        .collect();

    if let Some(last) = ranges.last_mut() {
        last.end = end;
    }

    Ok(ranges)
}
