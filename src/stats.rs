//! Transfer statistics types.

use std::time::{Duration, Instant};

/// Statistics for one batch of fetched items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStats {
    /// Number of items attempted.
    pub attempted: usize,
    /// Number of items fetched and packed or saved.
    pub succeeded: usize,
    /// Names of items that failed, in completion order.
    pub failed: Vec<String>,
    /// Total bytes fetched for successful items.
    pub total_bytes: u64,
    /// Total elapsed time for the batch.
    pub elapsed: Duration,
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferStats {
    /// Creates empty statistics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failed: Vec::new(),
            total_bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns the average throughput in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes as f64 / secs) as u64
        } else {
            0
        }
    }

    /// Returns true if at least one item succeeded.
    #[must_use]
    pub const fn made_progress(&self) -> bool {
        self.succeeded > 0
    }
}

/// Builder for accumulating statistics while a batch runs.
pub struct TransferStatsBuilder {
    attempted: usize,
    succeeded: usize,
    failed: Vec<String>,
    total_bytes: u64,
    start_time: Instant,
}

impl Default for TransferStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferStatsBuilder {
    /// Creates a builder; the clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failed: Vec::new(),
            total_bytes: 0,
            start_time: Instant::now(),
        }
    }

    /// Records a successful item of `bytes` bytes.
    pub const fn add_success(&mut self, bytes: u64) {
        self.attempted += 1;
        self.succeeded += 1;
        self.total_bytes += bytes;
    }

    /// Records a failed item.
    pub fn add_failure(&mut self, name: impl Into<String>) {
        self.attempted += 1;
        self.failed.push(name.into());
    }

    /// Number of items recorded so far.
    #[must_use]
    pub const fn completed(&self) -> usize {
        self.attempted
    }

    /// Builds the final statistics.
    #[must_use]
    pub fn build(self) -> TransferStats {
        TransferStats {
            attempted: self.attempted,
            succeeded: self.succeeded,
            failed: self.failed,
            total_bytes: self.total_bytes,
            elapsed: self.start_time.elapsed(),
        }
    }
}
