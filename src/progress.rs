//! The shared progress indicator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Trait for receiving progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait ProgressSink: Send + Sync {
    /// Called when a top-level operation starts.
    fn on_begin(&self, _label: &str) {}

    /// Called whenever the percentage rises.
    fn on_percent(&self, _percent: u8) {}

    /// Called when one item was fetched and packed or saved.
    fn on_item_complete(&self, _name: &str) {}

    /// Called when one item failed and was skipped.
    fn on_item_error(&self, _name: &str, _error: &str) {}

    /// Called once the operation has ended, successfully or not.
    fn on_finish(&self) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Percentage of `completed` out of `total`, in `0..=100`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn percent_of(completed: usize, total: usize) -> u8 {
    if total == 0 || completed >= total {
        return 100;
    }
    // completed < total, so the quotient is below 100
    (completed * 100 / total) as u8
}

/// The single progress value shared by every pipeline.
///
/// Within one operation the value never decreases: concurrent writers race
/// through `fetch_max`. [`begin`](Self::begin) resets it to 0 and
/// [`finish`](Self::finish) forces it to 100.
pub struct ProgressReporter {
    percent: AtomicU8,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressReporter {
    /// Creates a reporter forwarding to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            percent: AtomicU8::new(0),
            sink,
        }
    }

    /// Current percentage.
    #[must_use]
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Starts a new top-level operation at 0%.
    pub fn begin(&self, label: &str) {
        self.percent.store(0, Ordering::Relaxed);
        self.sink.on_begin(label);
        self.sink.on_percent(0);
    }

    /// Raises the indicator to `percent`; lower values are ignored.
    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.percent.fetch_max(percent, Ordering::Relaxed);
        if percent > previous {
            self.sink.on_percent(percent);
        }
    }

    /// Reports `completed` out of `total` items.
    pub fn advance(&self, completed: usize, total: usize) {
        self.report(percent_of(completed, total));
    }

    /// Forwards an item success.
    pub fn item_complete(&self, name: &str) {
        self.sink.on_item_complete(name);
    }

    /// Forwards an item failure.
    pub fn item_error(&self, name: &str, error: &str) {
        self.sink.on_item_error(name, error);
    }

    /// Ends the operation at 100%, whatever the last computed ratio was.
    pub fn finish(&self) {
        self.report(100);
        self.sink.on_finish();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(Arc::new(NoProgress))
    }
}
