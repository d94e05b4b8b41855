//! Progress tracking for retrieval and export
//!
//! This module provides progress bar and statistics tracking for long-running
//! fetch and export operations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for record processing
///
/// The total is often only known after the first page arrives, so the bar
/// starts as a spinner and switches to a bounded bar on [`set_total`](Self::set_total).
pub struct ProgressTracker {
    /// Number of records processed so far
    processed: AtomicU64,
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
    /// Label shown next to the counter
    label: &'static str,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `label` - What is being counted (e.g. "records fetched")
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(label: &'static str, enable_bar: bool) -> Self {
        let bar = if enable_bar {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {pos} {msg}") {
                bar.set_style(style);
            }
            Some(bar)
        } else {
            None
        };

        Self {
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
            bar,
            label,
        }
    }

    /// A tracker that never draws
    pub fn hidden() -> Self {
        Self::new("", false)
    }

    /// Switch to a bounded bar once the total is known
    pub fn set_total(&self, total: u64) {
        if let Some(ref bar) = self.bar {
            if bar.length() != Some(total) {
                bar.set_length(total);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                {
                    bar.set_style(style.progress_chars("#>-"));
                }
            }
        }
    }

    /// Update progress with new count
    ///
    /// # Arguments
    /// * `count` - Total number of records processed so far
    pub fn update(&self, count: u64) {
        self.processed.store(count, Ordering::Relaxed);

        if let Some(ref bar) = self.bar {
            bar.set_position(count);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = count as f64 / elapsed;
                bar.set_message(format!("{} ({:.0}/sec)", self.label, speed));
            }
        }
    }

    /// Records processed so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker_counts() {
        let tracker = ProgressTracker::new("records fetched", false);
        tracker.set_total(1000);
        tracker.update(500);
        assert_eq!(tracker.processed(), 500);
        tracker.finish();
    }

    #[test]
    fn test_hidden_tracker() {
        let tracker = ProgressTracker::hidden();
        tracker.update(3);
        assert_eq!(tracker.processed(), 3);
    }
}
