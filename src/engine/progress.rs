//! Progress reporting: periodic log lines with an ETA, and an optional progress bar.

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::tools::format_duration;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a progress bar over `total` checkpoints.
pub fn create_progress_bar(total: usize, desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = total,
        desc = desc,
        animation = Animation::Classic,
        unit = " checkpoints"
    )))
}

/// Update progress bar if available
/// Uses try_lock to avoid blocking if mutex is contended (non-blocking)
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    // If lock is contended, skip update (progress bar will catch up on next update)
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Set the bar to an absolute position (used to catch up skipped updates at the end).
pub fn set_bar_position(pb: &ProgressBar, n: usize) {
    if let Ok(mut bar) = pb.lock() {
        let _ = bar.update_to(n);
    }
}

/// Remaining time assuming the rate so far holds: `elapsed * total / processed - elapsed`.
pub fn estimate_remaining(elapsed: Duration, processed: u64, total: u64) -> Duration {
    if processed == 0 || processed >= total {
        return Duration::ZERO;
    }
    let projected = elapsed.as_secs_f64() * total as f64 / processed as f64;
    Duration::from_secs_f64((projected - elapsed.as_secs_f64()).max(0.0))
}

/// Progress log line, e.g. `Reading checkpoints... - 12.50% - elapsed: 1m4s, remaining: 7m28s`.
pub fn progress_line(processed: u64, total: u64, elapsed: Duration) -> String {
    let percent = if total == 0 {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    };
    format!(
        "Reading checkpoints... - {:.2}% - elapsed: {}, remaining: {}",
        percent,
        format_duration(elapsed),
        format_duration(estimate_remaining(elapsed, processed, total))
    )
}
