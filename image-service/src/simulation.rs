//! Simulated image work.
//!
//! Nothing here touches an image. [`simulate_work`] burns CPU for a wall-clock
//! budget so the service behaves like a CPU-bound processor under load; the
//! "pixel" count is just the number of loop iterations it managed.

use std::time::{Duration, Instant};

/// Outcome of one simulated processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkReport {
    pub pixels: u64,
    pub elapsed: Duration,
}

/// Spins until `duration_ms` of wall-clock time has passed.
///
/// Never yields; run it on a blocking thread. A budget of zero or less does
/// no iterations at all.
pub fn simulate_work(duration_ms: i64) -> WorkReport {
    let start = Instant::now();
    let budget = Duration::from_millis(duration_ms.max(0).unsigned_abs());

    let mut x: f64 = 0.0001;
    let mut pixels: u64 = 0;
    while start.elapsed() < budget {
        x += x.sqrt();
        pixels += 1;
    }
    std::hint::black_box(x);

    WorkReport {
        pixels,
        elapsed: start.elapsed(),
    }
}
