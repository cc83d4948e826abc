//! Progress reporting for one download: whole-ten percentages at a
//! configurable step.

/// Decides when a progress line is due.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: Option<u64>,
    step: u32,
    last_logged: u32,
}

impl ProgressTracker {
    /// `step_percent` is rounded to the nearest 10 and clamped to 10..=100.
    /// Without a known total nothing is ever reported.
    pub fn new(total: Option<u64>, step_percent: u32) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            step: normalize_step(step_percent),
            last_logged: 0,
        }
    }

    /// Feed the running byte count; returns the percentage to log, if any.
    pub fn advance(&mut self, done: u64) -> Option<u32> {
        let total = self.total?;
        let pct = percent_tens(done, total);
        if pct >= self.last_logged + self.step || (pct == 100 && self.last_logged < 100) {
            self.last_logged = pct;
            Some(pct)
        } else {
            None
        }
    }
}

fn normalize_step(step_percent: u32) -> u32 {
    let rounded = (step_percent.saturating_add(5) / 10) * 10;
    rounded.clamp(10, 100)
}

/// Completion rounded down to a multiple of 10, at most 100.
fn percent_tens(done: u64, total: u64) -> u32 {
    let tenths = (done.min(total) as u128 * 10 / total as u128) as u32;
    tenths * 10
}
