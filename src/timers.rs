use std::time::{Duration, Instant};

use crate::rng::Lcg;

/// Gates a recurring action to a fixed cadence, with optional jitter applied
/// to each new due-time so that freshly started nodes don't flood in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTimer {
    period: Duration,
    jitter_frac: f64,
    next_due: Instant,
}

impl PeriodicTimer {
    pub fn new(period: Duration, jitter_frac: f64, now: Instant) -> Self {
        Self {
            period,
            jitter_frac,
            next_due: now,
        }
    }

    /// Returns `true` at most once per period; reschedules the next due time
    /// (jittered) whenever it fires.
    pub fn due(&mut self, now: Instant, rng: &mut Lcg) -> bool {
        if now < self.next_due {
            return false;
        }
        let factor = rng.jitter(self.jitter_frac);
        let jittered = self.period.mul_f64(factor.max(0.0));
        self.next_due = now + jittered;
        true
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }
}
