use std::time::Duration;

use crate::error::{Result, TaPoolError};

/// Configuration for a grading run.
///
/// The worker count and synchronization mode are fixed for the lifetime of
/// the run. The timing knobs default to the simulation's normative delays
/// and exist so tests can shrink them to millisecond scale.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of TA workers to spawn.
    pub worker_count: usize,
    /// Whether the named locks provide real mutual exclusion.
    /// When false, acquire/release are no-ops and races become observable.
    pub synchronized: bool,
    /// Backoff when the cursor has run past the end of the queue.
    pub poll_interval: Duration,
    /// Pause after each advance phase before re-polling.
    pub advance_pause: Duration,
    /// Uniform `[min, max)` delay simulating per-question rubric review.
    pub review_delay: (Duration, Duration),
    /// Uniform `[min, max)` delay simulating marking a claimed question.
    pub marking_delay: (Duration, Duration),
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            // Matches the simulator's opt-in --sync flag
            synchronized: false,
            poll_interval: Duration::from_millis(100),
            advance_pause: Duration::from_millis(200),
            review_delay: (Duration::from_millis(500), Duration::from_millis(1000)),
            marking_delay: (Duration::from_millis(1000), Duration::from_millis(2000)),
        }
    }
}

impl SimConfig {
    pub fn new(worker_count: usize, synchronized: bool) -> Self {
        Self {
            worker_count,
            synchronized,
            ..Default::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_advance_pause(mut self, pause: Duration) -> Self {
        self.advance_pause = pause;
        self
    }

    pub fn with_review_delay(mut self, min: Duration, max: Duration) -> Self {
        self.review_delay = (min, max);
        self
    }

    pub fn with_marking_delay(mut self, min: Duration, max: Duration) -> Self {
        self.marking_delay = (min, max);
        self
    }

    /// Validate the configuration before any worker starts.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(TaPoolError::InvalidWorkerCount);
        }
        Ok(())
    }
}
