//! The TA worker state machine.
//!
//! Each worker independently loops `POLL → RUBRIC_ROUND → MARK_ROUND →
//! ADVANCE` against the shared state:
//!
//! 1. **POLL**: read the cursor under the cursor lock. Past the end of the
//!    queue → timed backoff and re-poll. End marker → raise the stop flag
//!    and finish.
//! 2. **RUBRIC_ROUND**: per question, simulate review time, then with
//!    probability 1/3 mutate that rubric code under the rubric lock and
//!    persist the whole rubric (best-effort).
//! 3. **MARK_ROUND**: claim each still-unmarked question under that
//!    question's lock; a successful claim is followed by simulated marking
//!    time. The re-check under the lock is what keeps each mark
//!    single-owner.
//! 4. **ADVANCE**: under the cursor lock, advance the cursor if the exam is
//!    fully marked and the cursor still points at it; raise the stop flag
//!    when the new position holds the end marker.
//!
//! A worker exits on the stop flag, on cancellation (checked at the loop
//! top and at every sleep boundary), or on a failed lock acquisition. Lock
//! failure ends only the affected worker; the rest of the pool continues.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::config::SimConfig;
use crate::error::Result;
use crate::events::{Event, EventSender};
use crate::locks::LockSet;
use crate::state::{next_code, Exam, SharedState, WorkItem, QUESTIONS};
use crate::store::RubricStore;

pub struct Worker {
    id: usize,
    config: SimConfig,
    shared: Arc<SharedState>,
    locks: Arc<LockSet>,
    store: RubricStore,
    events: EventSender,
    cancel: CancellationToken,
    rng: StdRng,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        config: SimConfig,
        shared: Arc<SharedState>,
        locks: Arc<LockSet>,
        store: RubricStore,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            config,
            shared,
            locks,
            store,
            events,
            cancel,
            // Per-worker seed so workers do not make identical choices
            rng: StdRng::from_entropy(),
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(worker_id = self.id, "TA started");
        match self.grade_loop().await {
            Ok(()) => tracing::debug!(worker_id = self.id, "TA finished"),
            Err(e) => tracing::warn!(worker_id = self.id, error = %e, "TA stopped early"),
        }
    }

    async fn grade_loop(&mut self) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() || self.shared.stop_requested() {
                return Ok(());
            }

            // POLL
            let idx = {
                let _guard = self.locks.cursor().await?;
                self.shared.cursor()
            };
            if idx >= self.shared.exam_count() {
                // Queue exhausted without an end marker; back off and re-poll
                if !self.pause(self.config.poll_interval).await {
                    return Ok(());
                }
                continue;
            }

            let shared = self.shared.clone();
            let exam = match shared.item(idx) {
                WorkItem::EndMarker => {
                    self.shared.request_stop();
                    tracing::info!(worker_id = self.id, position = idx, "End marker polled, stopping pool");
                    return Ok(());
                }
                WorkItem::Exam(exam) => exam,
            };

            if !self.rubric_round().await? {
                return Ok(());
            }
            if !self.mark_round(idx, exam).await? {
                return Ok(());
            }
            self.advance(idx, exam).await?;

            if !self.pause(self.config.advance_pause).await {
                return Ok(());
            }
        }
    }

    /// Review each question against the rubric, occasionally mutating a
    /// code. Returns false when cancellation interrupted the round.
    async fn rubric_round(&mut self) -> Result<bool> {
        for q in 0..QUESTIONS {
            let delay = self.delay_in(self.config.review_delay);
            if !self.pause(delay).await {
                return Ok(false);
            }
            if !self.rng.gen_ratio(1, 3) {
                continue;
            }

            let guard = self.locks.rubric().await?;
            let old = self.shared.rubric_code(q);
            let new = next_code(old);
            self.shared.set_rubric_code(q, new);
            let snapshot = self.shared.rubric_snapshot();
            if let Err(e) = self.store.persist(&snapshot).await {
                tracing::warn!(worker_id = self.id, error = %e, "Failed to persist rubric");
            }
            drop(guard);

            tracing::info!(
                worker_id = self.id,
                question = q + 1,
                old = %old,
                new = %new,
                "Rubric changed"
            );
            self.events.emit(Event::RubricChanged {
                worker_id: self.id,
                question: q,
                old,
                new,
            });
        }
        Ok(true)
    }

    /// Try to claim and mark every still-unmarked question on this exam.
    /// Returns false when cancellation interrupted the round.
    async fn mark_round(&mut self, idx: usize, exam: &Exam) -> Result<bool> {
        for q in 0..QUESTIONS {
            if exam.is_marked(q) {
                // Unguarded fast path; the claim below re-checks under the lock
                continue;
            }

            let claimed = {
                let _guard = self.locks.question(q).await?;
                exam.try_claim(q)
            };
            if !claimed {
                continue;
            }

            tracing::info!(
                worker_id = self.id,
                student_id = exam.student_id,
                question = q + 1,
                "Marking question"
            );
            self.events.emit(Event::QuestionMarked {
                worker_id: self.id,
                student_id: exam.student_id,
                exam_index: idx,
                question: q,
            });

            let delay = self.delay_in(self.config.marking_delay);
            if !self.pause(delay).await {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Advance the cursor if this exam is now fully marked and the cursor
    /// still points at it. Only one worker can observe both under the
    /// cursor lock, which prevents double-advancement when several workers
    /// finish the same exam together.
    async fn advance(&mut self, idx: usize, exam: &Exam) -> Result<()> {
        let guard = self.locks.cursor().await?;
        if exam.fully_marked() && self.shared.cursor() == idx {
            let next = self.shared.advance_cursor();
            tracing::debug!(
                worker_id = self.id,
                student_id = exam.student_id,
                cursor = next,
                "Exam fully marked, cursor advanced"
            );
            if self.shared.end_marker_at(next) {
                self.shared.request_stop();
                tracing::info!(
                    worker_id = self.id,
                    position = next,
                    "End marker reached, stopping pool"
                );
            }
        }
        drop(guard);
        Ok(())
    }

    /// Cancellable sleep. Returns false when the run was cancelled before
    /// the delay elapsed.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn delay_in(&mut self, (min, max): (Duration, Duration)) -> Duration {
        if max > min {
            let ms = self.rng.gen_range(min.as_millis() as u64..max.as_millis() as u64);
            Duration::from_millis(ms)
        } else {
            min
        }
    }
}
