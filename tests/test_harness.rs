//! Test harness for grading-pool integration tests.
//!
//! Builds temporary exam directories and rubric files, runs a pool in a
//! background task, and collects the event stream for assertions.

// Each integration test binary compiles its own copy; not every binary uses
// every helper.
#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ta_pool::config::SimConfig;
use ta_pool::events::{Event, EventSender};
use ta_pool::locks::LockSet;
use ta_pool::pool::GraderPool;
use ta_pool::state::SharedState;
use ta_pool::store::{self, RubricStore};

/// Millisecond-scale timings so scenario tests finish quickly.
pub fn fast_config(worker_count: usize, synchronized: bool) -> SimConfig {
    SimConfig::new(worker_count, synchronized)
        .with_poll_interval(Duration::from_millis(5))
        .with_advance_pause(Duration::from_millis(1))
        .with_review_delay(Duration::from_millis(1), Duration::from_millis(3))
        .with_marking_delay(Duration::from_millis(1), Duration::from_millis(3))
}

/// A grading pool running in a background task over temp files.
pub struct TestPool {
    // Keeps the exam dir and rubric file alive for the run; tests that
    // inspect files after `join` clone this to extend the lifetime.
    pub tmp: Arc<TempDir>,
    pub rubric_path: PathBuf,
    pub shared: Arc<SharedState>,
    pub locks: Arc<LockSet>,
    pub cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<Event>,
    handle: JoinHandle<()>,
}

impl TestPool {
    /// Write one exam file per student id (in file-name order), a default
    /// rubric, and start the pool.
    pub async fn start(config: SimConfig, student_ids: &[i64]) -> Self {
        let tmp = tempfile::tempdir().expect("create temp dir");
        let exam_dir = tmp.path().join("exams");
        std::fs::create_dir(&exam_dir).expect("create exam dir");
        for (i, id) in student_ids.iter().enumerate() {
            let path = exam_dir.join(format!("exam_{i:02}.txt"));
            std::fs::write(&path, format!("{id}\nanswers\n")).expect("write exam");
        }
        let rubric_path = tmp.path().join("rubric.txt");
        std::fs::write(&rubric_path, "1, A\n2, B\n3, C\n4, D\n5, E\n").expect("write rubric");

        let rubric = store::load_rubric(&rubric_path).await.expect("load rubric");
        let exams = store::load_exams(&exam_dir).await.expect("load exams");
        let shared = Arc::new(SharedState::new(rubric, exams));

        let (events_tx, events_rx) = EventSender::channel();
        let pool = GraderPool::new(config, shared.clone(), RubricStore::new(&rubric_path), events_tx)
            .expect("valid config");
        let locks = pool.locks().clone();

        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            pool.run(run_cancel).await;
        });

        Self {
            tmp: Arc::new(tmp),
            rubric_path,
            shared,
            locks,
            cancel,
            events: events_rx,
            handle,
        }
    }

    /// Wait for the pool to finish on its own and drain the event stream.
    pub async fn join(self) -> Vec<Event> {
        self.handle.await.expect("pool task panicked");
        let mut rx = self.events;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Cancel the run, then wait and drain.
    pub async fn cancel_and_join(self) -> Vec<Event> {
        self.cancel.cancel();
        self.join().await
    }
}

/// `(exam_index, question)` pairs of every marking event, in emission order.
pub fn marked_pairs(events: &[Event]) -> Vec<(usize, usize)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::QuestionMarked {
                exam_index,
                question,
                ..
            } => Some((*exam_index, *question)),
            _ => None,
        })
        .collect()
}

/// Assert that no `(exam, question)` pair was claimed by two workers.
pub fn assert_no_duplicate_marks(events: &[Event]) {
    let pairs = marked_pairs(events);
    let mut seen = HashSet::new();
    for pair in &pairs {
        assert!(
            seen.insert(*pair),
            "question {} of exam {} was marked twice",
            pair.1,
            pair.0
        );
    }
}

/// Wait for a condition to become true with timeout.
pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout_duration {
        if condition().await {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}

/// Assert a condition eventually becomes true.
pub async fn assert_eventually<F, Fut>(condition: F, timeout_duration: Duration, message: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = wait_for(condition, timeout_duration, Duration::from_millis(10)).await;
    assert!(result, "{}", message);
}
