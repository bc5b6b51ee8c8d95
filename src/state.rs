//! Shared state for the grading pool.
//!
//! A single [`SharedState`] is constructed before any worker starts and is
//! jointly owned (via `Arc`) by the whole worker population until every
//! worker has terminated. All mutation goes through the accessor methods
//! here; workers never touch fields directly.
//!
//! Every mutable field is an atomic so that the deliberately unsynchronized
//! mode exhibits *logical* races (stale reads, lost updates, double-claims)
//! without data-race undefined behavior. In synchronized runs the happens-
//! before edges come from the [`LockSet`](crate::locks::LockSet) permits, so
//! relaxed ordering is sufficient here.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Number of questions on every exam and entries in the rubric.
pub const QUESTIONS: usize = 5;

/// Student id that loads as [`WorkItem::EndMarker`] instead of a real exam.
pub const END_MARKER_STUDENT_ID: i64 = 9999;

/// Student id recorded when an exam file has no parseable leading integer.
pub const UNKNOWN_STUDENT_ID: i64 = -1;

/// Per-question grading codes at the load/persist boundary.
pub type Rubric = [char; QUESTIONS];

/// Cyclic alphabetic increment of a rubric code: `'Z'` wraps to `'A'`,
/// anything else moves to the next byte.
pub fn next_code(code: char) -> char {
    if code == 'Z' {
        'A'
    } else {
        (code as u8 + 1) as char
    }
}

/// One exam in the work queue. Created at load time; only the `marked`
/// flags are mutated afterwards.
#[derive(Debug)]
pub struct Exam {
    pub student_id: i64,
    marked: [AtomicBool; QUESTIONS],
    pub source: PathBuf,
}

impl Exam {
    pub fn new(student_id: i64, source: PathBuf) -> Self {
        Self {
            student_id,
            marked: std::array::from_fn(|_| AtomicBool::new(false)),
            source,
        }
    }

    pub fn is_marked(&self, question: usize) -> bool {
        self.marked[question].load(Ordering::Relaxed)
    }

    /// Claim a question for this caller. Returns true if the caller now owns
    /// the mark.
    ///
    /// Deliberately a read followed by a write rather than a swap: under the
    /// per-question lock this is the double-check-then-claim that keeps each
    /// mark single-owner, and without the lock it is the observable
    /// double-claim race of unsynchronized runs.
    pub fn try_claim(&self, question: usize) -> bool {
        if self.marked[question].load(Ordering::Relaxed) {
            return false;
        }
        self.marked[question].store(true, Ordering::Relaxed);
        true
    }

    pub fn fully_marked(&self) -> bool {
        (0..QUESTIONS).all(|q| self.is_marked(q))
    }
}

/// An entry in the exam queue: a real exam, or the in-band end-of-queue
/// marker that tells every worker to stop.
#[derive(Debug)]
pub enum WorkItem {
    Exam(Exam),
    EndMarker,
}

impl WorkItem {
    pub fn is_end_marker(&self) -> bool {
        matches!(self, WorkItem::EndMarker)
    }
}

/// The single structure visible to all workers: rubric, exam queue, cursor,
/// and the monotonic stop flag.
#[derive(Debug)]
pub struct SharedState {
    rubric: [AtomicU8; QUESTIONS],
    exams: Vec<WorkItem>,
    cursor: AtomicUsize,
    stop: AtomicBool,
}

impl SharedState {
    pub fn new(rubric: Rubric, exams: Vec<WorkItem>) -> Self {
        Self {
            rubric: std::array::from_fn(|q| AtomicU8::new(rubric[q] as u8)),
            exams,
            cursor: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
        }
    }

    pub fn exam_count(&self) -> usize {
        self.exams.len()
    }

    /// Index of the exam currently eligible for work.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Move the cursor one past its current position and return the new
    /// value. Callers hold the cursor lock in synchronized runs; a plain
    /// load/store keeps the unsynchronized lost-update race observable.
    pub fn advance_cursor(&self) -> usize {
        let next = self.cursor.load(Ordering::Relaxed) + 1;
        self.cursor.store(next, Ordering::Relaxed);
        next
    }

    pub fn item(&self, idx: usize) -> &WorkItem {
        &self.exams[idx]
    }

    /// True when `idx` is in bounds and holds the end-of-queue marker.
    pub fn end_marker_at(&self, idx: usize) -> bool {
        self.exams.get(idx).is_some_and(WorkItem::is_end_marker)
    }

    pub fn rubric_code(&self, question: usize) -> char {
        self.rubric[question].load(Ordering::Relaxed) as char
    }

    pub fn set_rubric_code(&self, question: usize, code: char) {
        self.rubric[question].store(code as u8, Ordering::Relaxed);
    }

    pub fn rubric_snapshot(&self) -> Rubric {
        std::array::from_fn(|q| self.rubric_code(q))
    }

    /// Raise the stop flag. Monotonic: once raised it is never cleared.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}
