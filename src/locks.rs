//! Named mutual-exclusion resources for the shared grading state.
//!
//! One resource guards the global cursor, one the rubric, and one each
//! question index. Each is an independent single-permit
//! [`Semaphore`](tokio::sync::Semaphore), the async analogue of the named
//! semaphores a process-based implementation would use: acquisition has a
//! real failure mode (the semaphore was closed), which is fatal to the
//! calling worker.
//!
//! The protocol never holds two named locks at once, so no lock ordering is
//! required. In unsynchronized mode every acquire is a no-op that returns no
//! permit; the mode exists to make races observable, not as a recommended
//! configuration.

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::error::{Result, TaPoolError};
use crate::state::QUESTIONS;

/// A held lock: the permit releases its resource on drop. `None` in
/// unsynchronized mode.
pub type LockGuard<'a> = Option<SemaphorePermit<'a>>;

#[derive(Debug)]
pub struct LockSet {
    synchronized: bool,
    cursor: Semaphore,
    rubric: Semaphore,
    questions: Vec<Semaphore>,
}

impl LockSet {
    pub fn new(synchronized: bool) -> Self {
        Self {
            synchronized,
            cursor: Semaphore::new(1),
            rubric: Semaphore::new(1),
            questions: (0..QUESTIONS).map(|_| Semaphore::new(1)).collect(),
        }
    }

    pub fn synchronized(&self) -> bool {
        self.synchronized
    }

    /// Acquire the global cursor lock.
    pub async fn cursor(&self) -> Result<LockGuard<'_>> {
        self.acquire(&self.cursor, "cursor").await
    }

    /// Acquire the rubric lock.
    pub async fn rubric(&self) -> Result<LockGuard<'_>> {
        self.acquire(&self.rubric, "rubric").await
    }

    /// Acquire the lock for one question index.
    pub async fn question(&self, question: usize) -> Result<LockGuard<'_>> {
        self.acquire(&self.questions[question], "question").await
    }

    async fn acquire<'a>(
        &'a self,
        resource: &'a Semaphore,
        name: &'static str,
    ) -> Result<LockGuard<'a>> {
        if !self.synchronized {
            return Ok(None);
        }
        resource
            .acquire()
            .await
            .map(Some)
            .map_err(|_| TaPoolError::LockUnavailable(name))
    }

    /// Destroy every resource. Acquisitions already pending and all future
    /// ones fail with `LockUnavailable`; permits already held release
    /// normally on drop.
    pub fn close(&self) {
        self.cursor.close();
        self.rubric.close();
        for question in &self.questions {
            question.close();
        }
    }
}
