//! Observability events emitted by workers.
//!
//! Purely informational: emission never blocks a worker, and an event sent
//! after the receiver is gone is dropped.

use tokio::sync::mpsc;

/// Something a worker did that an observer may care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A worker mutated one rubric code.
    RubricChanged {
        worker_id: usize,
        question: usize,
        old: char,
        new: char,
    },
    /// A worker claimed and marked one question of one exam.
    QuestionMarked {
        worker_id: usize,
        student_id: i64,
        exam_index: usize,
        question: usize,
    },
}

/// Non-blocking handle workers use to emit events.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: Event) {
        // Receiver gone means nobody is watching; drop the event.
        let _ = self.tx.send(event);
    }
}
