//! Population orchestration: spawn the configured number of TA workers
//! against one shared state and join them all.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::SimConfig;
use crate::error::Result;
use crate::events::EventSender;
use crate::locks::LockSet;
use crate::state::SharedState;
use crate::store::RubricStore;
use crate::worker::Worker;

pub struct GraderPool {
    config: SimConfig,
    shared: Arc<SharedState>,
    locks: Arc<LockSet>,
    store: RubricStore,
    events: EventSender,
}

impl GraderPool {
    /// Build a pool over already-loaded shared state. Fails fast on an
    /// invalid configuration, before any worker exists.
    pub fn new(
        config: SimConfig,
        shared: Arc<SharedState>,
        store: RubricStore,
        events: EventSender,
    ) -> Result<Self> {
        config.validate()?;
        let locks = Arc::new(LockSet::new(config.synchronized));
        Ok(Self {
            config,
            shared,
            locks,
            store,
            events,
        })
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn locks(&self) -> &Arc<LockSet> {
        &self.locks
    }

    /// Run the population to completion: every worker exits on the stop
    /// flag, on cancellation, or on its own lock failure.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            workers = self.config.worker_count,
            synchronized = self.config.synchronized,
            exams = self.shared.exam_count(),
            "Starting grading pool"
        );

        let mut handles = Vec::with_capacity(self.config.worker_count);
        for t in 0..self.config.worker_count {
            let worker = Worker::new(
                t + 1,
                self.config.clone(),
                self.shared.clone(),
                self.locks.clone(),
                self.store.clone(),
                self.events.clone(),
                cancel.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }

        tracing::info!(
            cursor = self.shared.cursor(),
            stopped = self.shared.stop_requested(),
            "All TAs finished or terminated"
        );
    }
}
