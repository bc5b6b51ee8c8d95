//! A pool of concurrent TA workers cooperatively grading a shared, ordered
//! queue of exams, with per-resource locking that can be switched off to
//! observe the resulting races.

pub mod config;
pub mod error;
pub mod events;
pub mod locks;
pub mod pool;
pub mod shutdown;
pub mod state;
pub mod store;
pub mod worker;
