use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaPoolError {
    #[error("worker count must be positive")]
    InvalidWorkerCount,

    #[error("malformed rubric at line {line}: {reason}")]
    MalformedRubric { line: usize, reason: String },

    #[error("no exam files found in {0}")]
    EmptyExamSet(PathBuf),

    #[error("lock resource unavailable: {0}")]
    LockUnavailable(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TaPoolError>;
