use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid config: dim, l and m must be > 0 and w must be positive and finite")]
    InvalidConfig,
    #[error("dimension mismatch: index expects {expected}, point has {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("index was torn down and can no longer be used")]
    UseAfterTeardown,
    #[error("query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
