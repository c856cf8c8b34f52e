//! Error types for snapshot generation

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Differential error: {0}")]
    Differential(String),
}
