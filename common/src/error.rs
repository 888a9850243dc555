use thiserror::Error;

use crate::serializer::ReaderError;

/// Transient or systemic storage failures. Distinct from the `InvalidXxx`
/// taxonomies (`blockflow_daemon::core::error`): an `IOError` is never a
/// verdict about the data itself, only about the ability to read or write
/// it, and the caller may retry.
#[derive(Error, Debug)]
pub enum IOError {
    #[error("key not found")]
    KeyNotFound,

    #[error("serialization error: {0}")]
    Serde(#[from] ReaderError),

    #[error("storage error: {0}")]
    Other(String),
}
