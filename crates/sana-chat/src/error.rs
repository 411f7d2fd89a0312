//! Error types for sana-chat

use thiserror::Error;

/// Result type alias using sana-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during controller operations.
///
/// Nothing here is fatal to the process: `submit` converts classification
/// failures into user-visible apology messages and returns `Ok`; these
/// variants cover internal plumbing only.
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the classification client layer
    #[error(transparent)]
    Client(#[from] sana_client::Error),

    /// A generic controller error
    #[error("{0}")]
    Other(String),
}
