//! Error types for maestrod.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no configured project named '{0}'")]
    UnknownProject(String),

    #[error("backend request failed: {0}")]
    Backend(String),

    #[error("did not {action}, received {status}\n{body}")]
    UnexpectedStatus {
        action: String,
        status: u16,
        body: String,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
