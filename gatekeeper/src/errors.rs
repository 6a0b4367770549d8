use thiserror::Error;

use crate::models::AccessCode;

/// Failures from a remote request store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected request: status={status}, body={body}")]
    Rejected { status: u16, body: String },

    #[error("malformed store response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{count} requests share code {code}")]
    Ambiguous { code: AccessCode, count: usize },
}

/// User-visible submission failures. Recoverable by submitting again.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("request could not be sent, try again")]
    RequestFailed(#[source] StoreError),

    #[error("a request is already being sent")]
    InFlight,
}

/// Status check failures. Logged by the reconciler and never surfaced;
/// the next tick tries again.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("no access request with code {0}")]
    NotFound(AccessCode),

    #[error("status query failed: {0}")]
    Store(#[from] StoreError),
}
