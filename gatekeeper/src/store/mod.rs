//! RequestStore — pluggable backend for the shared `access_requests` table.
//!
//! Supports three backends:
//!   - `Postgres`: direct sqlx connection (`DATABASE_URL`).
//!   - `Rest`: a PostgREST endpoint such as Supabase
//!     (`GATEKEEPER_SUPABASE_URL` + `GATEKEEPER_SUPABASE_KEY`).
//!   - `Memory`: in-process table, used by tests.
//!
//! Administrators flip `status` to `approved` through their own channel;
//! this crate only inserts pending rows and reads the status back.

pub mod memory;
pub mod postgres;
pub mod rest;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::{AccessCode, AccessRequest, RequestStatus};

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a new request row. No uniqueness check on `code`.
    async fn insert(&self, request: &AccessRequest) -> Result<(), StoreError>;

    /// Status of the request with exactly this code.
    /// `Ok(None)` when no row matches; more than one match is `StoreError::Ambiguous`.
    async fn fetch_status(&self, code: &AccessCode) -> Result<Option<RequestStatus>, StoreError>;
}

/// Collapse a list of matching statuses into the single-row answer.
pub(crate) fn single_status(
    code: &AccessCode,
    mut rows: Vec<RequestStatus>,
) -> Result<Option<RequestStatus>, StoreError> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        count => Err(StoreError::Ambiguous {
            code: code.clone(),
            count,
        }),
    }
}
