//! Access-request workflow.
//!
//! 1. [`RequestSubmitter`] inserts a pending `access_requests` row under a
//!    fresh code, or passes a code the user already has straight through.
//! 2. [`PollingReconciler`] reads the row's status every
//!    [`POLL_INTERVAL`] until an administrator sets it to `approved`.
//! 3. On approval the flag is persisted locally, so later sessions skip
//!    steps 1–2 entirely, and the completion callback runs exactly once.
//!
//! [`AccessGate`] ties these together with the saved-codes list and the
//! session state a form would render.

pub mod gate;
pub mod reconciler;
pub mod submitter;

pub use gate::{AccessGate, AccessGateBuilder, SessionState};
pub use reconciler::{Completion, PollingReconciler, ReconcileState, POLL_INTERVAL};
pub use submitter::RequestSubmitter;
