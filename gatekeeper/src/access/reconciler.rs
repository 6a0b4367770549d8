//! Approval polling.
//!
//! State machine: `Idle -> AwaitingApproval(code) -> Approved`.
//! `Approved` is terminal. The completion callback fires on the single
//! transition into `Approved`, whichever path gets there first: a persisted
//! flag from an earlier session, or a status read showing `approved`.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use crate::errors::PollError;
use crate::jobs::schedule::{self, PollHandle};
use crate::local::LocalCodeStore;
use crate::models::{AccessCode, RequestStatus};
use crate::store::RequestStore;

pub const POLL_INTERVAL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    AwaitingApproval(AccessCode),
    Approved,
}

type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Zero-argument callback that can only ever run once.
#[derive(Clone)]
pub struct Completion(Arc<Mutex<Option<Callback>>>);

impl Completion {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Some(Box::new(callback)))))
    }

    /// Run the callback if it has not run yet. Returns whether it ran.
    pub fn fire(&self) -> bool {
        let callback = self.0.lock().unwrap_or_else(|e| e.into_inner()).take();
        match callback {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct PollingReconciler {
    store: Arc<dyn RequestStore>,
    local: LocalCodeStore,
    state: Arc<watch::Sender<ReconcileState>>,
    completion: Completion,
}

impl PollingReconciler {
    pub fn new(store: Arc<dyn RequestStore>, local: LocalCodeStore, completion: Completion) -> Self {
        let (state, _) = watch::channel(ReconcileState::Idle);
        Self {
            store,
            local,
            state: Arc::new(state),
            completion,
        }
    }

    pub fn state(&self) -> ReconcileState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReconcileState> {
        self.state.subscribe()
    }

    /// Jump straight to `Approved` if an earlier session recorded approval.
    /// No remote read happens on this path.
    pub fn resume_from_local(&self) -> bool {
        if self.local.load_approval_flag() {
            tracing::info!("approval already recorded locally, skipping reconciliation");
            self.approve();
            true
        } else {
            false
        }
    }

    /// Start polling for `code`. Returns `None` when already approved.
    pub fn start(&self, code: AccessCode) -> Option<PollHandle> {
        let awaiting = self.state.send_if_modified(|state| {
            if *state == ReconcileState::Approved {
                return false;
            }
            *state = ReconcileState::AwaitingApproval(code.clone());
            true
        });
        if !awaiting {
            return None;
        }

        tracing::info!(code = %code, "awaiting approval");
        let this = self.clone();
        Some(schedule::every(POLL_INTERVAL, move || {
            let this = this.clone();
            let code = code.clone();
            async move { this.check(&code).await }
        }))
    }

    /// One reconciliation step for `code`.
    pub async fn check(&self, code: &AccessCode) -> ControlFlow<()> {
        if self.state() == ReconcileState::Approved {
            return ControlFlow::Break(());
        }

        // another session on this machine may have been approved meanwhile
        if self.local.load_approval_flag() {
            self.approve();
            return ControlFlow::Break(());
        }

        match self.fetch(code).await {
            Ok(RequestStatus::Approved) => {
                self.approve();
                ControlFlow::Break(())
            }
            Ok(status) => {
                tracing::debug!(code = %code, status = %status, "access request not approved yet");
                ControlFlow::Continue(())
            }
            Err(e) => {
                tracing::warn!(code = %code, "error checking status: {}", e);
                ControlFlow::Continue(())
            }
        }
    }

    async fn fetch(&self, code: &AccessCode) -> Result<RequestStatus, PollError> {
        self.store
            .fetch_status(code)
            .await?
            .ok_or_else(|| PollError::NotFound(code.clone()))
    }

    fn approve(&self) {
        self.local.mark_approved();

        let first = self.state.send_if_modified(|state| {
            if *state == ReconcileState::Approved {
                return false;
            }
            *state = ReconcileState::Approved;
            true
        });

        if first {
            tracing::info!("access approved");
            self.completion.fire();
        }
    }
}
