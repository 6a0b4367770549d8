use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::codegen::{CodeGenerator, RandomCodeGenerator};
use crate::errors::SubmitError;
use crate::models::{AccessCode, AccessRequest};
use crate::notification::slack::SlackNotifier;
use crate::store::RequestStore;

/// Issues new access requests, or passes an explicit code straight through.
pub struct RequestSubmitter {
    store: Arc<dyn RequestStore>,
    generator: Arc<dyn CodeGenerator>,
    notifier: SlackNotifier,
    in_flight: AtomicBool,
}

/// Clears the single-flight flag when dropped, including on early return.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RequestSubmitter {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self {
            store,
            generator: Arc::new(RandomCodeGenerator),
            notifier: SlackNotifier::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_notifier(mut self, notifier: SlackNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Returns the code that should become active.
    ///
    /// A non-blank `explicit_code` is returned as-is without touching the
    /// store. Otherwise a fresh code is generated and inserted as pending.
    pub async fn submit(&self, explicit_code: Option<&str>) -> Result<AccessCode, SubmitError> {
        if let Some(code) = explicit_code.map(str::trim).filter(|c| !c.is_empty()) {
            let code = AccessCode::new(code);
            if !code.is_well_formed() {
                tracing::warn!(code = %code, "using explicit code that is not five digits");
            }
            return Ok(code);
        }

        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(SubmitError::InFlight)?;

        let request = AccessRequest::pending(self.generator.generate());
        if let Err(e) = self.store.insert(&request).await {
            tracing::error!(code = %request.code, "Error submitting request: {}", e);
            return Err(SubmitError::RequestFailed(e));
        }
        tracing::info!(code = %request.code, "access request submitted");

        if self.notifier.is_configured() {
            let notifier = self.notifier.clone();
            let code = request.code.clone();
            let created_at = request.created_at;
            tokio::spawn(async move {
                if let Err(e) = notifier.send_access_request(&code, &created_at).await {
                    tracing::error!("Failed to send access request notification: {}", e);
                }
            });
        }

        Ok(request.code)
    }
}
