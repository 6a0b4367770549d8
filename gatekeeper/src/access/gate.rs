use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::reconciler::{Completion, PollingReconciler, ReconcileState};
use super::submitter::RequestSubmitter;
use crate::codegen::CodeGenerator;
use crate::errors::SubmitError;
use crate::jobs::schedule::PollHandle;
use crate::local::{KeyValueStore, LocalCodeStore};
use crate::models::AccessCode;
use crate::notification::slack::SlackNotifier;
use crate::store::RequestStore;

/// Snapshot of the in-memory session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub active_code: Option<AccessCode>,
    pub submitting: bool,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Session {
    active_code: Option<AccessCode>,
    last_error: Option<String>,
    poll: Option<PollHandle>,
}

/// One access-request session: the request form minus the form.
///
/// Dropping the gate (or calling [`AccessGate::close`]) stops any polling.
pub struct AccessGate {
    local: LocalCodeStore,
    submitter: RequestSubmitter,
    reconciler: PollingReconciler,
    session: Mutex<Session>,
}

pub struct AccessGateBuilder {
    store: Arc<dyn RequestStore>,
    kv: Arc<dyn KeyValueStore>,
    generator: Option<Arc<dyn CodeGenerator>>,
    notifier: Option<SlackNotifier>,
}

impl AccessGateBuilder {
    pub fn generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn notifier(mut self, notifier: SlackNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Open the session. If approval was recorded by an earlier session,
    /// `on_granted` runs before this returns and nothing is read remotely.
    pub fn open(self, on_granted: impl FnOnce() + Send + 'static) -> AccessGate {
        let local = LocalCodeStore::new(self.kv);

        let mut submitter = RequestSubmitter::new(self.store.clone());
        if let Some(generator) = self.generator {
            submitter = submitter.with_generator(generator);
        }
        if let Some(notifier) = self.notifier {
            submitter = submitter.with_notifier(notifier);
        }

        let reconciler =
            PollingReconciler::new(self.store, local.clone(), Completion::new(on_granted));

        let gate = AccessGate {
            local,
            submitter,
            reconciler,
            session: Mutex::new(Session::default()),
        };

        tracing::debug!(saved = gate.saved_codes().len(), "access gate opened");
        gate.reconciler.resume_from_local();
        gate
    }
}

impl AccessGate {
    pub fn builder(store: Arc<dyn RequestStore>, kv: Arc<dyn KeyValueStore>) -> AccessGateBuilder {
        AccessGateBuilder {
            store,
            kv,
            generator: None,
            notifier: None,
        }
    }

    pub fn open(
        store: Arc<dyn RequestStore>,
        kv: Arc<dyn KeyValueStore>,
        on_granted: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self::builder(store, kv).open(on_granted)
    }

    fn session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn saved_codes(&self) -> Vec<AccessCode> {
        self.local.load()
    }

    pub fn state(&self) -> ReconcileState {
        self.reconciler.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReconcileState> {
        self.reconciler.subscribe()
    }

    pub fn is_approved(&self) -> bool {
        self.state() == ReconcileState::Approved
    }

    pub fn snapshot(&self) -> SessionState {
        let session = self.session();
        SessionState {
            active_code: session.active_code.clone(),
            submitting: self.submitter.is_in_flight(),
            last_error: session.last_error.clone(),
        }
    }

    /// Submit the form. Blank `input` requests a new code; anything else is
    /// used as an existing code.
    pub async fn submit(&self, input: &str) -> Result<AccessCode, SubmitError> {
        let explicit = Some(input.trim()).filter(|s| !s.is_empty());
        if explicit.is_none() {
            self.session().last_error = None;
        }

        match self.submitter.submit(explicit).await {
            Ok(code) => {
                self.local.remember(&code);
                self.activate(code.clone());
                Ok(code)
            }
            Err(SubmitError::InFlight) => Err(SubmitError::InFlight),
            Err(e) => {
                self.session().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Make a previously saved code active without remembering it again.
    pub fn use_saved_code(&self, code: &AccessCode) {
        self.activate(code.clone());
    }

    /// Wait until the session reaches `Approved`.
    pub async fn approved(&self) {
        let mut rx = self.subscribe();
        // the sender lives in `self`, so this cannot see a closed channel
        let _ = rx.wait_for(|s| *s == ReconcileState::Approved).await;
    }

    /// Stop polling. Safe to call in any state, any number of times.
    pub fn close(&self) {
        if let Some(poll) = self.session().poll.take() {
            poll.cancel();
            tracing::debug!("access gate closed, polling cancelled");
        }
    }

    fn activate(&self, code: AccessCode) {
        let mut session = self.session();
        if let Some(previous) = session.poll.take() {
            previous.cancel();
        }
        session.active_code = Some(code.clone());
        session.poll = self.reconciler.start(code);
    }
}

impl Drop for AccessGate {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::FixedCodeGenerator;
    use crate::local::MemoryKvStore;
    use crate::models::RequestStatus;
    use crate::store::memory::MemoryRequestStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn open(store: &MemoryRequestStore, kv: &MemoryKvStore) -> (AccessGate, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let gate = AccessGate::builder(Arc::new(store.clone()), Arc::new(kv.clone()))
            .generator(Arc::new(FixedCodeGenerator(AccessCode::new("40231"))))
            .open(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        (gate, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_becomes_active_and_saved() {
        let store = MemoryRequestStore::new();
        let kv = MemoryKvStore::new();
        let (gate, _) = open(&store, &kv);

        let code = gate.submit("").await.unwrap();
        let snap = gate.snapshot();
        assert_eq!(snap.active_code, Some(code.clone()));
        assert!(!snap.submitting);
        assert_eq!(snap.last_error, None);
        assert_eq!(gate.saved_codes(), vec![code.clone()]);
        assert_eq!(gate.state(), ReconcileState::AwaitingApproval(code));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submit_sets_error_and_keeps_code_unset() {
        let store = MemoryRequestStore::new();
        let kv = MemoryKvStore::new();
        let (gate, _) = open(&store, &kv);

        store.fail_inserts(true);
        assert!(gate.submit("").await.is_err());
        let snap = gate.snapshot();
        assert_eq!(snap.active_code, None);
        assert_eq!(snap.last_error.as_deref(), Some("request could not be sent, try again"));
        assert!(gate.saved_codes().is_empty());
        assert_eq!(gate.state(), ReconcileState::Idle);

        // retry clears the error
        store.fail_inserts(false);
        gate.submit("").await.unwrap();
        assert_eq!(gate.snapshot().last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_code_polls_without_insert() {
        let store = MemoryRequestStore::new();
        let kv = MemoryKvStore::new();
        let (gate, fired) = open(&store, &kv);

        gate.use_saved_code(&AccessCode::new("55555"));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(store.insert_count(), 0);
        assert_eq!(store.status_read_count(), 3);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(gate.saved_codes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_codes_cancels_previous_polling() {
        let store = MemoryRequestStore::new();
        let kv = MemoryKvStore::new();
        let (gate, fired) = open(&store, &kv);

        gate.use_saved_code(&AccessCode::new("11111"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let code = gate.submit("").await.unwrap();
        store.set_status(&code, RequestStatus::Approved);

        gate.approved().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(gate.snapshot().active_code, Some(code));

        tokio::time::sleep(Duration::from_secs(30)).await;
        // one read for 11111, one for 40231
        assert_eq!(store.status_read_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_polling() {
        let store = MemoryRequestStore::new();
        let kv = MemoryKvStore::new();
        let (gate, _) = open(&store, &kv);

        gate.submit("").await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.status_read_count(), 2);

        gate.close();
        gate.close();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.status_read_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let store = MemoryRequestStore::new();
        let kv = MemoryKvStore::new();
        let (gate, _) = open(&store, &kv);

        gate.use_saved_code(&AccessCode::new("40231"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(gate);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.status_read_count(), 1);
    }
}
