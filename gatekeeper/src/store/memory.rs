use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{single_status, RequestStore};
use crate::errors::StoreError;
use crate::models::{AccessCode, AccessRequest, RequestStatus};

/// In-process `access_requests` table.
///
/// Cloning shares the table, so a test can keep one handle to play the
/// administrator (`set_status`) while the code under test owns another.
#[derive(Clone, Default)]
pub struct MemoryRequestStore {
    rows: Arc<DashMap<AccessCode, Vec<AccessRequest>>>,
    inserts: Arc<AtomicUsize>,
    status_reads: Arc<AtomicUsize>,
    fail_inserts: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the status of every row with this code. Returns false if none exist.
    pub fn set_status(&self, code: &AccessCode, status: RequestStatus) -> bool {
        match self.rows.get_mut(code) {
            Some(mut rows) => {
                for row in rows.iter_mut() {
                    row.status = status.clone();
                }
                true
            }
            None => false,
        }
    }

    /// Make subsequent inserts fail with a 503-style rejection.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent status reads fail with a 503-style rejection.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self, code: &AccessCode) -> Vec<AccessRequest> {
        self.rows.get(code).map(|r| r.value().clone()).unwrap_or_default()
    }

    /// Successful and failed insert attempts.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Successful and failed status reads.
    pub fn status_read_count(&self) -> usize {
        self.status_reads.load(Ordering::SeqCst)
    }
}

fn unavailable() -> StoreError {
    StoreError::Rejected {
        status: 503,
        body: "memory store unavailable".into(),
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn insert(&self, request: &AccessRequest) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.rows
            .entry(request.code.clone())
            .or_default()
            .push(request.clone());
        Ok(())
    }

    async fn fetch_status(&self, code: &AccessCode) -> Result<Option<RequestStatus>, StoreError> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let statuses = self
            .rows
            .get(code)
            .map(|rows| rows.iter().map(|r| r.status.clone()).collect())
            .unwrap_or_default();
        single_status(code, statuses)
    }
}
