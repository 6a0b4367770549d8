use std::sync::Arc;

use super::KeyValueStore;
use crate::models::AccessCode;

pub const ACCESS_CODES_KEY: &str = "accessCodes";
pub const APPROVAL_STATUS_KEY: &str = "approvalStatus";
pub const APPROVED_MARKER: &str = "approved";

/// Saved access codes plus the "already approved" flag.
///
/// Every operation is best-effort: storage failures are logged and the
/// caller sees an empty list / unset flag instead of an error.
#[derive(Clone)]
pub struct LocalCodeStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalCodeStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Saved codes in the order they were remembered.
    pub fn load(&self) -> Vec<AccessCode> {
        let raw = match self.kv.get(ACCESS_CODES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read saved access codes: {:#}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<AccessCode>>(&raw) {
            Ok(codes) => codes,
            Err(e) => {
                tracing::warn!("ignoring malformed saved access codes: {}", e);
                Vec::new()
            }
        }
    }

    pub fn load_approval_flag(&self) -> bool {
        match self.kv.get(APPROVAL_STATUS_KEY) {
            Ok(value) => value.as_deref() == Some(APPROVED_MARKER),
            Err(e) => {
                tracing::warn!("failed to read approval flag: {:#}", e);
                false
            }
        }
    }

    /// Append a code. Duplicates are kept.
    pub fn remember(&self, code: &AccessCode) {
        let mut codes = self.load();
        codes.push(code.clone());

        let result = serde_json::to_string(&codes)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.kv.set(ACCESS_CODES_KEY, &json));
        if let Err(e) = result {
            tracing::warn!(code = %code, "failed to save access code: {:#}", e);
        }
    }

    pub fn mark_approved(&self) {
        if let Err(e) = self.kv.set(APPROVAL_STATUS_KEY, APPROVED_MARKER) {
            tracing::warn!("failed to persist approval flag: {:#}", e);
        }
    }
}
