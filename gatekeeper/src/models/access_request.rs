use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits in an issued access code.
pub const CODE_LEN: usize = 5;

/// A short numeric code identifying one access request.
///
/// Codes minted by [`crate::codegen::CodeGenerator`] are always five ASCII
/// digits. Codes typed by a user are taken as-is; [`AccessCode::is_well_formed`]
/// reports whether they look like something this client could have issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCode(String);

impl AccessCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        self.0.len() == CODE_LEN && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for AccessCode {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

/// Row in the remote `access_requests` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessRequest {
    pub code: AccessCode,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl AccessRequest {
    /// A fresh request awaiting an administrator's decision.
    pub fn pending(code: AccessCode) -> Self {
        Self {
            code,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// Status column of an access request.
///
/// Administrators write this column through their own tooling, so anything
/// other than `pending`/`approved` is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestStatus {
    Pending,
    Approved,
    Other(String),
}

impl RequestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Other(s) => s,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, RequestStatus::Approved)
    }
}

impl From<String> for RequestStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => RequestStatus::Pending,
            "approved" => RequestStatus::Approved,
            _ => RequestStatus::Other(value),
        }
    }
}

impl From<RequestStatus> for String {
    fn from(value: RequestStatus) -> Self {
        match value {
            RequestStatus::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
