pub mod access_request;

pub use access_request::{AccessCode, AccessRequest, RequestStatus};
