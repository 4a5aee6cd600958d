//! Domain models for CallScope.
//!
//! Every tenant-owned record carries exactly one `organization_id`.

pub mod agent;
pub mod api_key;
pub mod call_type;
pub mod organization;
pub mod performance;
pub mod transcript;
pub mod user;
