//! CallScope Core: domain models, repository traits, tenant policy and
//! the pure metric aggregation shared by every other crate.

pub mod analytics;
pub mod error;
pub mod models;
pub mod policy;
pub mod repository;
