//! CallScope Analytics: agent performance recompute, period rollups and
//! the cron-scheduled metrics job.

pub mod config;
pub mod error;
pub mod job;
pub mod scheduler;
pub mod service;

pub use config::MetricsJobConfig;
pub use error::JobError;
pub use job::{JobReport, MetricsJob, ScheduledJob};
pub use scheduler::JobScheduler;
pub use service::{AnalyticsService, OrganizationSummary, RebuildReport, UpdateReport};
