//! Metrics job configuration.

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::JobError;

/// Settings for the scheduled performance recompute.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsJobConfig {
    pub enabled: bool,
    /// Cron expression with a seconds field, evaluated at
    /// `utc_offset_minutes` (default: daily at local midnight).
    pub schedule: String,
    /// Trailing window recomputed for each agent.
    pub window_days: u32,
    /// Offset from UTC for the schedule and for the calendar dates of
    /// period keys and the first-of-month snapshot.
    pub utc_offset_minutes: i32,
}

impl Default for MetricsJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: "0 0 0 * * *".into(),
            window_days: 30,
            utc_offset_minutes: 0,
        }
    }
}

impl MetricsJobConfig {
    pub fn offset(&self) -> Result<FixedOffset, JobError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or(JobError::InvalidOffset(self.utc_offset_minutes))
    }
}
