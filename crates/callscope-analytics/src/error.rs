//! Scheduler error types.

use callscope_core::error::CallscopeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("UTC offset of {0} minutes is out of range")]
    InvalidOffset(i32),

    #[error("scheduler is already running")]
    AlreadyRunning,
}

impl From<JobError> for CallscopeError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidSchedule { .. } | JobError::InvalidOffset(_) => {
                CallscopeError::Validation {
                    message: err.to_string(),
                }
            }
            JobError::AlreadyRunning => CallscopeError::Internal(err.to_string()),
        }
    }
}
