//! Cron-driven runner for a [`ScheduledJob`].
//!
//! The scheduler is an ordinary value owned by the caller: `start` spawns
//! one tokio task that sleeps until each fire time of the cron schedule,
//! `stop` signals it over a watch channel and waits for it to exit. A
//! run in progress finishes before the task stops.
//!
//! Fire times are evaluated in a fixed UTC offset (UTC unless set with
//! [`JobScheduler::with_offset`]), so `0 0 0 * * *` means local midnight.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use cron::Schedule;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::JobError;
use crate::job::ScheduledJob;

pub struct JobScheduler {
    schedule: Schedule,
    offset: FixedOffset,
    running: Option<Running>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl JobScheduler {
    /// Parse a cron expression with a leading seconds field,
    /// e.g. `0 0 0 * * *` for daily at midnight.
    pub fn new(expression: &str) -> Result<Self, JobError> {
        let schedule = Schedule::from_str(expression).map_err(|e| JobError::InvalidSchedule {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            schedule,
            offset: Utc.fix(),
            running: None,
        })
    }

    /// Evaluate the cron fields in `offset` instead of UTC.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// First fire time strictly after `after`.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&self.offset))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn start<J: ScheduledJob>(&mut self, job: Arc<J>) -> Result<(), JobError> {
        if self.running.is_some() {
            return Err(JobError::AlreadyRunning);
        }

        let (shutdown, mut signal) = watch::channel(false);
        let schedule = self.schedule.clone();
        let offset = self.offset;
        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = schedule
                    .upcoming(offset)
                    .next()
                    .map(|t| t.with_timezone(&Utc))
                else {
                    warn!("Cron schedule has no further fire times");
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                debug!(next = %next, "Next scheduled run");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => job.run(Utc::now()).await,
                    // Fires on stop and when the scheduler is dropped.
                    _ = signal.changed() => break,
                }
            }
        });

        info!("Job scheduler started");
        self.running = Some(Running { shutdown, handle });
        Ok(())
    }

    /// Signal the task and wait for it to exit. No-op when not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            warn!(error = %e, "Job scheduler task ended abnormally");
        }
        info!("Job scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
    }

    impl ScheduledJob for CountingJob {
        async fn run(&self, _now: DateTime<Utc>) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_schedule_fires_at_midnight() {
        let scheduler = JobScheduler::new("0 0 0 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        assert_eq!(
            scheduler.next_fire_after(after),
            Some(Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn schedule_follows_configured_offset() {
        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();
        let scheduler = JobScheduler::new("0 0 0 * * *").unwrap().with_offset(ist);
        let after = Utc.with_ymd_and_hms(2024, 3, 10, 15, 30, 0).unwrap();
        // Local midnight of 11 March at +05:30.
        assert_eq!(
            scheduler.next_fire_after(after),
            Some(Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap())
        );

        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        let scheduler = JobScheduler::new("0 0 0 * * *").unwrap().with_offset(west);
        assert_eq!(
            scheduler.next_fire_after(after),
            Some(Utc.with_ymd_and_hms(2024, 3, 11, 5, 0, 0).unwrap())
        );
    }

    #[test]
    fn invalid_expression_is_rejected() {
        assert!(matches!(
            JobScheduler::new("every day"),
            Err(JobError::InvalidSchedule { .. })
        ));
    }

    #[tokio::test]
    async fn runs_until_stopped() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = JobScheduler::new("* * * * * *").unwrap();

        scheduler.start(job.clone()).unwrap();
        assert!(scheduler.is_running());
        assert!(matches!(
            scheduler.start(job.clone()),
            Err(JobError::AlreadyRunning)
        ));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        let runs = job.runs.load(Ordering::SeqCst);
        assert!(runs >= 1, "expected at least one run, got {runs}");

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), runs);
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let mut scheduler = JobScheduler::new("0 0 0 * * *").unwrap();
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }
}
