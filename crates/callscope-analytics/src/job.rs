//! The scheduled performance recompute.

use std::sync::Arc;

use callscope_core::analytics::period::local_date;
use callscope_core::error::CallscopeResult;
use callscope_core::repository::{
    AgentPerformanceRepository, AgentRepository, OrganizationRepository, TranscriptRepository,
};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::service::AnalyticsService;

/// Work run by [`crate::scheduler::JobScheduler`] at each fire time.
pub trait ScheduledJob: Send + Sync + 'static {
    fn run(&self, now: DateTime<Utc>) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    /// Active organizations visited.
    pub organizations: u64,
    pub agents_updated: u64,
    /// Failed agents plus organizations that failed as a whole.
    pub failures: u64,
}

/// Recomputes every active agent of every active organization over a
/// trailing window. A historical snapshot is kept on the first calendar
/// day of the month.
pub struct MetricsJob<O, A, T, P> {
    organizations: O,
    analytics: Arc<AnalyticsService<A, T, P>>,
    window_days: u32,
}

impl<O, A, T, P> MetricsJob<O, A, T, P>
where
    O: OrganizationRepository,
    A: AgentRepository,
    T: TranscriptRepository,
    P: AgentPerformanceRepository,
{
    pub fn new(
        organizations: O,
        analytics: Arc<AnalyticsService<A, T, P>>,
        window_days: u32,
    ) -> Self {
        Self {
            organizations,
            analytics,
            window_days,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> CallscopeResult<JobReport> {
        let save_historical = local_date(now, self.analytics.offset()).day() == 1;
        let mut report = JobReport::default();

        for organization in self.organizations.list_active().await? {
            report.organizations += 1;
            match self
                .analytics
                .update_all(organization.id, self.window_days, save_historical, now)
                .await
            {
                Ok(org_report) => {
                    report.agents_updated += org_report.agents_updated;
                    report.failures += org_report.failures;
                }
                Err(e) => {
                    report.failures += 1;
                    error!(
                        organization_id = %organization.id,
                        error = %e,
                        "Performance update failed for organization"
                    );
                }
            }
        }

        Ok(report)
    }
}

impl<O, A, T, P> ScheduledJob for MetricsJob<O, A, T, P>
where
    O: OrganizationRepository + 'static,
    A: AgentRepository + 'static,
    T: TranscriptRepository + 'static,
    P: AgentPerformanceRepository + 'static,
{
    async fn run(&self, now: DateTime<Utc>) {
        match self.run_once(now).await {
            Ok(report) => info!(
                organizations = report.organizations,
                agents_updated = report.agents_updated,
                failures = report.failures,
                "Metrics job finished"
            ),
            Err(e) => error!(error = %e, "Metrics job failed"),
        }
    }
}
