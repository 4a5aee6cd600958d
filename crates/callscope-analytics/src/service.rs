//! Agent performance service.
//!
//! Two paths share the pure aggregation in `callscope_core::analytics`:
//!
//! - the full recompute summarizes an agent's transcripts over a window
//!   and stores the result on the agent;
//! - the incremental rollup merges each scored transcript into the
//!   daily, weekly, monthly and quarterly buckets containing it.
//!
//! Buckets keep raw sums and per-field counts. Averages are derived from
//! them on every write, so normalizing is a pure refresh and safe to
//! repeat.

use callscope_core::analytics::period::{Period, PeriodType, local_date, periods_for};
use callscope_core::analytics::summarize;
use callscope_core::error::CallscopeResult;
use callscope_core::models::performance::{
    PerformanceMetrics, PeriodSummary, TrendPoint, UpsertAgentPerformance,
};
use callscope_core::models::transcript::Transcript;
use callscope_core::policy::TenantScope;
use callscope_core::repository::{
    AgentPerformanceRepository, AgentRepository, TranscriptFilter, TranscriptRepository,
};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of recomputing every active agent of one organization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub agents_updated: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub buckets_deleted: u64,
    pub transcripts_replayed: u64,
    pub buckets_normalized: u64,
}

/// One agent's current-period summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub agent_id: Uuid,
    pub name: String,
    pub team: Option<String>,
    pub current_period: Option<PeriodSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub organization_id: Uuid,
    pub agent_count: u64,
    /// Sum of the agents' current-period call counts.
    pub total_calls: u64,
    pub agents: Vec<AgentSummary>,
}

/// Performance aggregation over the agent, transcript and bucket
/// repositories.
pub struct AnalyticsService<A, T, P> {
    agents: A,
    transcripts: T,
    performance: P,
    offset: FixedOffset,
}

impl<A, T, P> AnalyticsService<A, T, P>
where
    A: AgentRepository,
    T: TranscriptRepository,
    P: AgentPerformanceRepository,
{
    /// `offset` decides which calendar day a transcript falls on.
    pub fn new(agents: A, transcripts: T, performance: P, offset: FixedOffset) -> Self {
        Self {
            agents,
            transcripts,
            performance,
            offset,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Summarize an agent's scored transcripts created in `[from, to]` and
    /// store the result as its current period.
    pub async fn recompute_agent(
        &self,
        scope: TenantScope,
        agent_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        save_historical: bool,
    ) -> CallscopeResult<PerformanceMetrics> {
        let agent = self.agents.get_by_id(scope, agent_id).await?;

        let transcripts: Vec<Transcript> = self
            .transcripts
            .list_all(
                TenantScope::Organization(agent.organization_id),
                TranscriptFilter {
                    agent_id: Some(agent.id),
                    from: Some(from),
                    to: Some(to),
                    ..Default::default()
                },
            )
            .await?
            .into_iter()
            .filter(Transcript::is_scored)
            .collect();

        let summary = summarize(&transcripts, from, to, Utc::now());
        let mut metrics = agent.performance_metrics;
        metrics.record(summary, save_historical);
        self.agents
            .update_performance(agent.id, metrics.clone())
            .await?;

        debug!(agent_id = %agent.id, transcripts = transcripts.len(), "Agent performance recomputed");
        Ok(metrics)
    }

    /// Recompute every active agent of an organization over the trailing
    /// `window_days`. A failing agent is logged and counted; the rest
    /// still run.
    pub async fn update_all(
        &self,
        organization_id: Uuid,
        window_days: u32,
        save_historical: bool,
        now: DateTime<Utc>,
    ) -> CallscopeResult<UpdateReport> {
        let from = now - Duration::days(i64::from(window_days));
        let scope = TenantScope::Organization(organization_id);
        let mut report = UpdateReport::default();

        for agent in self.agents.list_active(organization_id).await? {
            match self
                .recompute_agent(scope, agent.id, from, now, save_historical)
                .await
            {
                Ok(_) => report.agents_updated += 1,
                Err(e) => {
                    report.failures += 1;
                    warn!(
                        organization_id = %organization_id,
                        agent_id = %agent.id,
                        error = %e,
                        "Agent performance update failed"
                    );
                }
            }
        }

        info!(
            organization_id = %organization_id,
            agents_updated = report.agents_updated,
            failures = report.failures,
            "Organization performance updated"
        );
        Ok(report)
    }

    /// Merge a transcript into the four period buckets for its creation
    /// date. Unscored transcripts and transcripts without an agent are
    /// skipped. Returns whether anything was written.
    pub async fn record_transcript(&self, transcript: &Transcript) -> CallscopeResult<bool> {
        let Some(agent_id) = transcript.agent_id else {
            return Ok(false);
        };
        if !transcript.is_scored() {
            return Ok(false);
        }

        let sample = transcript.score_sample();
        let date = local_date(transcript.created_at, self.offset);
        for period in periods_for(date) {
            let mut totals = self
                .performance
                .get(agent_id, period.period_type, &period.key)
                .await?
                .map(|bucket| bucket.totals)
                .unwrap_or_default();
            totals.absorb(&sample);

            self.performance
                .upsert(UpsertAgentPerformance {
                    agent_id,
                    organization_id: transcript.organization_id,
                    period,
                    totals,
                })
                .await?;
        }
        Ok(true)
    }

    /// Rewrite every bucket in scope with averages derived from its stored
    /// totals. Sums and counts are left untouched.
    pub async fn normalize_all(&self, scope: TenantScope) -> CallscopeResult<u64> {
        let mut normalized = 0;
        for bucket in self.performance.list_all(scope).await? {
            self.performance
                .upsert(UpsertAgentPerformance {
                    agent_id: bucket.agent_id,
                    organization_id: bucket.organization_id,
                    period: Period {
                        period_type: bucket.period_type,
                        key: bucket.period_key,
                        start: bucket.period_start,
                        end: bucket.period_end,
                    },
                    totals: bucket.totals,
                })
                .await?;
            normalized += 1;
        }
        Ok(normalized)
    }

    /// Drop every bucket in scope and replay all scored transcripts
    /// oldest first, then normalize once.
    pub async fn rebuild(&self, scope: TenantScope) -> CallscopeResult<RebuildReport> {
        let buckets_deleted = self.performance.delete_all(scope).await?;

        let mut transcripts_replayed = 0;
        for transcript in self
            .transcripts
            .list_all(scope, TranscriptFilter::default())
            .await?
        {
            if self.record_transcript(&transcript).await? {
                transcripts_replayed += 1;
            }
        }

        let buckets_normalized = self.normalize_all(scope).await?;
        let report = RebuildReport {
            buckets_deleted,
            transcripts_replayed,
            buckets_normalized,
        };
        info!(
            buckets_deleted,
            transcripts_replayed, buckets_normalized, "Performance rollups rebuilt"
        );
        Ok(report)
    }

    /// The most recent `limit` buckets of one period type, oldest first.
    pub async fn trends(
        &self,
        scope: TenantScope,
        agent_id: Uuid,
        period_type: PeriodType,
        limit: u64,
    ) -> CallscopeResult<Vec<TrendPoint>> {
        let agent = self.agents.get_by_id(scope, agent_id).await?;
        let buckets = self
            .performance
            .list_for_agent(agent.id, period_type, limit)
            .await?;
        Ok(buckets.iter().map(TrendPoint::from).collect())
    }

    /// Current-period summaries of an organization's active agents.
    pub async fn organization_summary(
        &self,
        organization_id: Uuid,
    ) -> CallscopeResult<OrganizationSummary> {
        let agents: Vec<AgentSummary> = self
            .agents
            .list_active(organization_id)
            .await?
            .into_iter()
            .map(|agent| AgentSummary {
                agent_id: agent.id,
                name: agent.name,
                team: agent.team,
                current_period: agent.performance_metrics.current_period,
            })
            .collect();

        let total_calls = agents
            .iter()
            .filter_map(|a| a.current_period.as_ref())
            .map(|p| p.call_count)
            .sum();

        Ok(OrganizationSummary {
            organization_id,
            agent_count: agents.len() as u64,
            total_calls,
            agents,
        })
    }
}
