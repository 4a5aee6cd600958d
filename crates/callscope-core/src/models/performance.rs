//! Agent performance: per-agent summaries and period buckets.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::metrics::{AverageScores, MetricAverages, MetricTotals};
use crate::analytics::period::{Period, PeriodType};
use crate::analytics::tally::TermCount;

/// Maximum number of historical summaries retained per agent.
pub const HISTORY_LIMIT: usize = 12;

/// Summary of one agent over one window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub call_count: u64,
    pub average_scores: AverageScores,
    pub average_call_duration: Option<f64>,
    pub average_talk_time: Option<f64>,
    pub average_wait_time: Option<f64>,
    pub top_strengths: Vec<TermCount>,
    pub top_areas_for_improvement: Vec<TermCount>,
    pub updated_at: DateTime<Utc>,
}

/// Stored on the agent: latest summary plus a bounded history, newest
/// first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    #[serde(default)]
    pub current_period: Option<PeriodSummary>,
    #[serde(default)]
    pub historical: Vec<PeriodSummary>,
}

impl PerformanceMetrics {
    /// Replace the current summary. With `save_historical` the summary is
    /// also pushed to the front of `historical`, dropping the oldest
    /// entries beyond [`HISTORY_LIMIT`].
    pub fn record(&mut self, summary: PeriodSummary, save_historical: bool) {
        if save_historical {
            self.historical.insert(0, summary.clone());
            self.historical.truncate(HISTORY_LIMIT);
        }
        self.current_period = Some(summary);
    }
}

/// Rollup row, unique on `(agent_id, period_type, period_key)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub id: String,
    pub agent_id: Uuid,
    pub organization_id: Uuid,
    pub period_type: PeriodType,
    pub period_key: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Raw sums and counts; the source of truth for this bucket.
    pub totals: MetricTotals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentPerformance {
    /// Deterministic record id for a bucket.
    pub fn bucket_id(agent_id: Uuid, period_type: PeriodType, period_key: &str) -> String {
        format!("{agent_id}_{}_{period_key}", period_type.as_str())
    }

    pub fn averages(&self) -> MetricAverages {
        self.totals.averages()
    }
}

/// Input for writing a bucket. The repository stores `totals` as given
/// together with the averages derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertAgentPerformance {
    pub agent_id: Uuid,
    pub organization_id: Uuid,
    pub period: Period,
    pub totals: MetricTotals,
}

/// One point in a trend series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub period_type: PeriodType,
    pub period_key: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub call_count: u64,
    pub averages: MetricAverages,
}

impl From<&AgentPerformance> for TrendPoint {
    fn from(bucket: &AgentPerformance) -> Self {
        TrendPoint {
            period_type: bucket.period_type,
            period_key: bucket.period_key.clone(),
            period_start: bucket.period_start,
            period_end: bucket.period_end,
            call_count: bucket.totals.call_count,
            averages: bucket.averages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(calls: u64) -> PeriodSummary {
        let now = Utc::now();
        PeriodSummary {
            start_date: now,
            end_date: now,
            call_count: calls,
            average_scores: AverageScores::default(),
            average_call_duration: None,
            average_talk_time: None,
            average_wait_time: None,
            top_strengths: vec![],
            top_areas_for_improvement: vec![],
            updated_at: now,
        }
    }

    #[test]
    fn history_is_newest_first_and_bounded() {
        let mut metrics = PerformanceMetrics::default();
        for calls in 1..=15 {
            metrics.record(summary(calls), true);
        }

        assert_eq!(metrics.historical.len(), HISTORY_LIMIT);
        assert_eq!(metrics.historical[0].call_count, 15);
        assert_eq!(metrics.historical[HISTORY_LIMIT - 1].call_count, 4);
        assert_eq!(metrics.current_period.unwrap().call_count, 15);
    }

    #[test]
    fn record_without_history_only_sets_current() {
        let mut metrics = PerformanceMetrics::default();
        metrics.record(summary(3), true);
        metrics.record(summary(7), false);

        assert_eq!(metrics.historical.len(), 1);
        assert_eq!(metrics.historical[0].call_count, 3);
        assert_eq!(metrics.current_period.unwrap().call_count, 7);
    }

    #[test]
    fn bucket_id_is_deterministic() {
        let agent = Uuid::nil();
        let a = AgentPerformance::bucket_id(agent, PeriodType::Weekly, "2024-W05");
        assert_eq!(a, AgentPerformance::bucket_id(agent, PeriodType::Weekly, "2024-W05"));
        assert_ne!(a, AgentPerformance::bucket_id(agent, PeriodType::Daily, "2024-W05"));
    }
}
