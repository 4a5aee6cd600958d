//! SurrealDB implementation of [`AgentPerformanceRepository`].
//!
//! A bucket's record key is its natural key
//! (`{agent_id}_{period_type}_{period_key}`), so an upsert can never
//! produce a second row for the same period. Sums and counts are the
//! source of truth; the stored `averages` object is a derived view that is
//! rewritten on every upsert.

use callscope_core::analytics::period::PeriodType;
use callscope_core::error::CallscopeResult;
use callscope_core::models::performance::{AgentPerformance, UpsertAgentPerformance};
use callscope_core::policy::TenantScope;
use callscope_core::repository::AgentPerformanceRepository;
use chrono::{DateTime, NaiveDate, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, from_json, parse_uuid, scope_binding, scope_condition, to_json};
use crate::error::DbError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, SurrealValue)]
struct AgentPerformanceRow {
    record_id: String,
    agent_id: String,
    organization_id: String,
    period_type: String,
    period_key: String,
    period_start: String,
    period_end: String,
    totals: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| DbError::Decode(format!("invalid {field} date {value:?}: {e}")))
}

impl AgentPerformanceRow {
    fn try_into_bucket(self) -> Result<AgentPerformance, DbError> {
        let period_type = PeriodType::parse(&self.period_type).ok_or_else(|| {
            DbError::Decode(format!("unknown period type: {}", self.period_type))
        })?;
        Ok(AgentPerformance {
            id: self.record_id,
            agent_id: parse_uuid("agent", &self.agent_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            period_type,
            period_key: self.period_key,
            period_start: parse_date("period_start", &self.period_start)?,
            period_end: parse_date("period_end", &self.period_end)?,
            totals: from_json("totals", self.totals)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn collect_buckets(rows: Vec<AgentPerformanceRow>) -> Result<Vec<AgentPerformance>, DbError> {
    rows.into_iter()
        .map(AgentPerformanceRow::try_into_bucket)
        .collect()
}

/// SurrealDB implementation of the agent performance bucket repository.
#[derive(Clone)]
pub struct SurrealAgentPerformanceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAgentPerformanceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, id: &str) -> Result<Option<AgentPerformance>, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('agent_performance', $id)",
            )
            .bind(("id", id.to_string()))
            .await?;

        let rows: Vec<AgentPerformanceRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(AgentPerformanceRow::try_into_bucket)
            .transpose()
    }
}

impl<C: Connection> AgentPerformanceRepository for SurrealAgentPerformanceRepository<C> {
    async fn get(
        &self,
        agent_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> CallscopeResult<Option<AgentPerformance>> {
        let id = AgentPerformance::bucket_id(agent_id, period_type, period_key);
        Ok(self.fetch(&id).await?)
    }

    async fn upsert(&self, input: UpsertAgentPerformance) -> CallscopeResult<AgentPerformance> {
        let period = input.period;
        let id = AgentPerformance::bucket_id(input.agent_id, period.period_type, &period.key);

        let result = self
            .db
            .query(
                "UPSERT type::record('agent_performance', $id) SET \
                 agent_id = $agent_id, organization_id = $organization_id, \
                 period_type = $period_type, period_key = $period_key, \
                 period_start = $period_start, period_end = $period_end, \
                 call_count = $call_count, \
                 totals = $totals, averages = $averages, \
                 updated_at = time::now()",
            )
            .bind(("id", id.clone()))
            .bind(("agent_id", input.agent_id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("period_type", period.period_type.as_str().to_string()))
            .bind(("period_key", period.key))
            .bind(("period_start", period.start.format(DATE_FORMAT).to_string()))
            .bind(("period_end", period.end.format(DATE_FORMAT).to_string()))
            .bind(("call_count", input.totals.call_count))
            .bind(("totals", to_json(&input.totals)?))
            .bind(("averages", to_json(&input.totals.averages())?))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("agent_performance", e))?;

        let bucket = self.fetch(&id).await?.ok_or_else(|| DbError::NotFound {
            entity: "agent_performance".into(),
            id,
        })?;
        Ok(bucket)
    }

    async fn list_for_agent(
        &self,
        agent_id: Uuid,
        period_type: PeriodType,
        limit: u64,
    ) -> CallscopeResult<Vec<AgentPerformance>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM agent_performance \
                 WHERE agent_id = $agent_id AND period_type = $period_type \
                 ORDER BY period_start DESC \
                 LIMIT $limit",
            )
            .bind(("agent_id", agent_id.to_string()))
            .bind(("period_type", period_type.as_str().to_string()))
            .bind(("limit", limit))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentPerformanceRow> = result.take(0).map_err(DbError::from)?;
        let mut buckets = collect_buckets(rows)?;
        buckets.reverse();
        Ok(buckets)
    }

    async fn list_all(&self, scope: TenantScope) -> CallscopeResult<Vec<AgentPerformance>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM agent_performance \
                 WHERE {} ORDER BY period_start ASC",
                scope_condition(scope)
            ))
            .bind(("scope_org", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentPerformanceRow> = result.take(0).map_err(DbError::from)?;
        Ok(collect_buckets(rows)?)
    }

    async fn delete_all(&self, scope: TenantScope) -> CallscopeResult<u64> {
        let condition = scope_condition(scope);

        let result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM agent_performance \
                 WHERE {condition} GROUP ALL; \
                 DELETE agent_performance WHERE {condition};"
            ))
            .bind(("scope_org", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("agent_performance", e))?;
        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;

        Ok(CountRow::total(&count_rows))
    }
}
