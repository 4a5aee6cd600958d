//! SurrealDB implementation of [`TranscriptRepository`].
//!
//! `analysis` and `metadata` are stored as flexible objects and decoded
//! into their typed records on read; unknown keys survive in `extra`.

use callscope_core::error::CallscopeResult;
use callscope_core::models::transcript::{CreateTranscript, Transcript, UpdateTranscript};
use callscope_core::policy::TenantScope;
use callscope_core::repository::{
    PaginatedResult, Pagination, TranscriptFilter, TranscriptRepository,
};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{
    CountRow, from_json, parse_opt_uuid, parse_uuid, scope_binding, scope_condition, to_json,
};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TranscriptRow {
    record_id: String,
    organization_id: String,
    agent_id: Option<String>,
    created_by: Option<String>,
    call_type_id: Option<String>,
    title: String,
    text: String,
    analysis: serde_json::Value,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TranscriptRow {
    fn try_into_transcript(self) -> Result<Transcript, DbError> {
        Ok(Transcript {
            id: parse_uuid("transcript", &self.record_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            agent_id: parse_opt_uuid("agent", self.agent_id)?,
            created_by: parse_opt_uuid("created_by", self.created_by)?,
            call_type_id: parse_opt_uuid("call_type", self.call_type_id)?,
            title: self.title,
            text: self.text,
            analysis: from_json("analysis", self.analysis)?,
            metadata: from_json("metadata", self.metadata)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn collect_transcripts(rows: Vec<TranscriptRow>) -> Result<Vec<Transcript>, DbError> {
    rows.into_iter()
        .map(TranscriptRow::try_into_transcript)
        .collect()
}

/// WHERE clause for a scope plus filter. Every filter value is bound on
/// each query; unset ones are `NONE` and unreferenced.
fn filter_condition(scope: TenantScope, filter: &TranscriptFilter) -> String {
    let mut conditions = vec![scope_condition(scope)];
    if filter.agent_id.is_some() {
        conditions.push("agent_id = $agent_id");
    }
    if filter.call_type_id.is_some() {
        conditions.push("call_type_id = $call_type_id");
    }
    if filter.from.is_some() {
        conditions.push("created_at >= $from");
    }
    if filter.to.is_some() {
        conditions.push("created_at <= $to");
    }
    conditions.join(" AND ")
}

/// SurrealDB implementation of the Transcript repository.
#[derive(Clone)]
pub struct SurrealTranscriptRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTranscriptRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TranscriptRepository for SurrealTranscriptRepository<C> {
    async fn create(&self, input: CreateTranscript) -> CallscopeResult<Transcript> {
        let id = Uuid::new_v4();
        let created_at = input.created_at.unwrap_or_else(Utc::now);

        let result = self
            .db
            .query(
                "CREATE type::record('transcript', $id) SET \
                 organization_id = $organization_id, \
                 agent_id = $agent_id, created_by = $created_by, \
                 call_type_id = $call_type_id, \
                 title = $title, text = $text, \
                 analysis = $analysis, metadata = $metadata, \
                 created_at = $created_at, updated_at = $created_at",
            )
            .bind(("id", id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("agent_id", input.agent_id.map(|a| a.to_string())))
            .bind(("created_by", input.created_by.map(|u| u.to_string())))
            .bind(("call_type_id", input.call_type_id.map(|c| c.to_string())))
            .bind(("title", input.title))
            .bind(("text", input.text))
            .bind(("analysis", to_json(&input.analysis.unwrap_or_default())?))
            .bind(("metadata", to_json(&input.metadata.unwrap_or_default())?))
            .bind(("created_at", created_at))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("transcript", e))?;

        self.get_by_id(TenantScope::All, id).await
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> CallscopeResult<Transcript> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('transcript', $id) WHERE {}",
                scope_condition(scope)
            ))
            .bind(("id", id_str.clone()))
            .bind(("scope_org", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TranscriptRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "transcript".into(),
            id: id_str,
        })?;

        Ok(row.try_into_transcript()?)
    }

    async fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateTranscript,
    ) -> CallscopeResult<Transcript> {
        let mut sets = Vec::new();
        if input.title.is_some() {
            sets.push("title = $title");
        }
        if input.agent_id.is_some() {
            sets.push("agent_id = $agent_id");
        }
        if input.call_type_id.is_some() {
            sets.push("call_type_id = $call_type_id");
        }
        if input.analysis.is_some() {
            sets.push("analysis = $analysis");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('transcript', $id) SET {} WHERE {}",
            sets.join(", "),
            scope_condition(scope)
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("scope_org", scope_binding(scope)));

        if let Some(title) = input.title {
            builder = builder.bind(("title", title));
        }
        if let Some(agent_id) = input.agent_id {
            builder = builder.bind(("agent_id", agent_id.map(|a| a.to_string())));
        }
        if let Some(call_type_id) = input.call_type_id {
            builder = builder.bind(("call_type_id", call_type_id.map(|c| c.to_string())));
        }
        if let Some(analysis) = input.analysis {
            builder = builder.bind(("analysis", to_json(&analysis)?));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", to_json(&metadata)?));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::from_statement("transcript", e))?;

        self.get_by_id(scope, id).await
    }

    async fn delete(&self, scope: TenantScope, id: Uuid) -> CallscopeResult<()> {
        // Existence check doubles as the tenant check.
        self.get_by_id(scope, id).await?;

        self.db
            .query("DELETE type::record('transcript', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(
        &self,
        scope: TenantScope,
        filter: TranscriptFilter,
        pagination: Pagination,
    ) -> CallscopeResult<PaginatedResult<Transcript>> {
        let condition = filter_condition(scope, &filter);

        let count_query = format!(
            "SELECT count() AS total FROM transcript WHERE {condition} GROUP ALL"
        );
        let mut count_result = self
            .db
            .query(&count_query)
            .bind(("scope_org", scope_binding(scope)))
            .bind(("agent_id", filter.agent_id.map(|a| a.to_string())))
            .bind(("call_type_id", filter.call_type_id.map(|c| c.to_string())))
            .bind(("from", filter.from))
            .bind(("to", filter.to))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total(&count_rows);

        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM transcript \
             WHERE {condition} \
             ORDER BY created_at DESC \
             LIMIT $limit START $offset"
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("scope_org", scope_binding(scope)))
            .bind(("agent_id", filter.agent_id.map(|a| a.to_string())))
            .bind(("call_type_id", filter.call_type_id.map(|c| c.to_string())))
            .bind(("from", filter.from))
            .bind(("to", filter.to))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TranscriptRow> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: collect_transcripts(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_all(
        &self,
        scope: TenantScope,
        filter: TranscriptFilter,
    ) -> CallscopeResult<Vec<Transcript>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM transcript \
             WHERE {} ORDER BY created_at ASC",
            filter_condition(scope, &filter)
        );
        let mut result = self
            .db
            .query(&query)
            .bind(("scope_org", scope_binding(scope)))
            .bind(("agent_id", filter.agent_id.map(|a| a.to_string())))
            .bind(("call_type_id", filter.call_type_id.map(|c| c.to_string())))
            .bind(("from", filter.from))
            .bind(("to", filter.to))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TranscriptRow> = result.take(0).map_err(DbError::from)?;
        Ok(collect_transcripts(rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_condition_includes_only_set_fields() {
        let org = Uuid::new_v4();
        let filter = TranscriptFilter {
            agent_id: Some(Uuid::new_v4()),
            from: Some(Utc::now()),
            ..Default::default()
        };
        let cond = filter_condition(TenantScope::Organization(org), &filter);
        assert_eq!(
            cond,
            "organization_id = $scope_org AND agent_id = $agent_id AND created_at >= $from"
        );
    }

    #[test]
    fn empty_filter_under_global_scope() {
        let cond = filter_condition(TenantScope::All, &TranscriptFilter::default());
        assert_eq!(cond, "true");
    }
}
