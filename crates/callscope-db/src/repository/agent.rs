//! SurrealDB implementation of [`AgentRepository`].

use callscope_core::error::CallscopeResult;
use callscope_core::models::agent::{Agent, CreateAgent, UpdateAgent};
use callscope_core::models::performance::PerformanceMetrics;
use callscope_core::policy::TenantScope;
use callscope_core::repository::{AgentFilter, AgentRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, from_json, parse_uuid, scope_binding, scope_condition, to_json};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AgentRow {
    record_id: String,
    organization_id: String,
    name: String,
    email: Option<String>,
    employee_id: Option<String>,
    team: Option<String>,
    is_active: bool,
    performance_metrics: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AgentRow {
    fn try_into_agent(self) -> Result<Agent, DbError> {
        Ok(Agent {
            id: parse_uuid("agent", &self.record_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            name: self.name,
            email: self.email,
            employee_id: self.employee_id,
            team: self.team,
            is_active: self.is_active,
            performance_metrics: from_json("performance_metrics", self.performance_metrics)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn collect_agents(rows: Vec<AgentRow>) -> Result<Vec<Agent>, DbError> {
    rows.into_iter().map(AgentRow::try_into_agent).collect()
}

/// SurrealDB implementation of the Agent repository.
#[derive(Clone)]
pub struct SurrealAgentRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAgentRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AgentRepository for SurrealAgentRepository<C> {
    async fn create(&self, input: CreateAgent) -> CallscopeResult<Agent> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('agent', $id) SET \
                 organization_id = $organization_id, \
                 name = $name, email = $email, \
                 employee_id = $employee_id, team = $team, \
                 is_active = true, \
                 performance_metrics = $performance_metrics",
            )
            .bind(("id", id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("name", input.name))
            .bind(("email", input.email))
            .bind(("employee_id", input.employee_id))
            .bind(("team", input.team))
            .bind((
                "performance_metrics",
                to_json(&PerformanceMetrics::default())?,
            ))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("agent", e))?;

        self.get_by_id(TenantScope::All, id).await
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> CallscopeResult<Agent> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('agent', $id) WHERE {}",
                scope_condition(scope)
            ))
            .bind(("id", id_str.clone()))
            .bind(("scope_org", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "agent".into(),
            id: id_str,
        })?;

        Ok(row.try_into_agent()?)
    }

    async fn get_by_employee_id(
        &self,
        organization_id: Uuid,
        employee_id: &str,
    ) -> CallscopeResult<Agent> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM agent \
                 WHERE organization_id = $organization_id \
                 AND employee_id = $employee_id",
            )
            .bind(("organization_id", organization_id.to_string()))
            .bind(("employee_id", employee_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "agent".into(),
            id: format!("employee_id={employee_id}"),
        })?;

        Ok(row.try_into_agent()?)
    }

    async fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateAgent,
    ) -> CallscopeResult<Agent> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.employee_id.is_some() {
            sets.push("employee_id = $employee_id");
        }
        if input.team.is_some() {
            sets.push("team = $team");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('agent', $id) SET {} WHERE {}",
            sets.join(", "),
            scope_condition(scope)
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("scope_org", scope_binding(scope)));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(employee_id) = input.employee_id {
            builder = builder.bind(("employee_id", employee_id));
        }
        if let Some(team) = input.team {
            builder = builder.bind(("team", team));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::from_statement("agent", e))?;

        self.get_by_id(scope, id).await
    }

    async fn update_performance(
        &self,
        id: Uuid,
        metrics: PerformanceMetrics,
    ) -> CallscopeResult<()> {
        let result = self
            .db
            .query(
                "UPDATE type::record('agent', $id) SET \
                 performance_metrics = $metrics, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("metrics", to_json(&metrics)?))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("agent", e))?;

        Ok(())
    }

    async fn delete(&self, scope: TenantScope, id: Uuid) -> CallscopeResult<()> {
        // Soft-delete: transcripts keep pointing at the agent.
        self.update(
            scope,
            id,
            UpdateAgent {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .map(|_| ())
    }

    async fn list(
        &self,
        scope: TenantScope,
        filter: AgentFilter,
        pagination: Pagination,
    ) -> CallscopeResult<PaginatedResult<Agent>> {
        let mut conditions = vec![scope_condition(scope)];
        if !filter.include_inactive {
            conditions.push("is_active = true");
        }
        if filter.team.is_some() {
            conditions.push("team = $team");
        }
        let condition = conditions.join(" AND ");

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM agent WHERE {condition} GROUP ALL"
            ))
            .bind(("scope_org", scope_binding(scope)))
            .bind(("team", filter.team.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total(&count_rows);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM agent \
                 WHERE {condition} \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("scope_org", scope_binding(scope)))
            .bind(("team", filter.team))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: collect_agents(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_active(&self, organization_id: Uuid) -> CallscopeResult<Vec<Agent>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM agent \
                 WHERE organization_id = $organization_id AND is_active = true \
                 ORDER BY created_at ASC",
            )
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AgentRow> = result.take(0).map_err(DbError::from)?;
        Ok(collect_agents(rows)?)
    }
}
