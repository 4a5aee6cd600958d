//! SurrealDB implementation of [`CallTypeRepository`].

use callscope_core::error::CallscopeResult;
use callscope_core::models::call_type::{CallType, CreateCallType, UpdateCallType};
use callscope_core::policy::TenantScope;
use callscope_core::repository::{CallTypeRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid, scope_binding, scope_condition};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CallTypeRow {
    record_id: String,
    organization_id: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CallTypeRow {
    fn try_into_call_type(self) -> Result<CallType, DbError> {
        Ok(CallType {
            id: parse_uuid("call_type", &self.record_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the CallType repository.
#[derive(Clone)]
pub struct SurrealCallTypeRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCallTypeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CallTypeRepository for SurrealCallTypeRepository<C> {
    async fn create(&self, input: CreateCallType) -> CallscopeResult<CallType> {
        let id = Uuid::new_v4();

        let result = self
            .db
            .query(
                "CREATE type::record('call_type', $id) SET \
                 organization_id = $organization_id, \
                 name = $name, description = $description, \
                 is_active = true",
            )
            .bind(("id", id.to_string()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("name", input.name.trim().to_string()))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("call_type", e))?;

        self.get_by_id(TenantScope::All, id).await
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> CallscopeResult<CallType> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('call_type', $id) WHERE {}",
                scope_condition(scope)
            ))
            .bind(("id", id_str.clone()))
            .bind(("scope_org", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CallTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "call_type".into(),
            id: id_str,
        })?;

        Ok(row.try_into_call_type()?)
    }

    async fn get_by_name(&self, organization_id: Uuid, name: &str) -> CallscopeResult<CallType> {
        let name = name.trim().to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM call_type \
                 WHERE organization_id = $organization_id AND name = $name",
            )
            .bind(("organization_id", organization_id.to_string()))
            .bind(("name", name.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CallTypeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "call_type".into(),
            id: format!("name={name}"),
        })?;

        Ok(row.try_into_call_type()?)
    }

    async fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateCallType,
    ) -> CallscopeResult<CallType> {
        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('call_type', $id) SET {} WHERE {}",
            sets.join(", "),
            scope_condition(scope)
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id.to_string()))
            .bind(("scope_org", scope_binding(scope)));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name.trim().to_string()));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::from_statement("call_type", e))?;

        self.get_by_id(scope, id).await
    }

    async fn delete(&self, scope: TenantScope, id: Uuid) -> CallscopeResult<()> {
        self.get_by_id(scope, id).await?;

        self.db
            .query("DELETE type::record('call_type', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> CallscopeResult<PaginatedResult<CallType>> {
        let condition = scope_condition(scope);

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM call_type WHERE {condition} GROUP ALL"
            ))
            .bind(("scope_org", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total(&count_rows);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM call_type \
                 WHERE {condition} \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("scope_org", scope_binding(scope)))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CallTypeRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(CallTypeRow::try_into_call_type)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
