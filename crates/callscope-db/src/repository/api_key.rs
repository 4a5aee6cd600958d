//! SurrealDB implementation of [`ApiKeyRepository`].

use callscope_core::error::CallscopeResult;
use callscope_core::models::api_key::{ApiKey, CreateApiKey};
use callscope_core::repository::ApiKeyRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ApiKeyRow {
    record_id: String,
    organization_id: String,
    name: String,
    prefix: String,
    secret_hash: String,
    is_active: bool,
    last_used_at: Option<DateTime<Utc>>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl ApiKeyRow {
    fn try_into_api_key(self) -> Result<ApiKey, DbError> {
        Ok(ApiKey {
            id: parse_uuid("api_key", &self.record_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            name: self.name,
            prefix: self.prefix,
            secret_hash: self.secret_hash,
            is_active: self.is_active,
            last_used_at: self.last_used_at,
            created_by: parse_opt_uuid("created_by", self.created_by)?,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the ApiKey repository.
#[derive(Clone)]
pub struct SurrealApiKeyRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealApiKeyRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ApiKeyRepository for SurrealApiKeyRepository<C> {
    async fn create(&self, input: CreateApiKey) -> CallscopeResult<ApiKey> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('api_key', $id) SET \
                 organization_id = $organization_id, \
                 name = $name, prefix = $prefix, \
                 secret_hash = $secret_hash, \
                 is_active = true, \
                 created_by = $created_by",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", input.organization_id.to_string()))
            .bind(("name", input.name))
            .bind(("prefix", input.prefix.clone()))
            .bind(("secret_hash", input.secret_hash))
            .bind(("created_by", input.created_by.map(|u| u.to_string())))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("api_key", e))?;

        self.get_by_prefix(&input.prefix).await
    }

    async fn get_by_prefix(&self, prefix: &str) -> CallscopeResult<ApiKey> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM api_key \
                 WHERE prefix = $prefix",
            )
            .bind(("prefix", prefix.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "api_key".into(),
            id: format!("prefix={prefix}"),
        })?;

        Ok(row.try_into_api_key()?)
    }

    async fn list_by_organization(&self, organization_id: Uuid) -> CallscopeResult<Vec<ApiKey>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM api_key \
                 WHERE organization_id = $organization_id \
                 ORDER BY created_at DESC",
            )
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(ApiKeyRow::try_into_api_key)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn revoke(&self, organization_id: Uuid, id: Uuid) -> CallscopeResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('api_key', $id) \
                 WHERE organization_id = $organization_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ApiKeyRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "api_key".into(),
                id: id_str,
            }
            .into());
        }

        self.db
            .query("UPDATE type::record('api_key', $id) SET is_active = false")
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn touch(&self, id: Uuid, used_at: DateTime<Utc>) -> CallscopeResult<()> {
        self.db
            .query("UPDATE type::record('api_key', $id) SET last_used_at = $used_at")
            .bind(("id", id.to_string()))
            .bind(("used_at", used_at))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}
