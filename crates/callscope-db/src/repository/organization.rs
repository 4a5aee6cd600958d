//! SurrealDB implementation of [`OrganizationRepository`].
//!
//! Feature limits and usage counters are stored as flat columns so the
//! counters can be adjusted in place.

use callscope_core::error::CallscopeResult;
use callscope_core::models::organization::{
    CreateOrganization, Organization, OrganizationFeatures, OrganizationUsage, SubscriptionTier,
    UpdateOrganization, normalize_code,
};
use callscope_core::repository::{OrganizationRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    record_id: String,
    name: String,
    code: String,
    subscription_tier: String,
    max_users: u64,
    max_calls: u64,
    api_access: bool,
    user_count: u64,
    call_count: u64,
    is_master: bool,
    is_active: bool,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrganizationRow {
    fn try_into_organization(self) -> Result<Organization, DbError> {
        let subscription_tier = SubscriptionTier::parse(&self.subscription_tier).ok_or_else(|| {
            DbError::Decode(format!(
                "unknown subscription tier: {}",
                self.subscription_tier
            ))
        })?;
        Ok(Organization {
            id: parse_uuid("organization", &self.record_id)?,
            name: self.name,
            code: self.code,
            subscription_tier,
            features: OrganizationFeatures {
                max_users: self.max_users,
                max_calls: self.max_calls,
                api_access: self.api_access,
            },
            usage: OrganizationUsage {
                user_count: self.user_count,
                call_count: self.call_count,
            },
            is_master: self.is_master,
            is_active: self.is_active,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const SELECT_ORGANIZATION: &str = "SELECT meta::id(id) AS record_id, * FROM organization";

/// SurrealDB implementation of the Organization repository.
#[derive(Clone)]
pub struct SurrealOrganizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOrganizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(&self, id_str: String) -> Result<Organization, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('organization', $id)",
            )
            .bind(("id", id_str.clone()))
            .await?;

        let rows: Vec<OrganizationRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "organization".into(),
            id: id_str,
        })?;
        row.try_into_organization()
    }
}

impl<C: Connection> OrganizationRepository for SurrealOrganizationRepository<C> {
    async fn create(&self, input: CreateOrganization) -> CallscopeResult<Organization> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let features = input
            .features
            .unwrap_or_else(|| input.subscription_tier.default_features());
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('organization', $id) SET \
                 name = $name, code = $code, \
                 subscription_tier = $tier, \
                 max_users = $max_users, max_calls = $max_calls, \
                 api_access = $api_access, \
                 user_count = 0, call_count = 0, \
                 is_master = $is_master, is_active = true, \
                 metadata = $metadata",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("code", normalize_code(&input.code)))
            .bind(("tier", input.subscription_tier.as_str().to_string()))
            .bind(("max_users", features.max_users))
            .bind(("max_calls", features.max_calls))
            .bind(("api_access", features.api_access))
            .bind(("is_master", input.is_master))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("organization", e))?;

        Ok(self.fetch_one(id_str).await?)
    }

    async fn get_by_id(&self, id: Uuid) -> CallscopeResult<Organization> {
        Ok(self.fetch_one(id.to_string()).await?)
    }

    async fn get_by_code(&self, code: &str) -> CallscopeResult<Organization> {
        let code = normalize_code(code);

        let mut result = self
            .db
            .query(format!("{SELECT_ORGANIZATION} WHERE code = $code"))
            .bind(("code", code.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "organization".into(),
            id: format!("code={code}"),
        })?;

        Ok(row.try_into_organization()?)
    }

    async fn update(&self, id: Uuid, input: UpdateOrganization) -> CallscopeResult<Organization> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.subscription_tier.is_some() {
            sets.push("subscription_tier = $tier");
        }
        if input.features.is_some() {
            sets.push("max_users = $max_users");
            sets.push("max_calls = $max_calls");
            sets.push("api_access = $api_access");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('organization', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(tier) = input.subscription_tier {
            builder = builder.bind(("tier", tier.as_str().to_string()));
        }
        if let Some(features) = input.features {
            builder = builder
                .bind(("max_users", features.max_users))
                .bind(("max_calls", features.max_calls))
                .bind(("api_access", features.api_access));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::from_statement("organization", e))?;

        Ok(self.fetch_one(id_str).await?)
    }

    async fn list(&self, pagination: Pagination) -> CallscopeResult<PaginatedResult<Organization>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM organization GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total(&count_rows);

        let mut result = self
            .db
            .query(format!(
                "{SELECT_ORGANIZATION} ORDER BY created_at ASC \
                 LIMIT $limit START $offset"
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(OrganizationRow::try_into_organization)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_active(&self) -> CallscopeResult<Vec<Organization>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_ORGANIZATION} WHERE is_active = true ORDER BY created_at ASC"
            ))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(OrganizationRow::try_into_organization)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn increment_usage(&self, id: Uuid, users: i64, calls: i64) -> CallscopeResult<()> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('organization', $id) SET \
                 user_count = math::max([user_count + $users, 0]), \
                 call_count = math::max([call_count + $calls, 0])",
            )
            .bind(("id", id_str))
            .bind(("users", users))
            .bind(("calls", calls))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("organization", e))?;

        Ok(())
    }
}
