//! SurrealDB implementation of [`UserRepository`].
//!
//! Rows hold an already-computed password hash; hashing lives in the
//! auth crate.

use callscope_core::error::CallscopeResult;
use callscope_core::models::user::{CreateUser, Role, UpdateUser, User, normalize_email};
use callscope_core::policy::TenantScope;
use callscope_core::repository::{PaginatedResult, Pagination, UserRepository};
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_opt_uuid, parse_uuid, scope_binding, scope_condition};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UserRow {
    record_id: String,
    organization_id: Option<String>,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: String,
    is_master_admin: bool,
    is_active: bool,
    reset_token_hash: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, DbError> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| DbError::Decode(format!("unknown role: {}", self.role)))?;
        Ok(User {
            id: parse_uuid("user", &self.record_id)?,
            organization_id: parse_opt_uuid("organization", self.organization_id)?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: self.password_hash,
            role,
            is_master_admin: self.is_master_admin,
            is_active: self.is_active,
            reset_token_hash: self.reset_token_hash,
            reset_token_expires_at: self.reset_token_expires_at,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn first_user(rows: Vec<UserRow>, id: String) -> Result<User, DbError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id,
        })?
        .try_into_user()
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> CallscopeResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 organization_id = $organization_id, \
                 email = $email, \
                 first_name = $first_name, last_name = $last_name, \
                 password_hash = $password_hash, \
                 role = $role, \
                 is_master_admin = $is_master_admin, \
                 is_active = true",
            )
            .bind(("id", id_str.clone()))
            .bind((
                "organization_id",
                input.organization_id.map(|o| o.to_string()),
            ))
            .bind(("email", normalize_email(&input.email)))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("password_hash", input.password_hash))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("is_master_admin", input.is_master_admin))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        Ok(self.get_by_id(TenantScope::All, id).await?)
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> CallscopeResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('user', $id) WHERE {}",
                scope_condition(scope)
            ))
            .bind(("id", id_str.clone()))
            .bind(("scope_org", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }

    async fn get_by_email(&self, email: &str) -> CallscopeResult<User> {
        let email = normalize_email(email);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE email = $email",
            )
            .bind(("email", email.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, format!("email={email}"))?)
    }

    async fn get_by_reset_token_hash(&self, token_hash: &str) -> CallscopeResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE reset_token_hash = $token_hash",
            )
            .bind(("token_hash", token_hash.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, "reset_token".into())?)
    }

    async fn update(&self, scope: TenantScope, id: Uuid, input: UpdateUser) -> CallscopeResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.first_name.is_some() {
            sets.push("first_name = $first_name");
        }
        if input.last_name.is_some() {
            sets.push("last_name = $last_name");
        }
        if input.password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if input.role.is_some() {
            sets.push("role = $role");
        }
        if input.is_master_admin.is_some() {
            sets.push("is_master_admin = $is_master_admin");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.reset_token_hash.is_some() {
            sets.push("reset_token_hash = $reset_token_hash");
        }
        if input.reset_token_expires_at.is_some() {
            sets.push("reset_token_expires_at = $reset_token_expires_at");
        }
        if input.last_login_at.is_some() {
            sets.push("last_login_at = $last_login_at");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} WHERE {}",
            sets.join(", "),
            scope_condition(scope)
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str))
            .bind(("scope_org", scope_binding(scope)));

        if let Some(email) = input.email {
            builder = builder.bind(("email", normalize_email(&email)));
        }
        if let Some(first_name) = input.first_name {
            builder = builder.bind(("first_name", first_name));
        }
        if let Some(last_name) = input.last_name {
            builder = builder.bind(("last_name", last_name));
        }
        if let Some(password_hash) = input.password_hash {
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(role) = input.role {
            builder = builder.bind(("role", role.as_str().to_string()));
        }
        if let Some(is_master_admin) = input.is_master_admin {
            builder = builder.bind(("is_master_admin", is_master_admin));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(reset_token_hash) = input.reset_token_hash {
            // Some(None) clears the field.
            builder = builder.bind(("reset_token_hash", reset_token_hash));
        }
        if let Some(expires_at) = input.reset_token_expires_at {
            builder = builder.bind(("reset_token_expires_at", expires_at));
        }
        if let Some(last_login_at) = input.last_login_at {
            builder = builder.bind(("last_login_at", last_login_at));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::from_statement("user", e))?;

        self.get_by_id(scope, id).await
    }

    async fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> CallscopeResult<PaginatedResult<User>> {
        let condition = scope_condition(scope);

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM user WHERE {condition} GROUP ALL"
            ))
            .bind(("scope_org", scope_binding(scope)))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = CountRow::total(&count_rows);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE {condition} \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset"
            ))
            .bind(("scope_org", scope_binding(scope)))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
