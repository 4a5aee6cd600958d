//! `/api/users` handlers. Reads need manager, writes need admin.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use callscope_auth::service::NewUser;
use callscope_core::error::CallscopeError;
use callscope_core::models::user::{Role, UpdateUser, User};
use callscope_core::policy;
use callscope_core::repository::{Pagination, UserRepository};
use serde::Deserialize;
use uuid::Uuid;

use super::{Paginated, record_scope, require, target_organization};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentPrincipal};
use crate::state::{AppState, Users};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub organization_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> ApiResult<Json<Paginated<User>>> {
    policy::require_role(&principal, Role::Manager)?;
    let scope = policy::list_scope(&principal, query.organization_id)?;
    let result = state
        .users
        .list(scope, Pagination::from_page(query.page, query.limit))
        .await?;
    Ok(Json(result.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Without a password the user is invited by email.
    pub password: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub organization_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    policy::require_role(&principal, Role::Admin)?;
    require(&body.email, "email")?;
    require(&body.first_name, "firstName")?;
    require(&body.last_name, "lastName")?;
    let organization_id = target_organization(&principal, body.organization_id)?;

    let created = state
        .auth
        .create_user(NewUser {
            organization_id: Some(organization_id),
            email: body.email,
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            password: body.password,
            role: body.role,
            is_master_admin: false,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created.user)))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<User>> {
    let scope = record_scope(&principal)?;
    // Everyone may read their own record.
    if principal.user_id != Some(id) {
        policy::require_role(&principal, Role::Manager)?;
    }
    Ok(Json(state.users.get_by_id(scope, id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
}

pub async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    policy::require_role(&principal, Role::Admin)?;
    let scope = record_scope(&principal)?;
    let existing = state.users.get_by_id(scope, id).await?;

    if let Some(email) = &body.email {
        require(email, "email")?;
        ensure_email_free(&state.users, email, existing.id).await?;
    }
    if principal.user_id == Some(id) && body.role.is_some_and(|r| r < existing.role) {
        return Err(ApiError::bad_request("you cannot lower your own role"));
    }

    let user = state
        .users
        .update(
            scope,
            id,
            UpdateUser {
                email: body.email,
                first_name: body.first_name.map(|s| s.trim().to_string()),
                last_name: body.last_name.map(|s| s.trim().to_string()),
                role: body.role,
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(user))
}

/// Soft delete: the user is deactivated and its seat released.
pub async fn delete(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    policy::require_role(&principal, Role::Admin)?;
    if principal.user_id == Some(id) {
        return Err(ApiError::bad_request("you cannot deactivate yourself"));
    }
    let scope = record_scope(&principal)?;
    state.auth.deactivate_user(scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn ensure_email_free(users: &Users, email: &str, owner: Uuid) -> ApiResult<()> {
    match users.get_by_email(email).await {
        Ok(other) if other.id != owner => Err(ApiError(CallscopeError::AlreadyExists {
            entity: "user with this email".into(),
        })),
        Ok(_) | Err(CallscopeError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
