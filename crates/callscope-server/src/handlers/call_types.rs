//! `/api/call-types` handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use callscope_core::error::CallscopeError;
use callscope_core::models::call_type::{CallType, CreateCallType, UpdateCallType};
use callscope_core::models::user::Role;
use callscope_core::policy;
use callscope_core::repository::{CallTypeRepository, Pagination};
use serde::Deserialize;
use uuid::Uuid;

use super::{Paginated, nullable, record_scope, require, target_organization};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentPrincipal};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCallTypesQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub organization_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<ListCallTypesQuery>,
) -> ApiResult<Json<Paginated<CallType>>> {
    let scope = policy::list_scope(&principal, query.organization_id)?;
    let result = state
        .call_types
        .list(scope, Pagination::from_page(query.page, query.limit))
        .await?;
    Ok(Json(result.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallTypeRequest {
    pub name: String,
    pub description: Option<String>,
    pub organization_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<CreateCallTypeRequest>,
) -> ApiResult<(StatusCode, Json<CallType>)> {
    policy::require_role(&principal, Role::Manager)?;
    require(&body.name, "name")?;
    let organization_id = target_organization(&principal, body.organization_id)?;
    ensure_name_free(&state, organization_id, &body.name, None).await?;

    let call_type = state
        .call_types
        .create(CreateCallType {
            organization_id,
            name: body.name,
            description: body.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(call_type)))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<CallType>> {
    let scope = record_scope(&principal)?;
    Ok(Json(state.call_types.get_by_id(scope, id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCallTypeRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateCallTypeRequest>,
) -> ApiResult<Json<CallType>> {
    policy::require_role(&principal, Role::Manager)?;
    let scope = record_scope(&principal)?;
    let existing = state.call_types.get_by_id(scope, id).await?;
    if let Some(name) = &body.name {
        require(name, "name")?;
        ensure_name_free(&state, existing.organization_id, name, Some(id)).await?;
    }

    let call_type = state
        .call_types
        .update(
            scope,
            id,
            UpdateCallType {
                name: body.name,
                description: body.description,
                is_active: body.is_active,
            },
        )
        .await?;
    Ok(Json(call_type))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    policy::require_role(&principal, Role::Manager)?;
    let scope = record_scope(&principal)?;
    state.call_types.delete(scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_name_free(
    state: &AppState,
    organization_id: Uuid,
    name: &str,
    owner: Option<Uuid>,
) -> ApiResult<()> {
    match state.call_types.get_by_name(organization_id, name).await {
        Ok(other) if Some(other.id) != owner => Err(ApiError(CallscopeError::AlreadyExists {
            entity: "call type with this name".into(),
        })),
        Ok(_) | Err(CallscopeError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
