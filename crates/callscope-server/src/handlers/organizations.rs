//! `/api/organizations/current` handlers: the caller's own tenant, its
//! usage and its API keys.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use callscope_core::models::api_key::ApiKey;
use callscope_core::models::organization::{
    Organization, OrganizationFeatures, OrganizationUsage, SubscriptionTier, UpdateOrganization,
};
use callscope_core::models::user::Role;
use callscope_core::policy::{self, TenantScope};
use callscope_core::repository::{
    AgentFilter, AgentRepository, ApiKeyRepository, CallTypeRepository, OrganizationRepository,
    Pagination, TranscriptFilter, TranscriptRepository, UserRepository,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, CurrentPrincipal};
use crate::state::AppState;

pub async fn current(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Organization>> {
    let organization_id = principal.own_organization()?;
    Ok(Json(state.organizations.get_by_id(organization_id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCurrentRequest {
    pub name: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Admins may rename their organization and edit its metadata. Plan and
/// limits are managed by master admins.
pub async fn update_current(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<UpdateCurrentRequest>,
) -> ApiResult<Json<Organization>> {
    policy::require_role(&principal, Role::Admin)?;
    let organization_id = principal.own_organization()?;
    if let Some(name) = &body.name {
        require(name, "name")?;
    }
    let organization = state
        .organizations
        .update(
            organization_id,
            UpdateOrganization {
                name: body.name.map(|n| n.trim().to_string()),
                metadata: body.metadata,
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(organization))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceCounts {
    pub users: u64,
    pub agents: u64,
    pub transcripts: u64,
    pub call_types: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationStats {
    pub organization_id: Uuid,
    pub subscription_tier: SubscriptionTier,
    pub features: OrganizationFeatures,
    pub usage: OrganizationUsage,
    pub counts: ResourceCounts,
}

/// Stored usage counters next to live counts, which may differ.
pub async fn stats(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<OrganizationStats>> {
    let organization_id = principal.own_organization()?;
    let organization = state.organizations.get_by_id(organization_id).await?;
    let scope = TenantScope::Organization(organization_id);
    let count_only = Pagination {
        offset: 0,
        limit: 1,
    };

    let users = state.users.list(scope, count_only).await?.total;
    let agents = state
        .agents
        .list(scope, AgentFilter::default(), count_only)
        .await?
        .total;
    let transcripts = state
        .transcripts
        .list(scope, TranscriptFilter::default(), count_only)
        .await?
        .total;
    let call_types = state.call_types.list(scope, count_only).await?.total;

    Ok(Json(OrganizationStats {
        organization_id,
        subscription_tier: organization.subscription_tier,
        features: organization.features,
        usage: organization.usage,
        counts: ResourceCounts {
            users,
            agents,
            transcripts,
            call_types,
        },
    }))
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<Vec<ApiKey>>> {
    policy::require_role(&principal, Role::Admin)?;
    let organization_id = principal.own_organization()?;
    Ok(Json(
        state
            .api_keys
            .list_by_organization(organization_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApiKey {
    pub api_key: ApiKey,
    /// Shown once.
    pub key: String,
}

pub async fn create_api_key(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<CreateApiKeyRequest>,
) -> ApiResult<(StatusCode, Json<CreatedApiKey>)> {
    policy::require_role(&principal, Role::Admin)?;
    let organization_id = principal.own_organization()?;
    let (api_key, key) = state
        .auth
        .create_api_key(organization_id, body.name, principal.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedApiKey { api_key, key })))
}

pub async fn revoke_api_key(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    policy::require_role(&principal, Role::Admin)?;
    let organization_id = principal.own_organization()?;
    state.api_keys.revoke(organization_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
