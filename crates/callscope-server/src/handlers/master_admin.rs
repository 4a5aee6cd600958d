//! `/api/master-admin` handlers. Every route requires global access.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use callscope_auth::service::NewUser;
use callscope_core::error::CallscopeError;
use callscope_core::models::organization::{
    CreateOrganization, Organization, OrganizationFeatures, SubscriptionTier, UpdateOrganization,
    normalize_code,
};
use callscope_core::models::user::{Role, UpdateUser, User};
use callscope_core::policy::{self, TenantScope};
use callscope_core::repository::{OrganizationRepository, Pagination, UserRepository};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{PageQuery, Paginated, require};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentPrincipal};
use crate::state::AppState;

pub async fn list_organizations(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<Paginated<Organization>>> {
    policy::require_global(&principal)?;
    let result = state.organizations.list(query.pagination()).await?;
    Ok(Json(result.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    pub features: Option<OrganizationFeatures>,
    #[serde(default)]
    pub is_master: bool,
    pub metadata: Option<serde_json::Value>,
}

pub async fn create_organization(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<CreateOrganizationRequest>,
) -> ApiResult<(StatusCode, Json<Organization>)> {
    policy::require_global(&principal)?;
    require(&body.name, "name")?;
    require(&body.code, "code")?;

    let code = normalize_code(&body.code);
    match state.organizations.get_by_code(&code).await {
        Ok(_) => {
            return Err(ApiError(CallscopeError::AlreadyExists {
                entity: "organization with this code".into(),
            }));
        }
        Err(CallscopeError::NotFound { .. }) => {}
        Err(e) => return Err(e.into()),
    }

    let organization = state
        .organizations
        .create(CreateOrganization {
            name: body.name.trim().to_string(),
            code,
            subscription_tier: body.subscription_tier,
            features: body.features,
            is_master: body.is_master,
            metadata: body.metadata,
        })
        .await?;
    info!(organization_id = %organization.id, "Organization created by master admin");
    Ok((StatusCode::CREATED, Json(organization)))
}

pub async fn get_organization(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Organization>> {
    policy::require_global(&principal)?;
    Ok(Json(state.organizations.get_by_id(id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub subscription_tier: Option<SubscriptionTier>,
    pub features: Option<OrganizationFeatures>,
    pub is_active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

/// A tier change without explicit features resets the limits to the new
/// tier's defaults.
pub async fn update_organization(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    policy::require_global(&principal)?;
    if let Some(name) = &body.name {
        require(name, "name")?;
    }
    let features = body
        .features
        .or_else(|| body.subscription_tier.map(|t| t.default_features()));

    let organization = state
        .organizations
        .update(
            id,
            UpdateOrganization {
                name: body.name.map(|n| n.trim().to_string()),
                subscription_tier: body.subscription_tier,
                features,
                is_active: body.is_active,
                metadata: body.metadata,
            },
        )
        .await?;
    Ok(Json(organization))
}

/// Deactivates the organization. Its members can no longer sign in.
pub async fn delete_organization(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    policy::require_global(&principal)?;
    if principal.organization_id == Some(id) {
        return Err(ApiError::bad_request(
            "you cannot deactivate your own organization",
        ));
    }
    state
        .organizations
        .update(
            id,
            UpdateOrganization {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?;
    info!(organization_id = %id, "Organization deactivated");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub organization_id: Option<Uuid>,
}

pub async fn list_users(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> ApiResult<Json<Paginated<User>>> {
    policy::require_global(&principal)?;
    let scope = query
        .organization_id
        .map_or(TenantScope::All, TenantScope::Organization);
    let result = state
        .users
        .list(scope, Pagination::from_page(query.page, query.limit))
        .await?;
    Ok(Json(result.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub organization_id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_master_admin: bool,
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    policy::require_global(&principal)?;
    require(&body.email, "email")?;
    require(&body.first_name, "firstName")?;
    require(&body.last_name, "lastName")?;
    if body.organization_id.is_none() && !body.is_master_admin {
        return Err(ApiError::bad_request(
            "organizationId is required unless the user is a master admin",
        ));
    }

    let created = state
        .auth
        .create_user(NewUser {
            organization_id: body.organization_id,
            email: body.email,
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            password: body.password,
            role: body.role,
            is_master_admin: body.is_master_admin,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created.user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterAdminRequest {
    pub is_master_admin: bool,
}

pub async fn set_master_admin(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<MasterAdminRequest>,
) -> ApiResult<Json<User>> {
    policy::require_global(&principal)?;
    if principal.user_id == Some(id) && !body.is_master_admin {
        return Err(ApiError::bad_request(
            "you cannot revoke your own master admin access",
        ));
    }
    let user = state
        .users
        .update(
            TenantScope::All,
            id,
            UpdateUser {
                is_master_admin: Some(body.is_master_admin),
                ..Default::default()
            },
        )
        .await?;
    info!(user_id = %id, is_master_admin = body.is_master_admin, "Master admin flag changed");
    Ok(Json(user))
}
