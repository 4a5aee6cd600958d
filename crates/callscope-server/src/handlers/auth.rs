//! `/api/auth` handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use callscope_auth::service::{AuthOutput, LoginInput, RegisterInput};
use callscope_core::models::organization::Organization;
use callscope_core::models::user::User;
use callscope_core::policy::{Principal, TenantScope};
use callscope_core::repository::{OrganizationRepository, UserRepository};
use serde::{Deserialize, Serialize};

use super::{Message, require};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, CurrentPrincipal};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub organization_name: String,
    pub organization_code: Option<String>,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: User,
    pub organization: Option<Organization>,
}

impl From<AuthOutput> for TokenResponse {
    fn from(out: AuthOutput) -> Self {
        Self {
            token: out.access_token,
            expires_in: out.expires_in,
            user: out.user,
            organization: out.organization,
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    require(&body.organization_name, "organizationName")?;
    require(&body.email, "email")?;
    require(&body.first_name, "firstName")?;
    require(&body.last_name, "lastName")?;

    let out = state
        .auth
        .register(RegisterInput {
            organization_name: body.organization_name.trim().to_string(),
            organization_code: body.organization_code,
            email: body.email,
            password: body.password,
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(out.into())))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    require(&body.email, "email")?;
    require(&body.password, "password")?;

    let out = state
        .auth
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await?;
    Ok(Json(out.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub principal: Principal,
    /// Absent for API-key callers.
    pub user: Option<User>,
    pub organization: Option<Organization>,
}

pub async fn me(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> ApiResult<Json<MeResponse>> {
    let user = match principal.user_id {
        Some(id) => Some(state.users.get_by_id(TenantScope::All, id).await?),
        None => None,
    };
    let organization = match principal.organization_id {
        Some(id) => Some(state.organizations.get_by_id(id).await?),
        None => None,
    };
    Ok(Json(MeResponse {
        principal,
        user,
        organization,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Always answers the same way so that accounts cannot be discovered.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<Json<Message>> {
    require(&body.email, "email")?;
    // Delivery runs detached; the handle is not awaited.
    let _ = state.auth.forgot_password(&body.email).await?;
    Ok(Json(Message {
        message: "If an account exists for that email, a reset link has been sent",
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<Message>> {
    require(&body.token, "token")?;
    state
        .auth
        .reset_password(&body.token, &body.password)
        .await?;
    Ok(Json(Message {
        message: "Password has been reset",
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<Message>> {
    let user_id = principal
        .user_id
        .ok_or_else(|| ApiError::bad_request("API keys have no password"))?;
    state
        .auth
        .change_password(user_id, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(Message {
        message: "Password has been changed",
    }))
}
