//! `/api/agents` handlers, including per-agent performance and the
//! organization-wide analytics operations.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use callscope_analytics::{OrganizationSummary, RebuildReport, UpdateReport};
use callscope_core::analytics::period::PeriodType;
use callscope_core::error::CallscopeError;
use callscope_core::models::agent::{Agent, CreateAgent, UpdateAgent};
use callscope_core::models::performance::{PerformanceMetrics, TrendPoint};
use callscope_core::models::user::Role;
use callscope_core::policy;
use callscope_core::repository::{AgentFilter, AgentRepository, Pagination, MAX_PAGE_SIZE};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Paginated, nullable, record_scope, require, target_organization};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentPrincipal};
use crate::state::AppState;

const DEFAULT_TREND_POINTS: u64 = 12;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAgentsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub team: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub organization_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<ListAgentsQuery>,
) -> ApiResult<Json<Paginated<Agent>>> {
    let scope = policy::list_scope(&principal, query.organization_id)?;
    let filter = AgentFilter {
        include_inactive: query.include_inactive,
        team: query.team,
    };
    let result = state
        .agents
        .list(scope, filter, Pagination::from_page(query.page, query.limit))
        .await?;
    Ok(Json(result.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    pub email: Option<String>,
    pub employee_id: Option<String>,
    pub team: Option<String>,
    pub organization_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<CreateAgentRequest>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    policy::require_role(&principal, Role::Manager)?;
    require(&body.name, "name")?;
    let organization_id = target_organization(&principal, body.organization_id)?;

    let employee_id = non_blank(body.employee_id);
    if let Some(employee_id) = &employee_id {
        ensure_employee_id_free(&state, organization_id, employee_id, None).await?;
    }

    let agent = state
        .agents
        .create(CreateAgent {
            organization_id,
            name: body.name.trim().to_string(),
            email: non_blank(body.email),
            employee_id,
            team: non_blank(body.team),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Agent>> {
    let scope = record_scope(&principal)?;
    Ok(Json(state.agents.get_by_id(scope, id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub employee_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub team: Option<Option<String>>,
    pub is_active: Option<bool>,
}

pub async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateAgentRequest>,
) -> ApiResult<Json<Agent>> {
    policy::require_role(&principal, Role::Manager)?;
    let scope = record_scope(&principal)?;
    let existing = state.agents.get_by_id(scope, id).await?;

    if let Some(name) = &body.name {
        require(name, "name")?;
    }
    let employee_id = body.employee_id.map(non_blank);
    if let Some(Some(employee_id)) = &employee_id {
        ensure_employee_id_free(&state, existing.organization_id, employee_id, Some(id)).await?;
    }

    let agent = state
        .agents
        .update(
            scope,
            id,
            UpdateAgent {
                name: body.name.map(|n| n.trim().to_string()),
                email: body.email.map(non_blank),
                employee_id,
                team: body.team.map(non_blank),
                is_active: body.is_active,
            },
        )
        .await?;
    Ok(Json(agent))
}

/// Soft delete.
pub async fn delete(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    policy::require_role(&principal, Role::Manager)?;
    let scope = record_scope(&principal)?;
    state.agents.delete(scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResponse {
    pub agent_id: Uuid,
    pub name: String,
    pub performance_metrics: PerformanceMetrics,
}

pub async fn performance(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<PerformanceResponse>> {
    let scope = record_scope(&principal)?;
    let agent = state.agents.get_by_id(scope, id).await?;
    Ok(Json(PerformanceResponse {
        agent_id: agent.id,
        name: agent.name,
        performance_metrics: agent.performance_metrics,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsQuery {
    pub period_type: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsResponse {
    pub agent_id: Uuid,
    pub period_type: PeriodType,
    pub data: Vec<TrendPoint>,
}

pub async fn performance_trends(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<TrendsQuery>,
) -> ApiResult<Json<TrendsResponse>> {
    let period_type = match query.period_type.as_deref() {
        None => PeriodType::Weekly,
        Some(raw) => PeriodType::parse(raw).ok_or_else(|| {
            ApiError::bad_request("periodType must be one of daily, weekly, monthly, quarterly")
        })?,
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TREND_POINTS)
        .clamp(1, MAX_PAGE_SIZE);

    let scope = record_scope(&principal)?;
    let data = state
        .analytics
        .trends(scope, id, period_type, limit)
        .await?;
    Ok(Json(TrendsResponse {
        agent_id: id,
        period_type,
        data,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub save_historical: bool,
}

/// Recompute one agent's current period. The window defaults to the
/// configured trailing days ending now.
pub async fn recompute(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<RecomputeQuery>,
) -> ApiResult<Json<PerformanceMetrics>> {
    policy::require_role(&principal, Role::Manager)?;
    let to = query.to.unwrap_or_else(Utc::now);
    let from = query
        .from
        .unwrap_or_else(|| to - Duration::days(i64::from(state.window_days)));
    if from > to {
        return Err(ApiError::bad_request("from must not be after to"));
    }

    let scope = record_scope(&principal)?;
    let metrics = state
        .analytics
        .recompute_agent(scope, id, from, to, query.save_historical)
        .await?;
    Ok(Json(metrics))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationQuery {
    pub organization_id: Option<Uuid>,
}

pub async fn organization_performance(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<OrganizationQuery>,
) -> ApiResult<Json<OrganizationSummary>> {
    let organization_id = target_organization(&principal, query.organization_id)?;
    Ok(Json(
        state
            .analytics
            .organization_summary(organization_id)
            .await?,
    ))
}

pub async fn update_all(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<OrganizationQuery>,
) -> ApiResult<Json<UpdateReport>> {
    policy::require_role(&principal, Role::Manager)?;
    let organization_id = target_organization(&principal, query.organization_id)?;
    let report = state
        .analytics
        .update_all(organization_id, state.window_days, false, Utc::now())
        .await?;
    Ok(Json(report))
}

/// Drop and replay the period rollups. Global callers rebuild every
/// tenant unless they name one.
pub async fn rebuild(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<OrganizationQuery>,
) -> ApiResult<Json<RebuildReport>> {
    policy::require_role(&principal, Role::Admin)?;
    let scope = policy::list_scope(&principal, query.organization_id)?;
    Ok(Json(state.analytics.rebuild(scope).await?))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn ensure_employee_id_free(
    state: &AppState,
    organization_id: Uuid,
    employee_id: &str,
    owner: Option<Uuid>,
) -> ApiResult<()> {
    match state
        .agents
        .get_by_employee_id(organization_id, employee_id)
        .await
    {
        Ok(other) if Some(other.id) != owner => Err(ApiError(CallscopeError::AlreadyExists {
            entity: "agent with this employee ID".into(),
        })),
        Ok(_) | Err(CallscopeError::NotFound { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
