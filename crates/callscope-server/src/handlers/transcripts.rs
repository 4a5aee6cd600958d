//! `/api/transcripts` handlers.
//!
//! Creating a transcript is three independent writes: the transcript
//! itself, the organization's call counter and, for scored calls, the
//! period rollups. Only the first can fail the request.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use callscope_core::error::CallscopeError;
use callscope_core::models::transcript::{
    CallMetadata, CreateTranscript, Transcript, TranscriptAnalysis, UpdateTranscript,
};
use callscope_core::models::user::Role;
use callscope_core::policy::{self, TenantScope};
use callscope_core::repository::{
    AgentRepository, CallTypeRepository, OrganizationRepository, Pagination, TranscriptFilter,
    TranscriptRepository,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use super::{Paginated, nullable, record_scope, require, target_organization};
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, CurrentPrincipal};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTranscriptsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub agent_id: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub organization_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiQuery(query): ApiQuery<ListTranscriptsQuery>,
) -> ApiResult<Json<Paginated<Transcript>>> {
    let scope = policy::list_scope(&principal, query.organization_id)?;
    let filter = TranscriptFilter {
        agent_id: query.agent_id,
        call_type_id: query.call_type_id,
        from: query.from,
        to: query.to,
    };
    let result = state
        .transcripts
        .list(scope, filter, Pagination::from_page(query.page, query.limit))
        .await?;
    Ok(Json(result.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTranscriptRequest {
    pub title: String,
    pub text: String,
    pub agent_id: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub analysis: Option<TranscriptAnalysis>,
    pub metadata: Option<CallMetadata>,
    /// For importing historical calls.
    pub created_at: Option<DateTime<Utc>>,
    pub organization_id: Option<Uuid>,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiJson(body): ApiJson<CreateTranscriptRequest>,
) -> ApiResult<(StatusCode, Json<Transcript>)> {
    require(&body.title, "title")?;
    require(&body.text, "text")?;
    if let Some(analysis) = &body.analysis {
        analysis
            .scorecard
            .validate()
            .map_err(ApiError::bad_request)?;
    }
    let organization_id = target_organization(&principal, body.organization_id)?;
    let scope = TenantScope::Organization(organization_id);

    let organization = state.organizations.get_by_id(organization_id).await?;
    if !organization.is_active {
        return Err(ApiError::bad_request("organization is inactive"));
    }
    if !organization
        .features
        .allows_calls(organization.usage.call_count)
    {
        return Err(ApiError(CallscopeError::LimitExceeded {
            limit: "max_calls".into(),
        }));
    }
    check_references(&state, scope, body.agent_id, body.call_type_id).await?;

    let transcript = state
        .transcripts
        .create(CreateTranscript {
            organization_id,
            agent_id: body.agent_id,
            created_by: principal.user_id,
            call_type_id: body.call_type_id,
            title: body.title.trim().to_string(),
            text: body.text,
            analysis: body.analysis,
            metadata: body.metadata,
            created_at: body.created_at,
        })
        .await?;

    if let Err(e) = state
        .organizations
        .increment_usage(organization_id, 0, 1)
        .await
    {
        warn!(organization_id = %organization_id, error = %e, "Failed to update call usage");
    }
    feed_rollup(&state, &transcript).await;

    Ok((StatusCode::CREATED, Json(transcript)))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Transcript>> {
    let scope = record_scope(&principal)?;
    Ok(Json(state.transcripts.get_by_id(scope, id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTranscriptRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub agent_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "nullable")]
    pub call_type_id: Option<Option<Uuid>>,
    pub analysis: Option<TranscriptAnalysis>,
    pub metadata: Option<CallMetadata>,
}

/// Update a transcript. A transcript that becomes scored here is fed into
/// the rollups once; rescoring an already scored one is left to a rebuild.
pub async fn update(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateTranscriptRequest>,
) -> ApiResult<Json<Transcript>> {
    let scope = record_scope(&principal)?;
    let existing = state.transcripts.get_by_id(scope, id).await?;

    if let Some(title) = &body.title {
        require(title, "title")?;
    }
    if let Some(analysis) = &body.analysis {
        analysis
            .scorecard
            .validate()
            .map_err(ApiError::bad_request)?;
    }
    check_references(
        &state,
        TenantScope::Organization(existing.organization_id),
        body.agent_id.flatten(),
        body.call_type_id.flatten(),
    )
    .await?;

    let transcript = state
        .transcripts
        .update(
            scope,
            id,
            UpdateTranscript {
                title: body.title.map(|t| t.trim().to_string()),
                agent_id: body.agent_id,
                call_type_id: body.call_type_id,
                analysis: body.analysis,
                metadata: body.metadata,
            },
        )
        .await?;

    if !existing.is_scored() && transcript.is_scored() {
        feed_rollup(&state, &transcript).await;
    }
    Ok(Json(transcript))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentPrincipal(principal): CurrentPrincipal,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    policy::require_role(&principal, Role::Manager)?;
    let scope = record_scope(&principal)?;
    state.transcripts.delete(scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Referenced agent and call type must belong to the transcript's
/// organization.
async fn check_references(
    state: &AppState,
    scope: TenantScope,
    agent_id: Option<Uuid>,
    call_type_id: Option<Uuid>,
) -> ApiResult<()> {
    if let Some(agent_id) = agent_id {
        match state.agents.get_by_id(scope, agent_id).await {
            Ok(_) => {}
            Err(CallscopeError::NotFound { .. }) => {
                return Err(ApiError::bad_request("agentId does not match an agent"));
            }
            Err(e) => return Err(e.into()),
        }
    }
    if let Some(call_type_id) = call_type_id {
        match state.call_types.get_by_id(scope, call_type_id).await {
            Ok(_) => {}
            Err(CallscopeError::NotFound { .. }) => {
                return Err(ApiError::bad_request(
                    "callTypeId does not match a call type",
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn feed_rollup(state: &AppState, transcript: &Transcript) {
    if let Err(e) = state.analytics.record_transcript(transcript).await {
        warn!(transcript_id = %transcript.id, error = %e, "Failed to update performance rollups");
    }
}
