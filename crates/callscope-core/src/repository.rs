//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-owned repositories take a
//! [`TenantScope`] so that the organization filter is applied inside the
//! query itself; a scoped lookup of another tenant's record reports
//! `NotFound`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::analytics::period::PeriodType;
use crate::error::CallscopeResult;
use crate::models::{
    agent::{Agent, CreateAgent, UpdateAgent},
    api_key::{ApiKey, CreateApiKey},
    call_type::{CallType, CreateCallType, UpdateCallType},
    organization::{CreateOrganization, Organization, UpdateOrganization},
    performance::{AgentPerformance, PerformanceMetrics, UpsertAgentPerformance},
    transcript::{CreateTranscript, Transcript, UpdateTranscript},
    user::{CreateUser, UpdateUser, User},
};
use crate::policy::TenantScope;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u64 = 100;
pub const DEFAULT_PAGE_SIZE: u64 = 20;
/// Offsets are bound as signed 64-bit integers.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Pagination {
    /// Build from 1-based `page` and `limit` query parameters. The limit
    /// is clamped to `1..=100`; oversized pages saturate to an offset past
    /// any real result set.
    pub fn from_page(page: Option<u64>, limit: Option<u64>) -> Self {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = page.unwrap_or(1).max(1);
        Self {
            offset: (page - 1).saturating_mul(limit).min(MAX_OFFSET),
            limit,
        }
    }

    pub fn page(&self) -> u64 {
        self.offset / self.limit.max(1) + 1
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(self.limit.max(1))
    }
}

// ---------------------------------------------------------------------------
// Organizations (global scope)
// ---------------------------------------------------------------------------

pub trait OrganizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = CallscopeResult<Organization>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CallscopeResult<Organization>> + Send;
    fn get_by_code(&self, code: &str)
    -> impl Future<Output = CallscopeResult<Organization>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateOrganization,
    ) -> impl Future<Output = CallscopeResult<Organization>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = CallscopeResult<PaginatedResult<Organization>>> + Send;
    /// All organizations with `is_active = true`.
    fn list_active(&self) -> impl Future<Output = CallscopeResult<Vec<Organization>>> + Send;
    /// Add to the usage counters. Independent of the write that caused it.
    fn increment_usage(
        &self,
        id: Uuid,
        users: i64,
        calls: i64,
    ) -> impl Future<Output = CallscopeResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = CallscopeResult<User>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = CallscopeResult<User>> + Send;
    /// Emails are unique across all tenants.
    fn get_by_email(&self, email: &str) -> impl Future<Output = CallscopeResult<User>> + Send;
    fn get_by_reset_token_hash(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = CallscopeResult<User>> + Send;
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = CallscopeResult<User>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> impl Future<Output = CallscopeResult<PaginatedResult<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub include_inactive: bool,
    pub team: Option<String>,
}

pub trait AgentRepository: Send + Sync {
    fn create(&self, input: CreateAgent) -> impl Future<Output = CallscopeResult<Agent>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = CallscopeResult<Agent>> + Send;
    fn get_by_employee_id(
        &self,
        organization_id: Uuid,
        employee_id: &str,
    ) -> impl Future<Output = CallscopeResult<Agent>> + Send;
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateAgent,
    ) -> impl Future<Output = CallscopeResult<Agent>> + Send;
    /// Overwrite the stored performance metrics (last write wins).
    fn update_performance(
        &self,
        id: Uuid,
        metrics: PerformanceMetrics,
    ) -> impl Future<Output = CallscopeResult<()>> + Send;
    /// Soft-delete: sets `is_active` to false.
    fn delete(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = CallscopeResult<()>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        filter: AgentFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CallscopeResult<PaginatedResult<Agent>>> + Send;
    fn list_active(
        &self,
        organization_id: Uuid,
    ) -> impl Future<Output = CallscopeResult<Vec<Agent>>> + Send;
}

// ---------------------------------------------------------------------------
// Transcripts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TranscriptFilter {
    pub agent_id: Option<Uuid>,
    pub call_type_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait TranscriptRepository: Send + Sync {
    fn create(
        &self,
        input: CreateTranscript,
    ) -> impl Future<Output = CallscopeResult<Transcript>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = CallscopeResult<Transcript>> + Send;
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateTranscript,
    ) -> impl Future<Output = CallscopeResult<Transcript>> + Send;
    fn delete(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = CallscopeResult<()>> + Send;
    /// Newest first.
    fn list(
        &self,
        scope: TenantScope,
        filter: TranscriptFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CallscopeResult<PaginatedResult<Transcript>>> + Send;
    /// Every matching transcript, oldest first.
    fn list_all(
        &self,
        scope: TenantScope,
        filter: TranscriptFilter,
    ) -> impl Future<Output = CallscopeResult<Vec<Transcript>>> + Send;
}

// ---------------------------------------------------------------------------
// Call types
// ---------------------------------------------------------------------------

pub trait CallTypeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateCallType,
    ) -> impl Future<Output = CallscopeResult<CallType>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = CallscopeResult<CallType>> + Send;
    fn get_by_name(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> impl Future<Output = CallscopeResult<CallType>> + Send;
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateCallType,
    ) -> impl Future<Output = CallscopeResult<CallType>> + Send;
    fn delete(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = CallscopeResult<()>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> impl Future<Output = CallscopeResult<PaginatedResult<CallType>>> + Send;
}

// ---------------------------------------------------------------------------
// API keys
// ---------------------------------------------------------------------------

pub trait ApiKeyRepository: Send + Sync {
    fn create(&self, input: CreateApiKey) -> impl Future<Output = CallscopeResult<ApiKey>> + Send;
    fn get_by_prefix(&self, prefix: &str) -> impl Future<Output = CallscopeResult<ApiKey>> + Send;
    fn list_by_organization(
        &self,
        organization_id: Uuid,
    ) -> impl Future<Output = CallscopeResult<Vec<ApiKey>>> + Send;
    /// Marks the key inactive.
    fn revoke(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CallscopeResult<()>> + Send;
    fn touch(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> impl Future<Output = CallscopeResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Agent performance buckets
// ---------------------------------------------------------------------------

pub trait AgentPerformanceRepository: Send + Sync {
    fn get(
        &self,
        agent_id: Uuid,
        period_type: PeriodType,
        period_key: &str,
    ) -> impl Future<Output = CallscopeResult<Option<AgentPerformance>>> + Send;
    /// Create or replace the bucket identified by
    /// `(agent_id, period.period_type, period.key)`.
    fn upsert(
        &self,
        input: UpsertAgentPerformance,
    ) -> impl Future<Output = CallscopeResult<AgentPerformance>> + Send;
    /// The most recent `limit` buckets for an agent, oldest first.
    fn list_for_agent(
        &self,
        agent_id: Uuid,
        period_type: PeriodType,
        limit: u64,
    ) -> impl Future<Output = CallscopeResult<Vec<AgentPerformance>>> + Send;
    fn list_all(
        &self,
        scope: TenantScope,
    ) -> impl Future<Output = CallscopeResult<Vec<AgentPerformance>>> + Send;
    /// Returns the number of deleted buckets.
    fn delete_all(&self, scope: TenantScope) -> impl Future<Output = CallscopeResult<u64>> + Send;
}
