//! Shared application state.

use std::sync::Arc;

use callscope_analytics::{AnalyticsService, MetricsJob, MetricsJobConfig};
use callscope_auth::{AnyMailer, AuthConfig, AuthService};
use callscope_db::repository::{
    SurrealAgentPerformanceRepository, SurrealAgentRepository, SurrealApiKeyRepository,
    SurrealCallTypeRepository, SurrealOrganizationRepository, SurrealTranscriptRepository,
    SurrealUserRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

pub type Organizations = SurrealOrganizationRepository<Any>;
pub type Users = SurrealUserRepository<Any>;
pub type Agents = SurrealAgentRepository<Any>;
pub type Transcripts = SurrealTranscriptRepository<Any>;
pub type CallTypes = SurrealCallTypeRepository<Any>;
pub type ApiKeys = SurrealApiKeyRepository<Any>;
pub type Buckets = SurrealAgentPerformanceRepository<Any>;

pub type Auth = AuthService<Users, Organizations, ApiKeys, AnyMailer>;
pub type Analytics = AnalyticsService<Agents, Transcripts, Buckets>;
pub type Job = MetricsJob<Organizations, Agents, Transcripts, Buckets>;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Auth>,
    pub analytics: Arc<Analytics>,
    pub organizations: Organizations,
    pub users: Users,
    pub agents: Agents,
    pub transcripts: Transcripts,
    pub call_types: CallTypes,
    pub api_keys: ApiKeys,
    /// Trailing window used by the on-demand "update all" endpoint.
    pub window_days: u32,
}

impl AppState {
    pub fn new(
        db: Surreal<Any>,
        auth_config: AuthConfig,
        mailer: AnyMailer,
        metrics: &MetricsJobConfig,
    ) -> Result<Self, callscope_analytics::JobError> {
        let analytics = AnalyticsService::new(
            SurrealAgentRepository::new(db.clone()),
            SurrealTranscriptRepository::new(db.clone()),
            SurrealAgentPerformanceRepository::new(db.clone()),
            metrics.offset()?,
        );
        let auth = AuthService::new(
            SurrealUserRepository::new(db.clone()),
            SurrealOrganizationRepository::new(db.clone()),
            SurrealApiKeyRepository::new(db.clone()),
            mailer,
            auth_config,
        );

        Ok(Self {
            auth: Arc::new(auth),
            analytics: Arc::new(analytics),
            organizations: SurrealOrganizationRepository::new(db.clone()),
            users: SurrealUserRepository::new(db.clone()),
            agents: SurrealAgentRepository::new(db.clone()),
            transcripts: SurrealTranscriptRepository::new(db.clone()),
            call_types: SurrealCallTypeRepository::new(db.clone()),
            api_keys: SurrealApiKeyRepository::new(db),
            window_days: metrics.window_days,
        })
    }

    /// The scheduled job, sharing this state's analytics service.
    pub fn metrics_job(&self) -> Job {
        Job::new(
            self.organizations.clone(),
            self.analytics.clone(),
            self.window_days,
        )
    }
}
