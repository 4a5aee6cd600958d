//! Integration tests for the performance service and metrics job using
//! in-memory SurrealDB.

use std::sync::Arc;

use callscope_analytics::job::MetricsJob;
use callscope_analytics::service::AnalyticsService;
use callscope_core::analytics::period::PeriodType;
use callscope_core::error::CallscopeError;
use callscope_core::models::agent::{Agent, CreateAgent};
use callscope_core::models::organization::{CreateOrganization, SubscriptionTier};
use callscope_core::models::transcript::{
    CallMetadata, CreateTranscript, Scorecard, Transcript, TranscriptAnalysis,
};
use callscope_core::policy::TenantScope;
use callscope_core::repository::{
    AgentPerformanceRepository, AgentRepository, OrganizationRepository, TranscriptRepository,
};
use callscope_db::repository::{
    SurrealAgentPerformanceRepository, SurrealAgentRepository, SurrealOrganizationRepository,
    SurrealTranscriptRepository,
};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Service = AnalyticsService<
    SurrealAgentRepository<Db>,
    SurrealTranscriptRepository<Db>,
    SurrealAgentPerformanceRepository<Db>,
>;

struct Fixture {
    db: Surreal<Db>,
    service: Arc<Service>,
    org_id: Uuid,
}

/// Spin up in-memory DB, run migrations and create one organization.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    callscope_db::run_migrations(&db).await.unwrap();

    let org = SurrealOrganizationRepository::new(db.clone())
        .create(CreateOrganization {
            name: "Acme".into(),
            code: "ACME".into(),
            subscription_tier: SubscriptionTier::Enterprise,
            features: None,
            is_master: false,
            metadata: None,
        })
        .await
        .unwrap();

    let service = AnalyticsService::new(
        SurrealAgentRepository::new(db.clone()),
        SurrealTranscriptRepository::new(db.clone()),
        SurrealAgentPerformanceRepository::new(db.clone()),
        FixedOffset::east_opt(0).unwrap(),
    );
    Fixture {
        db,
        service: Arc::new(service),
        org_id: org.id,
    }
}

impl Fixture {
    async fn agent(&self, name: &str) -> Agent {
        SurrealAgentRepository::new(self.db.clone())
            .create(CreateAgent {
                organization_id: self.org_id,
                name: name.into(),
                email: None,
                employee_id: None,
                team: Some("support".into()),
            })
            .await
            .unwrap()
    }

    async fn transcript(
        &self,
        agent_id: Option<Uuid>,
        card: Scorecard,
        strengths: &[&str],
        duration: Option<f64>,
        at: DateTime<Utc>,
    ) -> Transcript {
        SurrealTranscriptRepository::new(self.db.clone())
            .create(CreateTranscript {
                organization_id: self.org_id,
                agent_id,
                created_by: None,
                call_type_id: None,
                title: "Support call".into(),
                text: "Agent: hello".into(),
                analysis: Some(TranscriptAnalysis {
                    scorecard: card,
                    strengths: strengths.iter().map(|s| s.to_string()).collect(),
                    ..Default::default()
                }),
                metadata: Some(CallMetadata {
                    duration_secs: duration,
                    ..Default::default()
                }),
                created_at: Some(at),
            })
            .await
            .unwrap()
    }

    fn buckets(&self) -> SurrealAgentPerformanceRepository<Db> {
        SurrealAgentPerformanceRepository::new(self.db.clone())
    }
}

fn march(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

fn card(customer_service: Option<f64>, overall: Option<f64>) -> Scorecard {
    Scorecard {
        customer_service,
        overall_score: overall,
        ..Default::default()
    }
}

fn close(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() < 1e-9,
        (None, None) => true,
        _ => false,
    }
}

#[tokio::test]
async fn recompute_uses_independent_denominators() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;
    fx.transcript(
        Some(agent.id),
        card(Some(9.0), Some(8.5)),
        &["empathy"],
        Some(300.0),
        march(4),
    )
    .await;
    fx.transcript(
        Some(agent.id),
        card(None, Some(6.5)),
        &["empathy", "clarity"],
        None,
        march(5),
    )
    .await;
    // Unscored: ignored.
    fx.transcript(Some(agent.id), Scorecard::default(), &[], Some(900.0), march(6))
        .await;

    let metrics = fx
        .service
        .recompute_agent(
            TenantScope::Organization(fx.org_id),
            agent.id,
            march(1),
            march(31),
            false,
        )
        .await
        .unwrap();

    let current = metrics.current_period.unwrap();
    assert_eq!(current.call_count, 2);
    assert_eq!(current.average_scores.customer_service, Some(9.0));
    assert_eq!(current.average_scores.overall_score, Some(7.5));
    assert_eq!(current.average_scores.product_knowledge, None);
    assert_eq!(current.average_call_duration, Some(300.0));
    assert_eq!(current.top_strengths[0].name, "empathy");
    assert_eq!(current.top_strengths[0].count, 2);
    assert!(metrics.historical.is_empty());

    let stored = SurrealAgentRepository::new(fx.db.clone())
        .get_by_id(TenantScope::All, agent.id)
        .await
        .unwrap();
    assert_eq!(
        stored.performance_metrics.current_period.unwrap().call_count,
        2
    );
}

#[tokio::test]
async fn recompute_respects_tenant_scope() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;

    let err = fx
        .service
        .recompute_agent(
            TenantScope::Organization(Uuid::new_v4()),
            agent.id,
            march(1),
            march(31),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CallscopeError::NotFound { .. }));
}

#[tokio::test]
async fn record_transcript_fills_all_four_buckets() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;
    let t = fx
        .transcript(Some(agent.id), card(Some(8.0), None), &[], None, march(7))
        .await;

    assert!(fx.service.record_transcript(&t).await.unwrap());

    let buckets = fx.buckets();
    for (period_type, key) in [
        (PeriodType::Daily, "2024-03-07"),
        (PeriodType::Weekly, "2024-W10"),
        (PeriodType::Monthly, "2024-03"),
        (PeriodType::Quarterly, "2024-Q1"),
    ] {
        let bucket = buckets.get(agent.id, period_type, key).await.unwrap();
        let bucket = bucket.unwrap_or_else(|| panic!("missing {key}"));
        assert_eq!(bucket.totals.call_count, 1);
        assert_eq!(bucket.averages().scores.customer_service, Some(8.0));
    }
}

#[tokio::test]
async fn record_transcript_skips_unscored_and_unassigned() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;
    let unscored = fx
        .transcript(Some(agent.id), Scorecard::default(), &[], Some(60.0), march(7))
        .await;
    let unassigned = fx
        .transcript(None, card(Some(5.0), None), &[], None, march(7))
        .await;

    assert!(!fx.service.record_transcript(&unscored).await.unwrap());
    assert!(!fx.service.record_transcript(&unassigned).await.unwrap());
    assert!(
        fx.buckets()
            .list_all(TenantScope::All)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn rebuild_matches_full_recompute() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;
    let samples = [
        (card(Some(9.0), Some(8.5)), Some(240.0), 3),
        (card(None, Some(7.0)), Some(180.0), 10),
        (card(Some(6.0), None), None, 17),
        (card(Some(7.5), Some(9.0)), Some(420.0), 28),
    ];
    for (c, duration, day) in samples {
        fx.transcript(Some(agent.id), c, &[], duration, march(day))
            .await;
    }

    let report = fx.service.rebuild(TenantScope::All).await.unwrap();
    assert_eq!(report.buckets_deleted, 0);
    assert_eq!(report.transcripts_replayed, 4);

    let month_start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let month_end = Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap();
    let metrics = fx
        .service
        .recompute_agent(TenantScope::All, agent.id, month_start, month_end, false)
        .await
        .unwrap();
    let recomputed = metrics.current_period.unwrap();

    let bucket = fx
        .buckets()
        .get(agent.id, PeriodType::Monthly, "2024-03")
        .await
        .unwrap()
        .unwrap();
    let rolled = bucket.averages();

    assert_eq!(bucket.totals.call_count, recomputed.call_count);
    assert!(close(
        rolled.scores.customer_service,
        recomputed.average_scores.customer_service
    ));
    assert!(close(
        rolled.scores.overall_score,
        recomputed.average_scores.overall_score
    ));
    assert!(close(rolled.call_duration, recomputed.average_call_duration));
    assert!(close(rolled.talk_time, recomputed.average_talk_time));
}

#[tokio::test]
async fn rebuild_replaces_existing_buckets() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;
    let t = fx
        .transcript(Some(agent.id), card(Some(8.0), None), &[], None, march(7))
        .await;

    // Feed the same transcript twice to simulate drift.
    fx.service.record_transcript(&t).await.unwrap();
    fx.service.record_transcript(&t).await.unwrap();
    let drifted = fx
        .buckets()
        .get(agent.id, PeriodType::Daily, "2024-03-07")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(drifted.totals.call_count, 2);

    let report = fx.service.rebuild(TenantScope::All).await.unwrap();
    assert_eq!(report.buckets_deleted, 4);
    assert_eq!(report.buckets_normalized, 4);

    let fixed = fx
        .buckets()
        .get(agent.id, PeriodType::Daily, "2024-03-07")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fixed.totals.call_count, 1);
}

#[tokio::test]
async fn normalization_is_idempotent() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;
    for (day, score) in [(4, 9.0), (5, 6.0), (12, 7.5)] {
        let t = fx
            .transcript(Some(agent.id), card(Some(score), Some(score)), &[], Some(100.0), march(day))
            .await;
        fx.service.record_transcript(&t).await.unwrap();
    }

    let snapshot = |buckets: Vec<callscope_core::models::performance::AgentPerformance>| {
        let mut rows: Vec<_> = buckets
            .into_iter()
            .map(|b| (b.id.clone(), b.totals, b.averages()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    };

    let before = snapshot(fx.buckets().list_all(TenantScope::All).await.unwrap());
    fx.service.normalize_all(TenantScope::All).await.unwrap();
    let once = snapshot(fx.buckets().list_all(TenantScope::All).await.unwrap());
    fx.service.normalize_all(TenantScope::All).await.unwrap();
    let twice = snapshot(fx.buckets().list_all(TenantScope::All).await.unwrap());

    assert_eq!(before, once);
    assert_eq!(once, twice);

    let monthly = fx
        .buckets()
        .get(agent.id, PeriodType::Monthly, "2024-03")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(monthly.averages().scores.customer_service, Some(7.5));
}

#[tokio::test]
async fn trends_are_oldest_first_and_scoped() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;
    for day in [4, 5, 6] {
        let t = fx
            .transcript(Some(agent.id), card(Some(day as f64), None), &[], None, march(day))
            .await;
        fx.service.record_transcript(&t).await.unwrap();
    }

    let points = fx
        .service
        .trends(
            TenantScope::Organization(fx.org_id),
            agent.id,
            PeriodType::Daily,
            2,
        )
        .await
        .unwrap();
    let keys: Vec<_> = points.iter().map(|p| p.period_key.as_str()).collect();
    assert_eq!(keys, vec!["2024-03-05", "2024-03-06"]);
    assert_eq!(points[1].averages.scores.customer_service, Some(6.0));

    let err = fx
        .service
        .trends(
            TenantScope::Organization(Uuid::new_v4()),
            agent.id,
            PeriodType::Daily,
            2,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CallscopeError::NotFound { .. }));
}

#[tokio::test]
async fn update_all_covers_active_agents_and_summary() {
    let fx = setup().await;
    let ada = fx.agent("Ada").await;
    let bob = fx.agent("Bob").await;
    let gone = fx.agent("Gone").await;
    SurrealAgentRepository::new(fx.db.clone())
        .delete(TenantScope::All, gone.id)
        .await
        .unwrap();

    let now = march(20);
    fx.transcript(Some(ada.id), card(Some(9.0), None), &[], None, march(18))
        .await;
    fx.transcript(Some(bob.id), card(Some(5.0), None), &[], None, march(19))
        .await;
    fx.transcript(Some(bob.id), card(Some(7.0), None), &[], None, march(19))
        .await;
    // Outside the 7-day window.
    fx.transcript(Some(bob.id), card(Some(1.0), None), &[], None, march(2))
        .await;

    let report = fx.service.update_all(fx.org_id, 7, true, now).await.unwrap();
    assert_eq!(report.agents_updated, 2);
    assert_eq!(report.failures, 0);

    let summary = fx.service.organization_summary(fx.org_id).await.unwrap();
    assert_eq!(summary.agent_count, 2);
    assert_eq!(summary.total_calls, 3);

    let bob_summary = summary
        .agents
        .iter()
        .find(|a| a.agent_id == bob.id)
        .unwrap();
    let current = bob_summary.current_period.as_ref().unwrap();
    assert_eq!(current.call_count, 2);
    assert_eq!(current.average_scores.customer_service, Some(6.0));

    let stored = SurrealAgentRepository::new(fx.db.clone())
        .get_by_id(TenantScope::All, bob.id)
        .await
        .unwrap();
    assert_eq!(stored.performance_metrics.historical.len(), 1);
}

#[tokio::test]
async fn metrics_job_snapshots_only_on_first_of_month() {
    let fx = setup().await;
    let agent = fx.agent("Ada").await;
    fx.transcript(Some(agent.id), card(Some(8.0), None), &[], None, march(20))
        .await;

    let job = MetricsJob::new(
        SurrealOrganizationRepository::new(fx.db.clone()),
        fx.service.clone(),
        30,
    );

    let mid_month = Utc.with_ymd_and_hms(2024, 3, 25, 0, 0, 0).unwrap();
    let report = job.run_once(mid_month).await.unwrap();
    assert_eq!(report.organizations, 1);
    assert_eq!(report.agents_updated, 1);
    assert_eq!(report.failures, 0);

    let agents = SurrealAgentRepository::new(fx.db.clone());
    let stored = agents.get_by_id(TenantScope::All, agent.id).await.unwrap();
    assert_eq!(
        stored.performance_metrics.current_period.unwrap().call_count,
        1
    );
    assert!(stored.performance_metrics.historical.is_empty());

    let first = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
    job.run_once(first).await.unwrap();
    let stored = agents.get_by_id(TenantScope::All, agent.id).await.unwrap();
    assert_eq!(stored.performance_metrics.historical.len(), 1);
}

#[tokio::test]
async fn metrics_job_skips_inactive_organizations() {
    let fx = setup().await;
    fx.agent("Ada").await;
    let orgs = SurrealOrganizationRepository::new(fx.db.clone());
    orgs.update(
        fx.org_id,
        callscope_core::models::organization::UpdateOrganization {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let job = MetricsJob::new(orgs, fx.service.clone(), 30);
    let report = job.run_once(march(10)).await.unwrap();
    assert_eq!(report.organizations, 0);
    assert_eq!(report.agents_updated, 0);
}
