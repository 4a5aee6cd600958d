//! Integration tests for transcripts and agent performance buckets using
//! in-memory SurrealDB.

use callscope_core::analytics::metrics::{MetricTotals, ScoreSample};
use callscope_core::analytics::period::{PeriodType, periods_for};
use callscope_core::models::organization::{CreateOrganization, SubscriptionTier};
use callscope_core::models::performance::{AgentPerformance, UpsertAgentPerformance};
use callscope_core::models::transcript::{
    CallMetadata, CreateTranscript, Scorecard, TranscriptAnalysis, UpdateTranscript,
};
use callscope_core::policy::TenantScope;
use callscope_core::repository::{
    AgentPerformanceRepository, OrganizationRepository, Pagination, TranscriptFilter,
    TranscriptRepository,
};
use callscope_db::repository::{
    SurrealAgentPerformanceRepository, SurrealOrganizationRepository, SurrealTranscriptRepository,
};
use chrono::{NaiveDate, TimeZone, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    callscope_db::run_migrations(&db).await.unwrap();
    db
}

async fn create_org(db: &Surreal<Db>, code: &str) -> Uuid {
    SurrealOrganizationRepository::new(db.clone())
        .create(CreateOrganization {
            name: code.into(),
            code: code.into(),
            subscription_tier: SubscriptionTier::Enterprise,
            features: None,
            is_master: false,
            metadata: None,
        })
        .await
        .unwrap()
        .id
}

fn scored(overall: f64) -> TranscriptAnalysis {
    TranscriptAnalysis {
        summary: Some("Customer asked about a refund".into()),
        scorecard: Scorecard {
            overall_score: Some(overall),
            customer_service: Some(8.0),
            ..Default::default()
        },
        strengths: vec!["Empathy".into()],
        areas_for_improvement: vec!["Hold time".into()],
        extra: Default::default(),
    }
}

fn transcript(org: Uuid, agent: Uuid, day: u32, analysis: Option<TranscriptAnalysis>) -> CreateTranscript {
    CreateTranscript {
        organization_id: org,
        agent_id: Some(agent),
        created_by: None,
        call_type_id: None,
        title: format!("Call on day {day}"),
        text: "Agent: Hello".into(),
        analysis,
        metadata: Some(CallMetadata {
            duration_secs: Some(300.0),
            ..Default::default()
        }),
        created_at: Some(Utc.with_ymd_and_hms(2024, 7, day, 12, 0, 0).unwrap()),
    }
}

#[tokio::test]
async fn transcript_round_trips_typed_analysis() {
    let db = setup().await;
    let org = create_org(&db, "ACME").await;
    let repo = SurrealTranscriptRepository::new(db);

    let mut analysis = scored(7.5);
    analysis
        .extra
        .insert("sentiment".into(), serde_json::json!("positive"));

    let created = repo
        .create(transcript(org, Uuid::new_v4(), 3, Some(analysis.clone())))
        .await
        .unwrap();
    assert!(created.is_scored());

    let fetched = repo
        .get_by_id(TenantScope::Organization(org), created.id)
        .await
        .unwrap();
    assert_eq!(fetched.analysis, analysis);
    assert_eq!(fetched.metadata.duration_secs, Some(300.0));
    assert_eq!(
        fetched.created_at,
        Utc.with_ymd_and_hms(2024, 7, 3, 12, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn transcript_filters_and_ordering() {
    let db = setup().await;
    let org = create_org(&db, "ACME").await;
    let other = create_org(&db, "OTHER").await;
    let repo = SurrealTranscriptRepository::new(db);
    let agent = Uuid::new_v4();

    for day in [1, 5, 10] {
        repo.create(transcript(org, agent, day, None)).await.unwrap();
    }
    repo.create(transcript(org, Uuid::new_v4(), 6, None))
        .await
        .unwrap();
    repo.create(transcript(other, agent, 7, None)).await.unwrap();

    let scope = TenantScope::Organization(org);
    let page = repo
        .list(scope, TranscriptFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 4);
    // Newest first.
    assert_eq!(page.items[0].title, "Call on day 10");

    let window = TranscriptFilter {
        agent_id: Some(agent),
        from: Some(Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap()),
        to: Some(Utc.with_ymd_and_hms(2024, 7, 31, 0, 0, 0).unwrap()),
        ..Default::default()
    };
    let all = repo.list_all(scope, window).await.unwrap();
    let titles: Vec<_> = all.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, ["Call on day 5", "Call on day 10"]);
}

#[tokio::test]
async fn transcript_update_and_delete_are_scoped() {
    let db = setup().await;
    let org = create_org(&db, "ACME").await;
    let other = create_org(&db, "OTHER").await;
    let repo = SurrealTranscriptRepository::new(db);

    let t = repo
        .create(transcript(org, Uuid::new_v4(), 2, None))
        .await
        .unwrap();
    assert!(!t.is_scored());

    let updated = repo
        .update(
            TenantScope::Organization(org),
            t.id,
            UpdateTranscript {
                analysis: Some(scored(9.0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.is_scored());

    assert!(
        repo.delete(TenantScope::Organization(other), t.id)
            .await
            .is_err()
    );
    repo.delete(TenantScope::Organization(org), t.id)
        .await
        .unwrap();
    assert!(repo.get_by_id(TenantScope::All, t.id).await.is_err());
}

fn totals(values: &[f64]) -> MetricTotals {
    let mut totals = MetricTotals::default();
    for v in values {
        totals.absorb(&ScoreSample {
            overall_score: Some(*v),
            ..Default::default()
        });
    }
    totals
}

#[tokio::test]
async fn bucket_upsert_keeps_one_row_per_period() {
    let db = setup().await;
    let org = create_org(&db, "ACME").await;
    let repo = SurrealAgentPerformanceRepository::new(db);
    let agent = Uuid::new_v4();
    let date = NaiveDate::from_ymd_opt(2024, 7, 19).unwrap();
    let period = periods_for(date).remove(0);
    assert_eq!(period.period_type, PeriodType::Daily);

    repo.upsert(UpsertAgentPerformance {
        agent_id: agent,
        organization_id: org,
        period: period.clone(),
        totals: totals(&[6.0]),
    })
    .await
    .unwrap();
    let second = repo
        .upsert(UpsertAgentPerformance {
            agent_id: agent,
            organization_id: org,
            period: period.clone(),
            totals: totals(&[6.0, 8.0]),
        })
        .await
        .unwrap();

    assert_eq!(
        second.id,
        AgentPerformance::bucket_id(agent, PeriodType::Daily, "2024-07-19")
    );
    assert_eq!(second.totals.call_count, 2);
    assert_eq!(second.averages().scores.overall_score, Some(7.0));
    assert_eq!(second.period_start, date);

    let all = repo.list_all(TenantScope::Organization(org)).await.unwrap();
    assert_eq!(all.len(), 1);

    let fetched = repo
        .get(agent, PeriodType::Daily, "2024-07-19")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.totals, second.totals);
    assert!(
        repo.get(agent, PeriodType::Daily, "2024-07-20")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn list_for_agent_returns_most_recent_oldest_first() {
    let db = setup().await;
    let org = create_org(&db, "ACME").await;
    let repo = SurrealAgentPerformanceRepository::new(db);
    let agent = Uuid::new_v4();

    for day in 1..=5 {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        repo.upsert(UpsertAgentPerformance {
            agent_id: agent,
            organization_id: org,
            period: periods_for(date).remove(0),
            totals: totals(&[f64::from(day)]),
        })
        .await
        .unwrap();
    }

    let series = repo
        .list_for_agent(agent, PeriodType::Daily, 3)
        .await
        .unwrap();
    let keys: Vec<_> = series.iter().map(|b| b.period_key.as_str()).collect();
    assert_eq!(keys, ["2024-03-03", "2024-03-04", "2024-03-05"]);
}

#[tokio::test]
async fn delete_all_is_scoped() {
    let db = setup().await;
    let org_a = create_org(&db, "A").await;
    let org_b = create_org(&db, "B").await;
    let repo = SurrealAgentPerformanceRepository::new(db);
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

    for (org, agent) in [(org_a, Uuid::new_v4()), (org_b, Uuid::new_v4())] {
        for period in periods_for(date) {
            repo.upsert(UpsertAgentPerformance {
                agent_id: agent,
                organization_id: org,
                period,
                totals: totals(&[5.0]),
            })
            .await
            .unwrap();
        }
    }

    let deleted = repo
        .delete_all(TenantScope::Organization(org_a))
        .await
        .unwrap();
    assert_eq!(deleted, 4);
    assert!(
        repo.list_all(TenantScope::Organization(org_a))
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(repo.list_all(TenantScope::All).await.unwrap().len(), 4);
}
