//! Pure agent-performance aggregation.
//!
//! Both the on-demand recompute and the incremental period rollup are
//! built from [`metrics::MetricTotals`], which stores per-field sums and
//! per-field counts. Averages are always derived from those, never
//! written back over them, so re-deriving is idempotent.

pub mod metrics;
pub mod period;
pub mod tally;

use chrono::{DateTime, Utc};

use crate::models::performance::PeriodSummary;
use crate::models::transcript::Transcript;

use self::metrics::MetricTotals;
use self::tally::{TOP_TERMS, TermTally};

/// Summarize a window of transcripts into a [`PeriodSummary`].
///
/// Every transcript passed in is counted in `call_count` and feeds
/// whichever fields it carries. Callers choose the population: the
/// agent recompute passes scored transcripts only.
pub fn summarize(
    transcripts: &[Transcript],
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> PeriodSummary {
    let mut totals = MetricTotals::default();
    let mut strengths = TermTally::default();
    let mut improvements = TermTally::default();

    for transcript in transcripts {
        totals.absorb(&transcript.score_sample());
        strengths.extend(transcript.analysis.strengths.iter());
        improvements.extend(transcript.analysis.areas_for_improvement.iter());
    }

    let averages = totals.averages();
    PeriodSummary {
        start_date,
        end_date,
        call_count: totals.call_count,
        average_scores: averages.scores,
        average_call_duration: averages.call_duration,
        average_talk_time: averages.talk_time,
        average_wait_time: averages.wait_time,
        top_strengths: strengths.top(TOP_TERMS),
        top_areas_for_improvement: improvements.top(TOP_TERMS),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::transcript::{CallMetadata, Scorecard, TranscriptAnalysis};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn transcript(card: Scorecard, strengths: &[&str], duration: Option<f64>) -> Transcript {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        Transcript {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            agent_id: Some(Uuid::nil()),
            created_by: None,
            call_type_id: None,
            title: "call".into(),
            text: "hello".into(),
            analysis: TranscriptAnalysis {
                scorecard: card,
                strengths: strengths.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            metadata: CallMetadata {
                duration_secs: duration,
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn per_field_denominators_are_independent() {
        let first = transcript(
            Scorecard {
                customer_service: Some(9.0),
                overall_score: Some(8.5),
                ..Default::default()
            },
            &[],
            Some(300.0),
        );
        let second = transcript(
            Scorecard {
                customer_service: None,
                overall_score: Some(6.5),
                product_knowledge: Some(4.0),
                ..Default::default()
            },
            &[],
            None,
        );

        let now = Utc::now();
        let summary = summarize(&[first, second], now, now, now);

        assert_eq!(summary.call_count, 2);
        assert_eq!(summary.average_scores.customer_service, Some(9.0));
        assert_eq!(summary.average_scores.overall_score, Some(7.5));
        assert_eq!(summary.average_scores.product_knowledge, Some(4.0));
        assert_eq!(summary.average_scores.problem_solving, None);
        assert_eq!(summary.average_call_duration, Some(300.0));
    }

    #[test]
    fn strengths_are_tallied_across_transcripts() {
        let a = transcript(Scorecard::default(), &["empathy", "clarity"], None);
        let b = transcript(Scorecard::default(), &["clarity"], None);
        let now = Utc::now();
        let summary = summarize(&[a, b], now, now, now);

        assert_eq!(summary.top_strengths[0].name, "clarity");
        assert_eq!(summary.top_strengths[0].count, 2);
        assert_eq!(summary.top_strengths[1].name, "empathy");
        assert!(summary.top_areas_for_improvement.is_empty());
    }

    #[test]
    fn every_transcript_passed_in_is_counted() {
        let scored = transcript(
            Scorecard {
                overall_score: Some(8.0),
                ..Default::default()
            },
            &[],
            Some(100.0),
        );
        let unscored = transcript(Scorecard::default(), &[], Some(500.0));
        let now = Utc::now();

        let all = summarize(&[scored.clone(), unscored.clone()], now, now, now);
        assert_eq!(all.call_count, 2);
        assert_eq!(all.average_call_duration, Some(300.0));

        let only_scored: Vec<Transcript> = [scored, unscored]
            .into_iter()
            .filter(Transcript::is_scored)
            .collect();
        let filtered = summarize(&only_scored, now, now, now);
        assert_eq!(filtered.call_count, 1);
        assert_eq!(filtered.average_call_duration, Some(100.0));
    }

    #[test]
    fn empty_window_has_no_averages() {
        let now = Utc::now();
        let summary = summarize(&[], now, now, now);
        assert_eq!(summary.call_count, 0);
        assert_eq!(summary.average_scores.overall_score, None);
        assert_eq!(summary.average_wait_time, None);
    }
}
