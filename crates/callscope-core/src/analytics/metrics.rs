//! Per-field sums and counts for transcript metrics.

use serde::{Deserialize, Serialize};

/// The numeric inputs one transcript contributes. `None` means the
/// transcript did not report that field and must not move its
/// denominator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreSample {
    pub customer_service: Option<f64>,
    pub product_knowledge: Option<f64>,
    pub process_efficiency: Option<f64>,
    pub problem_solving: Option<f64>,
    pub overall_score: Option<f64>,
    pub call_duration: Option<f64>,
    pub talk_time: Option<f64>,
    pub wait_time: Option<f64>,
}

/// Running sum and count for a single field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct FieldTotal {
    pub sum: f64,
    pub count: u64,
}

impl FieldTotal {
    pub fn absorb(&mut self, value: Option<f64>) {
        if let Some(v) = value
            && v.is_finite()
        {
            self.sum += v;
            self.count += 1;
        }
    }

    pub fn merge(&mut self, other: &FieldTotal) {
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Accumulated totals for a set of transcripts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetricTotals {
    pub call_count: u64,
    pub customer_service: FieldTotal,
    pub product_knowledge: FieldTotal,
    pub process_efficiency: FieldTotal,
    pub problem_solving: FieldTotal,
    pub overall_score: FieldTotal,
    pub call_duration: FieldTotal,
    pub talk_time: FieldTotal,
    pub wait_time: FieldTotal,
}

impl MetricTotals {
    pub fn absorb(&mut self, sample: &ScoreSample) {
        self.call_count += 1;
        self.customer_service.absorb(sample.customer_service);
        self.product_knowledge.absorb(sample.product_knowledge);
        self.process_efficiency.absorb(sample.process_efficiency);
        self.problem_solving.absorb(sample.problem_solving);
        self.overall_score.absorb(sample.overall_score);
        self.call_duration.absorb(sample.call_duration);
        self.talk_time.absorb(sample.talk_time);
        self.wait_time.absorb(sample.wait_time);
    }

    pub fn merge(&mut self, other: &MetricTotals) {
        self.call_count += other.call_count;
        self.customer_service.merge(&other.customer_service);
        self.product_knowledge.merge(&other.product_knowledge);
        self.process_efficiency.merge(&other.process_efficiency);
        self.problem_solving.merge(&other.problem_solving);
        self.overall_score.merge(&other.overall_score);
        self.call_duration.merge(&other.call_duration);
        self.talk_time.merge(&other.talk_time);
        self.wait_time.merge(&other.wait_time);
    }

    pub fn averages(&self) -> MetricAverages {
        MetricAverages {
            scores: AverageScores {
                customer_service: self.customer_service.average(),
                product_knowledge: self.product_knowledge.average(),
                process_efficiency: self.process_efficiency.average(),
                problem_solving: self.problem_solving.average(),
                overall_score: self.overall_score.average(),
            },
            call_duration: self.call_duration.average(),
            talk_time: self.talk_time.average(),
            wait_time: self.wait_time.average(),
        }
    }
}

/// Aggregate a batch of samples.
pub fn compute_aggregate<'a>(samples: impl IntoIterator<Item = &'a ScoreSample>) -> MetricTotals {
    let mut totals = MetricTotals::default();
    for sample in samples {
        totals.absorb(sample);
    }
    totals
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AverageScores {
    pub customer_service: Option<f64>,
    pub product_knowledge: Option<f64>,
    pub process_efficiency: Option<f64>,
    pub problem_solving: Option<f64>,
    pub overall_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetricAverages {
    pub scores: AverageScores,
    pub call_duration: Option<f64>,
    pub talk_time: Option<f64>,
    pub wait_time: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fields_leave_denominator_alone() {
        let samples = [
            ScoreSample {
                customer_service: Some(9.0),
                overall_score: Some(8.5),
                ..Default::default()
            },
            ScoreSample {
                customer_service: None,
                overall_score: Some(7.0),
                ..Default::default()
            },
        ];
        let totals = compute_aggregate(&samples);

        assert_eq!(totals.call_count, 2);
        assert_eq!(totals.customer_service, FieldTotal { sum: 9.0, count: 1 });
        assert_eq!(totals.overall_score, FieldTotal { sum: 15.5, count: 2 });
        assert_eq!(totals.product_knowledge.count, 0);

        let averages = totals.averages();
        assert_eq!(averages.scores.customer_service, Some(9.0));
        assert_eq!(averages.scores.overall_score, Some(7.75));
        assert_eq!(averages.scores.product_knowledge, None);
    }

    #[test]
    fn merging_partial_totals_matches_one_pass() {
        let samples: Vec<ScoreSample> = (0..6)
            .map(|i| ScoreSample {
                problem_solving: Some(i as f64),
                wait_time: (i % 2 == 0).then_some(30.0 * i as f64),
                ..Default::default()
            })
            .collect();

        let whole = compute_aggregate(&samples);
        let mut merged = compute_aggregate(&samples[..2]);
        merged.merge(&compute_aggregate(&samples[2..]));

        assert_eq!(whole, merged);
    }

    #[test]
    fn averages_are_stable_when_derived_twice() {
        let totals = compute_aggregate(&[ScoreSample {
            talk_time: Some(120.0),
            ..Default::default()
        }]);
        assert_eq!(totals.averages(), totals.averages());
        assert_eq!(totals.talk_time.sum, 120.0);
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let mut total = FieldTotal::default();
        total.absorb(Some(f64::INFINITY));
        total.absorb(Some(4.0));
        assert_eq!(total, FieldTotal { sum: 4.0, count: 1 });
    }
}
