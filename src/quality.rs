//! Composite 0-100 data-quality score.

use std::collections::BTreeSet;

use tracing::trace;

use crate::config::QualityWeights;
use crate::models::{
    ConfidenceLevel, EmployeeEstimate, EstablishmentRecord, QualityScore, SignalBundle,
    SignalSource, SurvivalEstimate,
};

pub fn confidence_points(level: ConfidenceLevel) -> f64 {
    match level {
        ConfidenceLevel::High => 100.0,
        ConfidenceLevel::Medium => 60.0,
        ConfidenceLevel::Low => 20.0,
    }
}

/// `100 * max(0, 1 - width / point)`, or 0 when the point is not positive.
pub fn interval_certainty(estimate: &EmployeeEstimate) -> f64 {
    if estimate.point_estimate <= 0.0 {
        return 0.0;
    }
    let relative_width = estimate.interval_width() / estimate.point_estimate;
    (100.0 * (1.0 - relative_width).max(0.0)).clamp(0.0, 100.0)
}

pub fn score(
    record: &EstablishmentRecord,
    employees: &EmployeeEstimate,
    survival: &SurvivalEstimate,
    signals: &SignalBundle,
    weights: &QualityWeights,
) -> QualityScore {
    let completeness =
        100.0 * signals.populated_fields() as f64 / SignalBundle::OBSERVATION_FIELDS as f64;

    let sources: BTreeSet<SignalSource> = employees
        .sources_used
        .iter()
        .chain(survival.sources_used.iter())
        .copied()
        .collect();
    let diversity = 100.0 * sources.len() as f64 / SignalSource::ALL.len() as f64;

    let estimate_confidence =
        (confidence_points(employees.confidence) + confidence_points(survival.confidence)) / 2.0;

    let interval_certainty = interval_certainty(employees);

    let weighted = completeness * weights.completeness
        + diversity * weights.diversity
        + estimate_confidence * weights.estimate_confidence
        + interval_certainty * weights.interval_certainty;
    let score = weighted.round().clamp(0.0, 100.0) as u8;

    trace!(
        record = %record.id,
        score,
        completeness,
        diversity,
        estimate_confidence,
        interval_certainty,
        "quality score"
    );

    QualityScore {
        score,
        completeness,
        diversity,
        estimate_confidence,
        interval_certainty,
    }
}
