use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Assessment, EstablishmentRecord, SignalBundle};

/// One flat input row: record columns followed by every signal column.
/// Empty cells are absent signals.
#[derive(Debug, Deserialize)]
struct InputRow {
    id: String,
    name: String,
    industry_code: String,
    latitude: f64,
    longitude: f64,
    reported_employees: Option<f64>,
    linkedin_headcount: Option<i64>,
    review_count_recent: Option<i64>,
    review_count_prior: Option<i64>,
    review_recent_window_months: Option<f64>,
    review_prior_window_months: Option<f64>,
    last_review_date: Option<NaiveDate>,
    job_postings_recent: Option<i64>,
    job_postings_peak: Option<i64>,
    floor_area_sqm: Option<f64>,
    facade_visible: Option<bool>,
    signage_visible: Option<bool>,
    lighting_visible: Option<bool>,
}

impl From<InputRow> for (EstablishmentRecord, SignalBundle) {
    fn from(row: InputRow) -> Self {
        let record = EstablishmentRecord {
            id: row.id,
            name: row.name,
            industry_code: row.industry_code,
            latitude: row.latitude,
            longitude: row.longitude,
            reported_employees: row.reported_employees,
        };
        let signals = SignalBundle {
            linkedin_headcount: row.linkedin_headcount,
            review_count_recent: row.review_count_recent,
            review_count_prior: row.review_count_prior,
            review_recent_window_months: row.review_recent_window_months,
            review_prior_window_months: row.review_prior_window_months,
            last_review_date: row.last_review_date,
            job_postings_recent: row.job_postings_recent,
            job_postings_peak: row.job_postings_peak,
            floor_area_sqm: row.floor_area_sqm,
            facade_visible: row.facade_visible,
            signage_visible: row.signage_visible,
            lighting_visible: row.lighting_visible,
        };
        (record, signals)
    }
}

pub fn read_establishments(
    csv_path: &Path,
) -> anyhow::Result<Vec<(EstablishmentRecord, SignalBundle)>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut items = Vec::new();

    for (index, result) in reader.deserialize::<InputRow>().enumerate() {
        // header is line 1
        let row = result.with_context(|| format!("malformed row at line {}", index + 2))?;
        items.push(row.into());
    }

    Ok(items)
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    id: &'a str,
    name: &'a str,
    industry_code: &'a str,
    latitude: f64,
    longitude: f64,
    reported_employees: Option<f64>,
    employees_estimate: f64,
    employees_ci_lower: f64,
    employees_ci_upper: f64,
    employees_confidence: &'static str,
    employees_method: &'static str,
    employees_primary_signal: &'a str,
    employees_signals_count: usize,
    is_active_prob: f64,
    is_active_confidence: &'static str,
    survival_primary_indicator: &'a str,
    survival_signals_count: usize,
    days_since_last_review: Option<i64>,
    review_decay_rate: Option<f64>,
    survival_risk_factors: String,
    survival_protective_factors: String,
    data_quality_score: u8,
    quality_completeness: f64,
    quality_diversity: f64,
    quality_estimate_confidence: f64,
    quality_interval_certainty: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl<'a> From<&'a Assessment> for OutputRow<'a> {
    fn from(a: &'a Assessment) -> Self {
        OutputRow {
            id: &a.record.id,
            name: &a.record.name,
            industry_code: &a.record.industry_code,
            latitude: a.record.latitude,
            longitude: a.record.longitude,
            reported_employees: a.record.reported_employees,
            employees_estimate: round_to(a.employees.point_estimate, 1),
            employees_ci_lower: round_to(a.employees.lower_bound, 1),
            employees_ci_upper: round_to(a.employees.upper_bound, 1),
            employees_confidence: a.employees.confidence.as_str(),
            employees_method: a.employees.method.as_str(),
            employees_primary_signal: &a.employees.dominant_signal,
            employees_signals_count: a.employees.signals_used.len(),
            is_active_prob: round_to(a.survival.probability, 3),
            is_active_confidence: a.survival.confidence.as_str(),
            survival_primary_indicator: &a.survival.primary_indicator,
            survival_signals_count: a.survival.signals_used.len(),
            days_since_last_review: a.survival.days_since_last_review,
            review_decay_rate: a.survival.review_decay_rate.map(|rate| round_to(rate, 2)),
            survival_risk_factors: a.survival.risk_factors.join("; "),
            survival_protective_factors: a.survival.protective_factors.join("; "),
            data_quality_score: a.quality.score,
            quality_completeness: round_to(a.quality.completeness, 1),
            quality_diversity: round_to(a.quality.diversity, 1),
            quality_estimate_confidence: round_to(a.quality.estimate_confidence, 1),
            quality_interval_certainty: round_to(a.quality.interval_certainty, 1),
        }
    }
}

pub fn write_assessments(csv_path: &Path, assessments: &[Assessment]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(csv_path)
        .with_context(|| format!("failed to create {}", csv_path.display()))?;
    for assessment in assessments {
        writer.serialize(OutputRow::from(assessment))?;
    }
    writer.flush()?;
    Ok(())
}
