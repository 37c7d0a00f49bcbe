use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One business location from the primary administrative record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstablishmentRecord {
    pub id: String,
    pub name: String,
    pub industry_code: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Headcount as reported by the primary record. Often stale.
    pub reported_employees: Option<f64>,
}

/// Optional external observations for one record at estimation time.
///
/// Every field is independently nullable. Raw values are kept as signed
/// numbers so that degenerate inputs (negative counts, zero areas) reach
/// the normalizer and are marked inapplicable there instead of failing
/// at the parsing layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalBundle {
    pub linkedin_headcount: Option<i64>,
    pub review_count_recent: Option<i64>,
    pub review_count_prior: Option<i64>,
    pub review_recent_window_months: Option<f64>,
    pub review_prior_window_months: Option<f64>,
    pub last_review_date: Option<NaiveDate>,
    pub job_postings_recent: Option<i64>,
    pub job_postings_peak: Option<i64>,
    pub floor_area_sqm: Option<f64>,
    pub facade_visible: Option<bool>,
    pub signage_visible: Option<bool>,
    pub lighting_visible: Option<bool>,
}

impl SignalBundle {
    /// Observation fields counted for completeness. Window lengths are
    /// parameters of the review counts, not observations of their own.
    pub const OBSERVATION_FIELDS: usize = 10;

    pub fn populated_fields(&self) -> usize {
        [
            self.linkedin_headcount.is_some(),
            self.review_count_recent.is_some(),
            self.review_count_prior.is_some(),
            self.last_review_date.is_some(),
            self.job_postings_recent.is_some(),
            self.job_postings_peak.is_some(),
            self.floor_area_sqm.is_some(),
            self.facade_visible.is_some(),
            self.signage_visible.is_some(),
            self.lighting_visible.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// Static per-industry configuration used as fallback and clamp range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryBaseline {
    pub avg_employees: f64,
    pub employees_per_sqm: f64,
    pub min_employees: f64,
    pub max_employees: f64,
    #[serde(default)]
    pub typical_floor_area_sqm: Option<f64>,
}

impl IndustryBaseline {
    pub fn clamp(&self, employees: f64) -> f64 {
        employees.clamp(self.min_employees, self.max_employees)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an observation came from. Used to measure signal diversity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    ProfessionalNetwork,
    Reviews,
    BuildingFootprint,
    JobPostings,
    Imagery,
}

impl SignalSource {
    pub const ALL: [SignalSource; 5] = [
        SignalSource::ProfessionalNetwork,
        SignalSource::Reviews,
        SignalSource::BuildingFootprint,
        SignalSource::JobPostings,
        SignalSource::Imagery,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    Direct,
    Ensemble,
    SingleSignal,
    Baseline,
}

impl EstimationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimationMethod::Direct => "direct",
            EstimationMethod::Ensemble => "ensemble",
            EstimationMethod::SingleSignal => "single_signal",
            EstimationMethod::Baseline => "baseline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeEstimate {
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence: ConfidenceLevel,
    pub method: EstimationMethod,
    /// Name of the signal carrying the largest renormalized weight, or
    /// `"baseline"` when no signal applied.
    pub dominant_signal: String,
    pub signals_used: Vec<String>,
    pub sources_used: Vec<SignalSource>,
}

impl EmployeeEstimate {
    pub fn interval_width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurvivalEstimate {
    /// Probability of being active, in [0, 1].
    pub probability: f64,
    pub confidence: ConfidenceLevel,
    pub risk_factors: Vec<String>,
    pub protective_factors: Vec<String>,
    /// Applicable signal that moved the probability furthest from neutral,
    /// or `"none"`.
    pub primary_indicator: String,
    pub signals_used: Vec<String>,
    pub sources_used: Vec<SignalSource>,
    pub days_since_last_review: Option<i64>,
    pub review_decay_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityScore {
    pub score: u8,
    pub completeness: f64,
    pub diversity: f64,
    pub estimate_confidence: f64,
    pub interval_certainty: f64,
}

/// Everything computed for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub record: EstablishmentRecord,
    pub employees: EmployeeEstimate,
    pub survival: SurvivalEstimate,
    pub quality: QualityScore,
}
