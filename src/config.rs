use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EstimateError, Result};
use crate::models::IndustryBaseline;

/// Industry baselines keyed by classification code. Loaded once, read-only
/// afterwards, and shared by every worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaselineTable {
    entries: BTreeMap<String, IndustryBaseline>,
}

impl BaselineTable {
    pub fn new(entries: BTreeMap<String, IndustryBaseline>) -> Result<Self> {
        for (code, baseline) in &entries {
            validate_baseline(code, baseline)?;
        }
        Ok(Self { entries })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, IndustryBaseline> = serde_json::from_str(json)?;
        Self::new(entries)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn get(&self, industry_code: &str) -> Result<&IndustryBaseline> {
        self.entries
            .get(industry_code)
            .ok_or_else(|| EstimateError::UnknownIndustry(industry_code.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for BaselineTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        // Limited-service restaurants
        entries.insert(
            "722513".to_string(),
            IndustryBaseline {
                avg_employees: 12.0,
                employees_per_sqm: 0.025,
                min_employees: 4.0,
                max_employees: 50.0,
                typical_floor_area_sqm: Some(250.0),
            },
        );
        // Pharmacies
        entries.insert(
            "446110".to_string(),
            IndustryBaseline {
                avg_employees: 8.0,
                employees_per_sqm: 0.015,
                min_employees: 2.0,
                max_employees: 35.0,
                typical_floor_area_sqm: Some(900.0),
            },
        );
        Self { entries }
    }
}

fn validate_baseline(code: &str, baseline: &IndustryBaseline) -> Result<()> {
    let invalid = |reason: &str| EstimateError::InvalidBaseline {
        code: code.to_string(),
        reason: reason.to_string(),
    };

    let values = [
        baseline.avg_employees,
        baseline.employees_per_sqm,
        baseline.min_employees,
        baseline.max_employees,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(invalid("values must be finite"));
    }
    if baseline.min_employees <= 0.0 {
        return Err(invalid("min_employees must be positive"));
    }
    if baseline.min_employees > baseline.avg_employees
        || baseline.avg_employees > baseline.max_employees
    {
        return Err(invalid("expected min_employees <= avg_employees <= max_employees"));
    }
    if baseline.employees_per_sqm <= 0.0 {
        return Err(invalid("employees_per_sqm must be positive"));
    }
    if matches!(baseline.typical_floor_area_sqm, Some(area) if !(area.is_finite() && area > 0.0)) {
        return Err(invalid("typical_floor_area_sqm must be positive"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleWeights {
    pub professional_network: f64,
    pub review_velocity: f64,
    pub building_area: f64,
    pub job_postings: f64,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self {
            professional_network: 0.50,
            review_velocity: 0.30,
            building_area: 0.15,
            job_postings: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurvivalWeights {
    pub review_recency: f64,
    pub review_decay: f64,
    pub job_activity: f64,
    pub imagery: f64,
}

impl Default for SurvivalWeights {
    fn default() -> Self {
        Self {
            review_recency: 0.35,
            review_decay: 0.30,
            job_activity: 0.20,
            imagery: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub iterations: usize,
    pub seed: u64,
    /// Below this many applicable signals the interval comes from
    /// perturbing each signal by its noise model instead of resampling.
    pub min_signals_for_resampling: usize,
    /// Half-width, as a fraction of the point, used when a single signal
    /// is all there is.
    pub single_signal_margin: f64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            iterations: 1000,
            seed: 0x5EED_F00D,
            min_signals_for_resampling: 3,
            single_signal_margin: 0.30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewWindows {
    pub recent_months: f64,
    pub prior_months: f64,
}

impl Default for ReviewWindows {
    fn default() -> Self {
        Self {
            recent_months: 3.0,
            prior_months: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub completeness: f64,
    pub diversity: f64,
    pub estimate_confidence: f64,
    pub interval_certainty: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            completeness: 0.20,
            diversity: 0.20,
            estimate_confidence: 0.30,
            interval_certainty: 0.30,
        }
    }
}

/// Tunable weights and settings, passed explicitly to every component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub ensemble: EnsembleWeights,
    pub survival: SurvivalWeights,
    pub bootstrap: BootstrapConfig,
    pub review_windows: ReviewWindows,
    pub quality: QualityWeights,
}

impl EstimatorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
