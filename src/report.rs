use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::Assessment;

pub const LIKELY_ACTIVE: f64 = 0.7;
pub const LIKELY_CLOSED: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SurvivalBands {
    pub likely_active: usize,
    pub uncertain: usize,
    pub likely_closed: usize,
}

pub fn survival_bands(assessments: &[Assessment]) -> SurvivalBands {
    let mut bands = SurvivalBands::default();
    for assessment in assessments {
        let probability = assessment.survival.probability;
        if probability >= LIKELY_ACTIVE {
            bands.likely_active += 1;
        } else if probability < LIKELY_CLOSED {
            bands.likely_closed += 1;
        } else {
            bands.uncertain += 1;
        }
    }
    bands
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySummary {
    pub mean: f64,
    pub min: u8,
    pub max: u8,
}

pub fn summarize_quality(assessments: &[Assessment]) -> Option<QualitySummary> {
    let scores: Vec<u8> = assessments.iter().map(|a| a.quality.score).collect();
    let min = *scores.iter().min()?;
    let max = *scores.iter().max()?;
    let mean = scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64;
    Some(QualitySummary { mean, min, max })
}

/// Records ranked by how far the estimate sits from the reported headcount.
pub fn headcount_gaps(assessments: &[Assessment]) -> Vec<(&Assessment, f64)> {
    let mut gaps: Vec<(&Assessment, f64)> = assessments
        .iter()
        .filter_map(|a| {
            let reported = a.record.reported_employees?;
            Some((a, a.employees.point_estimate - reported))
        })
        .collect();
    gaps.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    gaps
}

pub fn closure_watchlist(assessments: &[Assessment]) -> Vec<&Assessment> {
    let mut ranked: Vec<&Assessment> = assessments
        .iter()
        .filter(|a| a.survival.probability < LIKELY_ACTIVE)
        .collect();
    ranked.sort_by(|a, b| a.survival.probability.total_cmp(&b.survival.probability));
    ranked
}

pub fn build_report(
    label: Option<&str>,
    as_of: NaiveDate,
    assessments: &[Assessment],
    skipped: usize,
    limit: usize,
) -> String {
    let mut output = String::new();
    let label = label.unwrap_or("all establishments");

    let _ = writeln!(output, "# Establishment Signal Report");
    let _ = writeln!(
        output,
        "Generated for {} as of {} ({} assessed, {} skipped)",
        label,
        as_of,
        assessments.len(),
        skipped
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Operational Status");

    if assessments.is_empty() {
        let _ = writeln!(output, "No establishments assessed.");
    } else {
        let bands = survival_bands(assessments);
        let _ = writeln!(output, "- Likely active: {}", bands.likely_active);
        let _ = writeln!(output, "- Uncertain: {}", bands.uncertain);
        let _ = writeln!(output, "- Likely closed: {}", bands.likely_closed);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Closure Watchlist");

    let watchlist = closure_watchlist(assessments);
    if watchlist.is_empty() {
        let _ = writeln!(output, "No establishments below the active threshold.");
    } else {
        for a in watchlist.iter().take(limit) {
            let risks = if a.survival.risk_factors.is_empty() {
                "no risk factors recorded".to_string()
            } else {
                a.survival.risk_factors.join("; ")
            };
            let _ = writeln!(
                output,
                "- {} ({}) active probability {:.2} [{}]: {}",
                a.record.name, a.record.id, a.survival.probability, a.survival.confidence, risks
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Headcount Gaps");

    let gaps = headcount_gaps(assessments);
    if gaps.is_empty() {
        let _ = writeln!(output, "No reported headcounts to compare against.");
    } else {
        for (a, gap) in gaps.iter().take(limit) {
            let _ = writeln!(
                output,
                "- {} ({}) estimated {:.1} [{:.1}, {:.1}] vs reported {:.0} ({:+.1}, {} confidence)",
                a.record.name,
                a.record.id,
                a.employees.point_estimate,
                a.employees.lower_bound,
                a.employees.upper_bound,
                a.record.reported_employees.unwrap_or_default(),
                gap,
                a.employees.confidence
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality");

    match summarize_quality(assessments) {
        Some(summary) => {
            let _ = writeln!(
                output,
                "Mean score {:.1} (min {}, max {})",
                summary.mean, summary.min, summary.max
            );
        }
        None => {
            let _ = writeln!(output, "No quality scores for this batch.");
        }
    }

    output
}
