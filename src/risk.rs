//! Closure-risk scoring.
//!
//! Four optional signals each map to a score in [0, 1] where 0.5 is
//! neutral. Scores above the midpoint become protective factors, scores
//! below it risk factors, and the probability of being active is the
//! weighted mean over the signals that applied.

use chrono::NaiveDate;
use tracing::debug;

use crate::config::{EstimatorConfig, SurvivalWeights};
use crate::models::{ConfidenceLevel, SignalBundle, SignalSource, SurvivalEstimate};
use crate::normalize;

pub const NEUTRAL_SCORE: f64 = 0.5;

/// Scores within this span of each other count as agreeing.
pub const AGREEMENT_SPREAD: f64 = 0.30;

pub const GROWTH_RATIO: f64 = 1.0;
pub const DECLINE_RATIO: f64 = 0.3;

pub const ACTIVE_HIRING_RATIO: f64 = 0.6;
/// Below this share of the peak, postings read as a hiring slowdown.
pub const REDUCED_HIRING_RATIO: f64 = 0.2;

struct SurvivalContext<'a> {
    signals: &'a SignalBundle,
    as_of: NaiveDate,
    recent_window_months: f64,
    prior_window_months: f64,
}

/// A reading of one signal: its score and how to describe it to a person.
struct Reading {
    score: f64,
    description: String,
}

struct SurvivalRule {
    name: &'static str,
    source: SignalSource,
    weight: fn(&SurvivalWeights) -> f64,
    evaluate: fn(&SurvivalContext) -> Option<Reading>,
}

static SURVIVAL_SIGNALS: [SurvivalRule; 4] = [
    SurvivalRule {
        name: "review_recency",
        source: SignalSource::Reviews,
        weight: |w| w.review_recency,
        evaluate: review_recency,
    },
    SurvivalRule {
        name: "review_decay",
        source: SignalSource::Reviews,
        weight: |w| w.review_decay,
        evaluate: review_decay,
    },
    SurvivalRule {
        name: "job_postings",
        source: SignalSource::JobPostings,
        weight: |w| w.job_activity,
        evaluate: job_activity,
    },
    SurvivalRule {
        name: "imagery",
        source: SignalSource::Imagery,
        weight: |w| w.imagery,
        evaluate: imagery,
    },
];

pub fn recency_score(days_since_review: i64) -> f64 {
    match days_since_review {
        i64::MIN..=30 => 1.0,
        31..=90 => 0.7,
        91..=180 => 0.4,
        _ => 0.1,
    }
}

pub fn decay_score(decay_rate: f64) -> f64 {
    if decay_rate > GROWTH_RATIO {
        0.85
    } else if decay_rate >= DECLINE_RATIO {
        NEUTRAL_SCORE
    } else {
        0.15
    }
}

fn review_recency(ctx: &SurvivalContext) -> Option<Reading> {
    let days = normalize::review_age_days(ctx.signals.last_review_date, ctx.as_of).get()? as i64;
    let score = recency_score(days);
    let description = match days {
        i64::MIN..=30 => format!("Recent review ({days} days ago)"),
        31..=90 => format!("Moderately recent review ({days} days ago)"),
        91..=180 => format!("Declining review activity ({days} days since last review)"),
        _ => format!("No recent reviews ({days} days since last review)"),
    };
    Some(Reading { score, description })
}

fn review_decay(ctx: &SurvivalContext) -> Option<Reading> {
    let rate = decay_rate(ctx)?;
    let score = decay_score(rate);
    let description = if rate > GROWTH_RATIO {
        format!("Growing review activity (decay rate {rate:.2})")
    } else if rate >= DECLINE_RATIO {
        format!("Stable review activity (decay rate {rate:.2})")
    } else {
        format!("Sharp review decline (decay rate {rate:.2})")
    };
    Some(Reading { score, description })
}

fn decay_rate(ctx: &SurvivalContext) -> Option<f64> {
    normalize::review_rate_ratio(
        ctx.signals.review_count_recent,
        ctx.signals.review_count_prior,
        ctx.recent_window_months,
        ctx.prior_window_months,
    )
    .get()
}

fn job_activity(ctx: &SurvivalContext) -> Option<Reading> {
    let recent = ctx.signals.job_postings_recent?;
    let peak = ctx.signals.job_postings_peak?;
    // postings with no recorded peak are current activity on their own
    let ratio = if peak == 0 && recent > 0 {
        1.0
    } else {
        normalize::posting_ratio(Some(recent), Some(peak)).get()?
    };

    let reading = if ratio >= ACTIVE_HIRING_RATIO {
        Reading {
            score: 0.85,
            description: format!("Active hiring ({recent} recent postings)"),
        }
    } else if ratio >= REDUCED_HIRING_RATIO {
        Reading {
            score: 0.65,
            description: format!("Recent job postings ({recent} against a peak of {peak})"),
        }
    } else if ratio > 0.0 {
        Reading {
            score: 0.35,
            description: format!("Reduced hiring activity ({recent} against a peak of {peak})"),
        }
    } else {
        Reading {
            score: 0.2,
            description: format!("Hiring stopped (no recent postings against a peak of {peak})"),
        }
    };
    Some(reading)
}

fn imagery(ctx: &SurvivalContext) -> Option<Reading> {
    let signals = ctx.signals;
    let fraction = normalize::imagery_cues(
        signals.facade_visible,
        signals.signage_visible,
        signals.lighting_visible,
    )
    .get()?;
    let cues = [signals.facade_visible, signals.signage_visible, signals.lighting_visible];
    let supplied = cues.iter().flatten().count();
    let positive = cues.iter().flatten().filter(|cue| **cue).count();

    let score = 0.2 + 0.6 * fraction;
    let description = if score >= NEUTRAL_SCORE {
        format!("Visible operational indicators ({positive} of {supplied} cues)")
    } else {
        format!("Missing operational indicators ({positive} of {supplied} cues)")
    };
    Some(Reading { score, description })
}

struct Scored {
    rule: &'static SurvivalRule,
    reading: Reading,
    weight: f64,
}

pub struct SurvivalScorer<'a> {
    config: &'a EstimatorConfig,
}

impl<'a> SurvivalScorer<'a> {
    pub fn new(config: &'a EstimatorConfig) -> Self {
        Self { config }
    }

    /// Score the probability that an establishment is still operating.
    ///
    /// Never fails: every missing or degenerate input just drops its signal.
    pub fn score_survival(&self, signals: &SignalBundle, as_of: NaiveDate) -> SurvivalEstimate {
        let windows = &self.config.review_windows;
        let ctx = SurvivalContext {
            signals,
            as_of,
            recent_window_months: signals
                .review_recent_window_months
                .unwrap_or(windows.recent_months),
            prior_window_months: signals
                .review_prior_window_months
                .unwrap_or(windows.prior_months),
        };

        let scored: Vec<Scored> = SURVIVAL_SIGNALS
            .iter()
            .filter_map(|rule| {
                let weight = (rule.weight)(&self.config.survival);
                if weight <= 0.0 {
                    return None;
                }
                let reading = (rule.evaluate)(&ctx)?;
                Some(Scored {
                    rule,
                    reading,
                    weight,
                })
            })
            .collect();

        let days_since_last_review = normalize::review_age_days(signals.last_review_date, as_of)
            .get()
            .map(|days| days as i64);
        let review_decay_rate = decay_rate(&ctx);

        if scored.is_empty() {
            return SurvivalEstimate {
                probability: NEUTRAL_SCORE,
                confidence: ConfidenceLevel::Low,
                risk_factors: Vec::new(),
                protective_factors: Vec::new(),
                primary_indicator: "none".to_string(),
                signals_used: Vec::new(),
                sources_used: Vec::new(),
                days_since_last_review,
                review_decay_rate,
            };
        }

        let total_weight: f64 = scored.iter().map(|s| s.weight).sum();
        let probability = scored
            .iter()
            .map(|s| s.reading.score * (s.weight / total_weight))
            .sum::<f64>()
            .clamp(0.0, 1.0);

        let mut risk_factors = Vec::new();
        let mut protective_factors = Vec::new();
        for s in &scored {
            if s.reading.score > NEUTRAL_SCORE {
                protective_factors.push(s.reading.description.clone());
            } else if s.reading.score < NEUTRAL_SCORE {
                risk_factors.push(s.reading.description.clone());
            }
        }

        let mut sources_used: Vec<SignalSource> = scored.iter().map(|s| s.rule.source).collect();
        sources_used.dedup();

        let estimate = SurvivalEstimate {
            probability,
            confidence: confidence_level(&scored),
            risk_factors,
            protective_factors,
            primary_indicator: primary_indicator(&scored).to_string(),
            signals_used: scored.iter().map(|s| s.rule.name.to_string()).collect(),
            sources_used,
            days_since_last_review,
            review_decay_rate,
        };

        debug!(
            probability = estimate.probability,
            confidence = %estimate.confidence,
            primary = %estimate.primary_indicator,
            risks = estimate.risk_factors.len(),
            "survival score"
        );
        estimate
    }
}

fn confidence_level(scored: &[Scored]) -> ConfidenceLevel {
    let (low, high) = scored.iter().fold((f64::MAX, f64::MIN), |(low, high), s| {
        (low.min(s.reading.score), high.max(s.reading.score))
    });
    let agree = high - low <= AGREEMENT_SPREAD;

    match scored.len() {
        n if n >= SURVIVAL_SIGNALS.len() => ConfidenceLevel::High,
        3 if agree => ConfidenceLevel::High,
        3 => ConfidenceLevel::Medium,
        2 if agree => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    }
}

/// The signal that pulled the probability furthest from neutral.
fn primary_indicator(scored: &[Scored]) -> &'static str {
    let influence = |s: &Scored| s.weight * (s.reading.score - NEUTRAL_SCORE).abs();
    let mut best: Option<&Scored> = None;
    for s in scored {
        if best.map_or(true, |b| influence(s) > influence(b)) {
            best = Some(s);
        }
    }
    best.map_or("none", |s| s.rule.name)
}
