//! Raw signal normalization.
//!
//! Every function here turns one raw observation into a [`Normalized`]
//! value. Absent inputs, zero denominators and physically implausible
//! values all come back inapplicable, so the combination steps downstream
//! only ever average over usable data.

use chrono::NaiveDate;

/// Floor areas above this are parcels or malls, not a single location.
pub const MAX_FLOOR_AREA_SQM: f64 = 100_000.0;

/// A footprint this many times the industry's typical store is treated as
/// a mismatched building.
pub const MAX_FOOTPRINT_MULTIPLE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub value: f64,
    pub applicable: bool,
}

impl Normalized {
    pub fn of(value: f64) -> Self {
        if value.is_finite() {
            Self {
                value,
                applicable: true,
            }
        } else {
            Self::inapplicable()
        }
    }

    pub fn inapplicable() -> Self {
        Self {
            value: 0.0,
            applicable: false,
        }
    }

    pub fn get(&self) -> Option<f64> {
        self.applicable.then_some(self.value)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self.get() {
            Some(value) => Self::of(f(value)),
            None => self,
        }
    }
}

/// Professional-network headcount. Only strictly positive counts apply.
pub fn headcount(count: Option<i64>) -> Normalized {
    match count {
        Some(count) if count > 0 => Normalized::of(count as f64),
        _ => Normalized::inapplicable(),
    }
}

/// Ratio of the recent per-month review rate to the prior per-month rate.
///
/// Both counts must be present and non-negative, both windows positive,
/// and the prior count non-zero.
pub fn review_rate_ratio(
    recent: Option<i64>,
    prior: Option<i64>,
    recent_window_months: f64,
    prior_window_months: f64,
) -> Normalized {
    let (Some(recent), Some(prior)) = (recent, prior) else {
        return Normalized::inapplicable();
    };
    if recent < 0 || prior <= 0 {
        return Normalized::inapplicable();
    }
    if !(recent_window_months > 0.0 && prior_window_months > 0.0) {
        return Normalized::inapplicable();
    }

    let recent_rate = recent as f64 / recent_window_months;
    let prior_rate = prior as f64 / prior_window_months;
    Normalized::of(recent_rate / prior_rate)
}

/// Recent postings as a fraction of the historical peak, capped at 1.
///
/// A peak of zero leaves nothing to compare against.
pub fn posting_ratio(recent: Option<i64>, peak: Option<i64>) -> Normalized {
    let (Some(recent), Some(peak)) = (recent, peak) else {
        return Normalized::inapplicable();
    };
    if recent < 0 || peak <= 0 {
        return Normalized::inapplicable();
    }
    Normalized::of((recent as f64 / peak as f64).min(1.0))
}

/// Building floor area in square meters, checked against a sane range and,
/// when known, the industry's typical footprint.
pub fn floor_area(area_sqm: Option<f64>, typical_sqm: Option<f64>) -> Normalized {
    let Some(area) = area_sqm else {
        return Normalized::inapplicable();
    };
    if !area.is_finite() || area <= 0.0 || area > MAX_FLOOR_AREA_SQM {
        return Normalized::inapplicable();
    }
    if let Some(typical) = typical_sqm {
        if area > typical * MAX_FOOTPRINT_MULTIPLE {
            return Normalized::inapplicable();
        }
    }
    Normalized::of(area)
}

/// Whole days between the last review and `as_of`. Future dates are
/// inapplicable.
pub fn review_age_days(last_review: Option<NaiveDate>, as_of: NaiveDate) -> Normalized {
    let Some(date) = last_review else {
        return Normalized::inapplicable();
    };
    let days = (as_of - date).num_days();
    if days < 0 {
        return Normalized::inapplicable();
    }
    Normalized::of(days as f64)
}

/// Fraction of supplied imagery cues that were positive. Inapplicable when
/// no cue was supplied at all.
pub fn imagery_cues(
    facade: Option<bool>,
    signage: Option<bool>,
    lighting: Option<bool>,
) -> Normalized {
    let supplied: Vec<bool> = [facade, signage, lighting].into_iter().flatten().collect();
    if supplied.is_empty() {
        return Normalized::inapplicable();
    }
    let positive = supplied.iter().filter(|cue| **cue).count();
    Normalized::of(positive as f64 / supplied.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn headcount_requires_positive_count() {
        assert_eq!(headcount(Some(18)).get(), Some(18.0));
        assert!(!headcount(Some(0)).applicable);
        assert!(!headcount(Some(-3)).applicable);
        assert!(!headcount(None).applicable);
    }

    #[test]
    fn review_ratio_normalizes_by_window() {
        let ratio = review_rate_ratio(Some(8), Some(15), 3.0, 6.0).get().unwrap();
        assert!((ratio - (8.0 / 3.0) / (15.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn review_ratio_zero_prior_is_inapplicable() {
        assert!(!review_rate_ratio(Some(8), Some(0), 3.0, 6.0).applicable);
    }

    #[test]
    fn review_ratio_allows_silent_recent_window() {
        assert_eq!(review_rate_ratio(Some(0), Some(12), 3.0, 6.0).get(), Some(0.0));
    }

    #[test]
    fn review_ratio_rejects_degenerate_inputs() {
        assert!(!review_rate_ratio(Some(-1), Some(12), 3.0, 6.0).applicable);
        assert!(!review_rate_ratio(Some(4), Some(12), 0.0, 6.0).applicable);
        assert!(!review_rate_ratio(Some(4), None, 3.0, 6.0).applicable);
    }

    #[test]
    fn posting_ratio_caps_at_one() {
        assert_eq!(posting_ratio(Some(6), Some(3)).get(), Some(1.0));
        assert_eq!(posting_ratio(Some(1), Some(4)).get(), Some(0.25));
        assert!(!posting_ratio(Some(0), Some(0)).applicable);
        assert!(!posting_ratio(Some(2), None).applicable);
    }

    #[test]
    fn floor_area_range_checks() {
        assert_eq!(floor_area(Some(400.0), None).get(), Some(400.0));
        assert!(!floor_area(Some(0.0), None).applicable);
        assert!(!floor_area(Some(f64::NAN), None).applicable);
        assert!(!floor_area(Some(MAX_FLOOR_AREA_SQM + 1.0), None).applicable);
        assert!(!floor_area(Some(20_000.0), Some(250.0)).applicable);
        assert!(floor_area(Some(2_000.0), Some(250.0)).applicable);
    }

    #[test]
    fn review_age_rejects_future_dates() {
        let as_of = date(2026, 3, 1);
        assert_eq!(review_age_days(Some(date(2026, 2, 1)), as_of).get(), Some(28.0));
        assert_eq!(review_age_days(Some(as_of), as_of).get(), Some(0.0));
        assert!(!review_age_days(Some(date(2026, 3, 2)), as_of).applicable);
        assert!(!review_age_days(None, as_of).applicable);
    }

    #[test]
    fn imagery_uses_only_supplied_cues() {
        assert!(!imagery_cues(None, None, None).applicable);
        assert_eq!(imagery_cues(Some(true), None, None).get(), Some(1.0));
        assert_eq!(imagery_cues(Some(true), Some(false), None).get(), Some(0.5));
        assert_eq!(imagery_cues(Some(false), Some(false), Some(false)).get(), Some(0.0));
    }
}
