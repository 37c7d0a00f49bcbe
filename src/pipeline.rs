use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{BaselineTable, EstimatorConfig};
use crate::employee::EmployeeEstimator;
use crate::error::Result;
use crate::models::{Assessment, EstablishmentRecord, SignalBundle};
use crate::quality;
use crate::risk::SurvivalScorer;

/// Runs the three estimators over a batch of independent records.
pub struct Pipeline<'a> {
    baselines: &'a BaselineTable,
    config: &'a EstimatorConfig,
    as_of: NaiveDate,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        baselines: &'a BaselineTable,
        config: &'a EstimatorConfig,
        as_of: NaiveDate,
    ) -> Self {
        Self {
            baselines,
            config,
            as_of,
        }
    }

    /// Assess a single record. This is the unit of parallel work.
    pub fn assess(
        &self,
        record: &EstablishmentRecord,
        signals: &SignalBundle,
    ) -> Result<Assessment> {
        let employees =
            EmployeeEstimator::new(self.baselines, self.config).estimate(record, signals)?;
        let survival = SurvivalScorer::new(self.config).score_survival(signals, self.as_of);
        let quality = quality::score(record, &employees, &survival, signals, &self.config.quality);

        Ok(Assessment {
            record: record.clone(),
            employees,
            survival,
            quality,
        })
    }

    /// Assess every record in parallel. Output order matches input order.
    pub fn run(&self, items: &[(EstablishmentRecord, SignalBundle)]) -> Vec<Result<Assessment>> {
        let results: Vec<Result<Assessment>> = items
            .par_iter()
            .map(|(record, signals)| self.assess(record, signals))
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            records = items.len(),
            assessed = items.len() - failed,
            failed,
            as_of = %self.as_of,
            "batch assessed"
        );
        results
    }

    /// Like [`Pipeline::run`], but drops failed records after logging them.
    pub fn run_lenient(&self, items: &[(EstablishmentRecord, SignalBundle)]) -> Vec<Assessment> {
        self.run(items)
            .into_iter()
            .zip(items)
            .filter_map(|(result, (record, _))| match result {
                Ok(assessment) => Some(assessment),
                Err(err) => {
                    warn!(record = %record.id, error = %err, "skipping record");
                    None
                }
            })
            .collect()
    }
}
