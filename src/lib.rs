//! Signal-fusion estimation of establishment headcount and operating status.
//!
//! One [`EstablishmentRecord`] plus one [`SignalBundle`] yields an
//! [`EmployeeEstimate`], a [`SurvivalEstimate`] and a [`QualityScore`].
//! Every computation is pure and record-scoped; [`Pipeline`] fans a batch
//! out across threads.

pub mod config;
pub mod dataset;
pub mod employee;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod risk;

pub use config::{BaselineTable, EstimatorConfig};
pub use employee::EmployeeEstimator;
pub use error::EstimateError;
pub use models::{
    Assessment, ConfidenceLevel, EmployeeEstimate, EstablishmentRecord, IndustryBaseline,
    QualityScore, SignalBundle, SignalSource, SurvivalEstimate,
};
pub use pipeline::Pipeline;
pub use risk::SurvivalScorer;
