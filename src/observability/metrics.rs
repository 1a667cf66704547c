//! Metrics for the ingest pipeline
//!
//! Thin wrappers over the `metrics` facade so call sites never spell metric
//! names. Nothing is exported unless the host process installs a recorder.

use std::fmt;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Pipeline metrics
    PipelineRuns,
    PipelineFailures,
    PipelineDuration,
    RowsIngested,
    CellsNulled,
    RowsEnriched,
    RowsUnmatched,

    // Deploy metrics
    DeployExports,
    DeployValidations,
    DeployAborts,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PipelineRuns => "shopper_pipeline_runs_total",
            MetricName::PipelineFailures => "shopper_pipeline_failures_total",
            MetricName::PipelineDuration => "shopper_pipeline_duration_seconds",
            MetricName::RowsIngested => "shopper_rows_ingested_total",
            MetricName::CellsNulled => "shopper_cells_nulled_total",
            MetricName::RowsEnriched => "shopper_rows_enriched_total",
            MetricName::RowsUnmatched => "shopper_rows_unmatched_total",

            MetricName::DeployExports => "shopper_deploy_exports_total",
            MetricName::DeployValidations => "shopper_deploy_validations_total",
            MetricName::DeployAborts => "shopper_deploy_aborts_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Pipeline Metrics
// ============================================================================

pub mod pipeline {
    use super::MetricName;
    use crate::pipeline::processing::enrich::EnrichmentReport;
    use crate::pipeline::processing::normalize::NormalizationReport;

    pub fn run_started() {
        ::metrics::counter!(MetricName::PipelineRuns.as_str()).increment(1);
    }

    pub fn run_failed(stage: &'static str) {
        ::metrics::counter!(MetricName::PipelineFailures.as_str(), "stage" => stage).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::PipelineDuration.as_str()).record(secs);
    }

    pub fn rows_ingested(rows: usize) {
        ::metrics::counter!(MetricName::RowsIngested.as_str()).increment(rows as u64);
    }

    pub fn normalized(report: &NormalizationReport) {
        for (column, nulled) in &report.nulled {
            ::metrics::counter!(MetricName::CellsNulled.as_str(), "column" => column.clone())
                .increment(*nulled as u64);
        }
    }

    pub fn enriched(report: &EnrichmentReport) {
        ::metrics::counter!(MetricName::RowsEnriched.as_str()).increment(report.matched as u64);
        ::metrics::counter!(MetricName::RowsUnmatched.as_str()).increment(report.unmatched as u64);
    }
}

// ============================================================================
// Deploy Metrics
// ============================================================================

pub mod deploy {
    use super::MetricName;
    use crate::pipeline::steps::validate::ValidationOutcome;
    use crate::types::Environment;

    pub fn exported(environment: Environment) {
        ::metrics::counter!(MetricName::DeployExports.as_str(), "env" => environment.to_string()).increment(1);
    }

    pub fn validated(environment: Environment, outcome: &ValidationOutcome) {
        let result = match outcome {
            ValidationOutcome::Populated => "populated",
            ValidationOutcome::Empty => "empty",
            ValidationOutcome::Failed(_) => "failed",
        };
        ::metrics::counter!(
            MetricName::DeployValidations.as_str(),
            "env" => environment.to_string(),
            "result" => result
        )
        .increment(1);
    }

    pub fn aborted() {
        ::metrics::counter!(MetricName::DeployAborts.as_str()).increment(1);
    }
}
