use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::app::ports::{ObjectStorePort, WarehousePort};
use crate::domain::RowTable;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::steps::export::{ExportReport, Exporter};
use crate::pipeline::steps::validate::{ValidationOutcome, Validator};
use crate::types::{DeployTarget, Environment};

/// Where the two-stage deploy currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    StagingExport,
    StagingValidate,
    ProductionExport,
    ProductionValidate,
    /// Staging read back empty or errored; production untouched
    Aborted,
    /// Production written and probed, whatever the probe said
    Promoted,
}

impl DeployStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployStage::Aborted | DeployStage::Promoted)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    /// Stages in the order they ran, ending with the terminal one
    pub stages: Vec<DeployStage>,
    pub staging_export: Option<ExportReport>,
    pub staging_validation: Option<ValidationOutcome>,
    pub production_export: Option<ExportReport>,
    pub production_validation: Option<ValidationOutcome>,
}

impl DeployReport {
    pub fn final_stage(&self) -> Option<DeployStage> {
        self.stages.last().copied()
    }

    pub fn promoted(&self) -> bool {
        self.final_stage() == Some(DeployStage::Promoted)
    }
}

/// Staging export -> staging probe -> (production export -> production probe | abort).
///
/// Export failures propagate and end the run. Probe failures never do: a bad
/// staging probe aborts, a bad production probe is only reported.
pub struct DeployOrchestrator {
    exporter: Exporter,
    validator: Validator,
    staging: DeployTarget,
    production: DeployTarget,
}

impl DeployOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStorePort>,
        warehouse: Arc<dyn WarehousePort>,
        staging: DeployTarget,
        production: DeployTarget,
    ) -> Self {
        debug_assert_eq!(staging.environment, Environment::Staging);
        debug_assert_eq!(production.environment, Environment::Production);
        Self {
            exporter: Exporter::new(store),
            validator: Validator::new(warehouse),
            staging,
            production,
        }
    }

    #[instrument(skip(self, table), fields(rows = table.len()))]
    pub async fn deploy(&self, table: &RowTable) -> Result<DeployReport> {
        let mut report = DeployReport {
            stages: Vec::new(),
            staging_export: None,
            staging_validation: None,
            production_export: None,
            production_validation: None,
        };

        let mut stage = DeployStage::StagingExport;
        loop {
            report.stages.push(stage);
            if stage.is_terminal() {
                break;
            }

            stage = match stage {
                DeployStage::StagingExport => {
                    info!(location = %self.staging.location, "Exporting to staging");
                    report.staging_export = Some(self.exporter.export(table, &self.staging).await?);
                    metrics::deploy::exported(Environment::Staging);
                    DeployStage::StagingValidate
                }
                DeployStage::StagingValidate => {
                    let outcome = self.validator.check(&self.staging.table).await;
                    metrics::deploy::validated(Environment::Staging, &outcome);
                    let bad = outcome.is_empty_or_error();
                    report.staging_validation = Some(outcome);
                    if bad {
                        warn!(table = %self.staging.table, "The output is empty or an error occurred; production left untouched");
                        metrics::deploy::aborted();
                        DeployStage::Aborted
                    } else {
                        DeployStage::ProductionExport
                    }
                }
                DeployStage::ProductionExport => {
                    info!(location = %self.production.location, "Promoting to production");
                    report.production_export = Some(self.exporter.export(table, &self.production).await?);
                    metrics::deploy::exported(Environment::Production);
                    DeployStage::ProductionValidate
                }
                DeployStage::ProductionValidate => {
                    let outcome = self.validator.check(&self.production.table).await;
                    metrics::deploy::validated(Environment::Production, &outcome);
                    if outcome.is_empty_or_error() {
                        error!(table = %self.production.table, "Production table empty or unreadable after promotion");
                    }
                    report.production_validation = Some(outcome);
                    DeployStage::Promoted
                }
                DeployStage::Aborted | DeployStage::Promoted => unreachable!("terminal stages exit the loop"),
            };
        }

        Ok(report)
    }
}
