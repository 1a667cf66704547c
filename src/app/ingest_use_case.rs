use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::infra::Backends;
use crate::observability::metrics;
use crate::pipeline::orchestrator::{DeployOrchestrator, DeployReport};
use crate::pipeline::processing::enrich::{EnrichmentReport, PostalEnricher};
use crate::pipeline::processing::normalize::{ColumnNormalizer, NormalizationReport, Normalizer};
use crate::pipeline::processing::spreadsheet::SpreadsheetReader;
use crate::schema::SchemaMapping;
use crate::types::{Environment, StorageEvent};

/// Everything one invocation did, end to end
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub event: StorageEvent,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub rows: usize,
    pub normalization: NormalizationReport,
    pub enrichment: EnrichmentReport,
    pub deploy: DeployReport,
}

impl RunSummary {
    pub fn promoted(&self) -> bool {
        self.deploy.promoted()
    }
}

/// One storage event in, one gated staging-then-production deploy out
pub struct IngestUseCase {
    reader: SpreadsheetReader,
    normalizer: Box<dyn Normalizer + Send + Sync>,
    enricher: PostalEnricher,
    orchestrator: DeployOrchestrator,
}

impl IngestUseCase {
    pub fn new(
        reader: SpreadsheetReader,
        normalizer: Box<dyn Normalizer + Send + Sync>,
        enricher: PostalEnricher,
        orchestrator: DeployOrchestrator,
    ) -> Self {
        Self {
            reader,
            normalizer,
            enricher,
            orchestrator,
        }
    }

    /// Wire every stage against the given backends
    pub fn from_config(config: &Config, schema: &SchemaMapping, backends: &Backends) -> Self {
        Self::new(
            SpreadsheetReader::new(backends.store.clone()),
            Box::new(ColumnNormalizer::from_schema(schema)),
            PostalEnricher::new(
                backends.store.clone(),
                config.reference.location.clone(),
                config.enrichment.clone(),
            ),
            DeployOrchestrator::new(
                backends.store.clone(),
                backends.warehouse.clone(),
                config.target(Environment::Staging),
                config.target(Environment::Production),
            ),
        )
    }

    #[instrument(skip(self), fields(bucket = %event.bucket, name = %event.name))]
    pub async fn run(&self, event: &StorageEvent) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let t_run = Instant::now();
        info!(%run_id, "Processing storage event");
        metrics::pipeline::run_started();

        let result = self.run_stages(event).await;
        let duration_secs = t_run.elapsed().as_secs_f64();
        metrics::pipeline::duration(duration_secs);

        match result {
            Ok((rows, normalization, enrichment, deploy)) => {
                info!(%run_id, rows, promoted = deploy.promoted(), duration_secs, "Run finished");
                Ok(RunSummary {
                    run_id,
                    event: event.clone(),
                    started_at,
                    duration_secs,
                    rows,
                    normalization,
                    enrichment,
                    deploy,
                })
            }
            Err((stage, e)) => {
                error!(%run_id, stage, error = %e, "Run failed");
                metrics::pipeline::run_failed(stage);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        event: &StorageEvent,
    ) -> std::result::Result<(usize, NormalizationReport, EnrichmentReport, DeployReport), (&'static str, crate::error::IngestError)>
    {
        let mut table = self.reader.read(event).await.map_err(|e| ("read", e))?;
        metrics::pipeline::rows_ingested(table.len());

        let normalization = self.normalizer.normalize(&mut table).map_err(|e| ("normalize", e))?;
        metrics::pipeline::normalized(&normalization);

        let enrichment = self.enricher.enrich(&mut table).await.map_err(|e| ("enrich", e))?;
        metrics::pipeline::enriched(&enrichment);

        let deploy = self.orchestrator.deploy(&table).await.map_err(|e| ("deploy", e))?;
        Ok((table.len(), normalization, enrichment, deploy))
    }
}

/// Builds use cases on demand from process-wide settings; each invocation gets
/// fresh stage state while the schema and clients are shared read-only.
#[derive(Clone)]
pub struct IngestService {
    config: Arc<Config>,
    schema: Arc<SchemaMapping>,
    backends: Backends,
}

impl IngestService {
    pub fn new(config: Arc<Config>, schema: Arc<SchemaMapping>, backends: Backends) -> Self {
        Self {
            config,
            schema,
            backends,
        }
    }

    pub async fn handle(&self, event: &StorageEvent) -> Result<RunSummary> {
        IngestUseCase::from_config(&self.config, &self.schema, &self.backends)
            .run(event)
            .await
    }
}
