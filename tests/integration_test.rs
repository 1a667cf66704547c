use std::fs;
use std::path::Path;
use std::sync::Arc;

use shopper_ingest::config::Config;
use shopper_ingest::domain::{CellValue, RowTable};
use shopper_ingest::infra::in_memory::InMemoryObjectStore;
use shopper_ingest::infra::Backends;
use shopper_ingest::pipeline::orchestrator::{DeployOrchestrator, DeployStage};
use shopper_ingest::pipeline::processing::enrich::PostalEnricher;
use shopper_ingest::pipeline::processing::normalize::{ColumnNormalizer, Normalizer};
use shopper_ingest::pipeline::steps::export::Exporter;
use shopper_ingest::pipeline::steps::validate::ValidationOutcome;
use shopper_ingest::schema::SchemaMapping;
use shopper_ingest::types::Environment;
use tempfile::TempDir;

const SCHEMA: &str = r#"{"name": "str", "age": "int"}"#;
const REFERENCE: &str = "pincode,regionname\n560001,Bengaluru\n570001,Mysuru\n";

fn local_config(root: &Path) -> Config {
    let toml = format!(
        r#"
[warehouse]
project_id = "shopping-store-415510"
database = "store_data"
staging_table = "development_shopper_table"
production_table = "shopper_table"

[staging]
location = "gs://development-shopper-table/shopping_store_bq_external.csv"
bucket = "development-shopper-table"

[production]
location = "gs://shopper-table/shopping_store_bq_external.csv"
bucket = "shopper-table"

[reference]
location = "gs://reference-data/pincodes.csv"

[backend]
kind = "local"
root = "{}"
"#,
        root.display().to_string().replace('\\', "/")
    );
    Config::from_toml_str(&toml).expect("test config is valid")
}

fn seed_reference(root: &Path) {
    let dir = root.join("reference-data");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("pincodes.csv"), REFERENCE).unwrap();
}

/// Rows as the spreadsheet decoder would hand them over
fn uploaded_rows() -> RowTable {
    let mut table = RowTable::new(vec!["name".into(), "age".into(), "sex".into(), "pincode".into()]);
    table.push_row(vec!["Asha".into(), CellValue::Float(31.9), "Female".into(), CellValue::Int(560001)]);
    table.push_row(vec![CellValue::Int(7), CellValue::Int(45), "M".into(), CellValue::Float(570001.0)]);
    table.push_row(vec!["Ravi".into(), "forty".into(), CellValue::Null, CellValue::Int(999999)]);
    table
}

async fn deploy_locally(root: &Path, table: RowTable) -> (Config, shopper_ingest::pipeline::orchestrator::DeployReport) {
    let config = local_config(root);
    let backends = Backends::from_config(&config).unwrap();
    let schema = SchemaMapping::from_json_str(SCHEMA).unwrap();

    let mut table = table;
    ColumnNormalizer::from_schema(&schema).normalize(&mut table).unwrap();
    PostalEnricher::new(
        backends.store.clone(),
        config.reference.location.clone(),
        config.enrichment.clone(),
    )
    .enrich(&mut table)
    .await
    .unwrap();

    let report = DeployOrchestrator::new(
        backends.store.clone(),
        backends.warehouse.clone(),
        config.target(Environment::Staging),
        config.target(Environment::Production),
    )
    .deploy(&table)
    .await
    .unwrap();
    (config, report)
}

#[tokio::test]
async fn populated_upload_is_promoted_to_production() {
    let tmp = TempDir::new().unwrap();
    seed_reference(tmp.path());

    let (config, report) = deploy_locally(tmp.path(), uploaded_rows()).await;

    assert!(report.promoted());
    assert_eq!(report.staging_validation, Some(ValidationOutcome::Populated));
    assert_eq!(report.production_validation, Some(ValidationOutcome::Populated));

    let production = &config.production.location;
    let csv = fs::read_to_string(tmp.path().join(&production.bucket).join(&production.key)).unwrap();
    assert_eq!(
        csv,
        "name,age,sex,pincode,city\n\
         Asha,31,female,560001,Bengaluru\n\
         ,45,male,570001.0,Mysuru\n\
         Ravi,,,999999,\n"
    );

    // Only the target object is left in each deploy bucket
    for bucket in ["development-shopper-table", "shopper-table"] {
        let names: Vec<String> = fs::read_dir(tmp.path().join(bucket))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["shopping_store_bq_external.csv".to_string()]);
    }
}

#[tokio::test]
async fn empty_upload_never_reaches_production() {
    let tmp = TempDir::new().unwrap();
    seed_reference(tmp.path());
    let production_dir = tmp.path().join("shopper-table");
    fs::create_dir_all(&production_dir).unwrap();
    fs::write(production_dir.join("shopping_store_bq_external.csv"), "name\nprevious\n").unwrap();

    let empty = RowTable::new(vec!["name".into(), "age".into(), "sex".into(), "pincode".into()]);
    let (_, report) = deploy_locally(tmp.path(), empty).await;

    assert_eq!(report.final_stage(), Some(DeployStage::Aborted));
    assert_eq!(report.staging_validation, Some(ValidationOutcome::Empty));
    assert!(report.production_export.is_none());
    assert_eq!(
        fs::read_to_string(production_dir.join("shopping_store_bq_external.csv")).unwrap(),
        "name\nprevious\n"
    );
}

#[tokio::test]
async fn missing_reference_fails_the_run() {
    let tmp = TempDir::new().unwrap();
    let config = local_config(tmp.path());
    let backends = Backends::from_config(&config).unwrap();

    let mut table = uploaded_rows();
    let err = PostalEnricher::new(backends.store.clone(), config.reference.location.clone(), config.enrichment.clone())
        .enrich(&mut table)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("pincodes.csv"));
}

#[tokio::test]
async fn repeated_export_leaves_only_the_latest_csv() {
    let tmp = TempDir::new().unwrap();
    let config = local_config(tmp.path());
    let target = config.target(Environment::Staging);

    let store = Arc::new(InMemoryObjectStore::new());
    store.insert(&target.bucket, "stale_export.csv", b"old".to_vec());
    let exporter = Exporter::new(store.clone());

    let mut first = RowTable::new(vec!["name".into()]);
    first.push_row(vec!["Asha".into()]);
    exporter.export(&first, &target).await.unwrap();

    let mut second = RowTable::new(vec!["name".into()]);
    second.push_row(vec!["Ravi".into()]);
    let report = exporter.export(&second, &target).await.unwrap();

    assert_eq!(store.keys(&target.bucket), vec![target.location.key.clone()]);
    assert_eq!(store.object(&target.bucket, &target.location.key).unwrap(), b"name\nRavi\n".to_vec());
    assert_eq!(report.rows, 1);
    assert!(report.removed.is_empty());
}
