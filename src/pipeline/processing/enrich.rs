use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::app::ports::ObjectStorePort;
use crate::config::EnrichmentConfig;
use crate::constants::{REFERENCE_CITY_COLUMN, REFERENCE_POSTAL_COLUMN};
use crate::domain::{canonical_key, CellValue, RowTable};
use crate::error::{IngestError, Result};
use crate::types::ObjectLocation;

/// Postal code -> city lookup built from the reference CSV.
/// When a code repeats, the first row wins.
#[derive(Debug, Clone, Default)]
pub struct PostalReference {
    cities: HashMap<String, Option<String>>,
    duplicates: usize,
}

impl PostalReference {
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let headers = rdr.headers()?.clone();
        let position = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                IngestError::MissingColumn(format!("{name} (postal reference)"))
            })
        };
        let code_idx = position(REFERENCE_POSTAL_COLUMN)?;
        let city_idx = position(REFERENCE_CITY_COLUMN)?;

        let mut reference = Self::default();
        for record in rdr.records() {
            let record = record?;
            let Some(code) = record.get(code_idx).and_then(canonical_key) else {
                continue;
            };
            let city = record
                .get(city_idx)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            reference.insert(code, city);
        }
        Ok(reference)
    }

    fn insert(&mut self, code: String, city: Option<String>) {
        if self.cities.contains_key(&code) {
            self.duplicates += 1;
        } else {
            self.cities.insert(code, city);
        }
    }

    pub fn city_for(&self, code: &str) -> Option<&str> {
        self.cities.get(code).and_then(|c| c.as_deref())
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Rows dropped because their postal code had already been seen
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

impl<S: Into<String>> FromIterator<(S, S)> for PostalReference {
    fn from_iter<I: IntoIterator<Item = (S, S)>>(iter: I) -> Self {
        let mut reference = Self::default();
        for (code, city) in iter {
            let code: String = code.into();
            if let Some(code) = canonical_key(&code) {
                reference.insert(code, Some(city.into()));
            }
        }
        reference
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct EnrichmentReport {
    pub rows: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub reference_size: usize,
    pub reference_duplicates: usize,
}

/// Left-join the city onto every row; unmatched rows get a null city and no row is dropped
pub fn left_join_city(
    table: &mut RowTable,
    reference: &PostalReference,
    postal_column: &str,
    city_column: &str,
) -> Result<EnrichmentReport> {
    let cities: Vec<CellValue> = table
        .column_values(postal_column)?
        .map(|code| {
            code.join_key()
                .and_then(|k| reference.city_for(&k))
                .map(CellValue::text)
                .unwrap_or(CellValue::Null)
        })
        .collect();

    let matched = cities.iter().filter(|c| !c.is_null()).count();
    let report = EnrichmentReport {
        rows: table.len(),
        matched,
        unmatched: table.len() - matched,
        reference_size: reference.len(),
        reference_duplicates: reference.duplicates(),
    };

    table.set_column(city_column, cities)?;
    Ok(report)
}

/// Loads the reference table fresh on every call and joins it onto the upload
pub struct PostalEnricher {
    store: Arc<dyn ObjectStorePort>,
    location: ObjectLocation,
    config: EnrichmentConfig,
}

impl PostalEnricher {
    pub fn new(store: Arc<dyn ObjectStorePort>, location: ObjectLocation, config: EnrichmentConfig) -> Self {
        Self {
            store,
            location,
            config,
        }
    }

    #[instrument(skip(self), fields(reference = %self.location))]
    pub async fn load_reference(&self) -> Result<PostalReference> {
        let bytes = self.store.get(&self.location.bucket, &self.location.key).await?;
        let reference = PostalReference::from_csv_reader(bytes.as_slice())?;
        if reference.duplicates() > 0 {
            warn!(duplicates = reference.duplicates(), "Dropped duplicate postal codes from reference");
        }
        info!(codes = reference.len(), "Loaded postal reference");
        Ok(reference)
    }

    #[instrument(skip(self, table), fields(rows = table.len()))]
    pub async fn enrich(&self, table: &mut RowTable) -> Result<EnrichmentReport> {
        let reference = self.load_reference().await?;
        let report = left_join_city(table, &reference, &self.config.postal_column, &self.config.city_column)?;
        info!(matched = report.matched, unmatched = report.unmatched, "Joined city onto rows");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RowTable {
        let mut table = RowTable::new(vec!["name".into(), "pincode".into()]);
        table.push_row(vec!["Asha".into(), CellValue::Int(560001)]);
        table.push_row(vec!["Ravi".into(), CellValue::Int(999999)]);
        table.push_row(vec!["Meera".into(), CellValue::Null]);
        table.push_row(vec!["Kiran".into(), CellValue::Float(570001.0)]);
        table
    }

    #[test]
    fn reference_keeps_first_city_for_duplicate_codes() {
        let csv = "pincode,regionname,statename\n560001,Bengaluru,KA\n560001,Bangalore Urban,KA\n570001,Mysuru,KA\n";
        let reference = PostalReference::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(reference.len(), 2);
        assert_eq!(reference.duplicates(), 1);
        assert_eq!(reference.city_for("560001"), Some("Bengaluru"));
    }

    #[test]
    fn reference_requires_its_columns() {
        let csv = "zip,region\n560001,Bengaluru\n";
        let err = PostalReference::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(_)));
    }

    #[test]
    fn blank_reference_city_is_null() {
        let csv = "pincode,regionname\n560001,\n";
        let reference = PostalReference::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(reference.len(), 1);
        assert_eq!(reference.city_for("560001"), None);
    }

    #[test]
    fn left_join_preserves_every_row() {
        let mut table = table();
        let reference: PostalReference = [("560001", "Bengaluru"), ("570001", "Mysuru")].into_iter().collect();

        let report = left_join_city(&mut table, &reference, "pincode", "city").unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(report.rows, 4);
        assert_eq!(report.matched, 2);
        assert_eq!(report.unmatched, 2);
        assert_eq!(table.get(0, "city"), Some(&CellValue::text("Bengaluru")));
        assert_eq!(table.get(1, "city"), Some(&CellValue::Null));
        assert_eq!(table.get(2, "city"), Some(&CellValue::Null));
        assert_eq!(table.get(3, "city"), Some(&CellValue::text("Mysuru")));
    }

    #[test]
    fn left_join_needs_postal_column() {
        let mut table = RowTable::new(vec!["name".into()]);
        table.push_row(vec!["Asha".into()]);
        let reference = PostalReference::default();
        assert!(left_join_city(&mut table, &reference, "pincode", "city").is_err());
    }
}
