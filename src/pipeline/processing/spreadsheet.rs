use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::{debug, info, instrument};

use crate::app::ports::ObjectStorePort;
use crate::domain::{CellValue, RowTable};
use crate::error::{IngestError, Result};
use crate::types::StorageEvent;

/// Fetches an uploaded workbook and decodes its first worksheet
pub struct SpreadsheetReader {
    store: Arc<dyn ObjectStorePort>,
}

impl SpreadsheetReader {
    pub fn new(store: Arc<dyn ObjectStorePort>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(bucket = %event.bucket, name = %event.name))]
    pub async fn read(&self, event: &StorageEvent) -> Result<RowTable> {
        let bytes = self.store.get(&event.bucket, &event.name).await?;
        info!(bytes = bytes.len(), "Fetched spreadsheet");
        let table = parse_spreadsheet(bytes)?;
        info!(rows = table.len(), columns = table.columns().len(), "Parsed spreadsheet");
        Ok(table)
    }
}

/// Decode xlsx/xls/ods bytes; the first row of the first worksheet is the header
pub fn parse_spreadsheet(bytes: Vec<u8>) -> Result<RowTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::Spreadsheet("No worksheet found".to_string()))??;
    Ok(table_from_range(&range))
}

pub fn table_from_range(range: &Range<Data>) -> RowTable {
    let mut rows = range.rows();
    let header = match rows.next() {
        Some(header) => header_names(header),
        None => return RowTable::default(),
    };
    debug!(?header, "Spreadsheet header");

    let mut table = RowTable::new(header);
    for row in rows {
        table.push_row(row.iter().map(cell_value).collect());
    }
    table
}

/// Blank headers become `Unnamed: <n>` and repeats get a `.1`, `.2`... suffix
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let base = match cell {
                Data::Empty => format!("Unnamed: {i}"),
                Data::String(s) if s.trim().is_empty() => format!("Unnamed: {i}"),
                Data::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::DateTime(other.to_string()),
    }
}
