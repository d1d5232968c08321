//! CSV price importer.
//!
//! Reads `symbol,company_name,date,open,high,low,close,volume` rows and feeds
//! each one through the listing entry path, so imported data passes the same
//! validation and conflict checks as rows entered over HTTP.

use crate::domain::error::{ErrorKind, FolioError};
use crate::domain::market_data::{add_listing, ListingEntry};
use crate::ports::registry_port::StockRegistryPort;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// 1-based line number in the file, counting the header.
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub duplicates: usize,
    pub rejected: Vec<RejectedRow>,
}

pub struct CsvPriceImporter {
    path: PathBuf,
}

impl CsvPriceImporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn import(&self, registry: &dyn StockRegistryPort) -> Result<ImportSummary, FolioError> {
        let file = std::fs::File::open(&self.path)?;
        let summary = import_from_reader(file, registry)?;
        tracing::info!(
            path = %self.path.display(),
            imported = summary.imported,
            duplicates = summary.duplicates,
            rejected = summary.rejected.len(),
            "price import finished"
        );
        Ok(summary)
    }
}

/// Import rows from any reader. Infrastructure errors abort the import;
/// invalid or conflicting rows are recorded and skipped.
pub fn import_from_reader<R: Read>(
    reader: R,
    registry: &dyn StockRegistryPort,
) -> Result<ImportSummary, FolioError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| FolioError::validation("csv", format!("unreadable header: {e}")))?
        .clone();
    let mut record = csv::StringRecord::new();
    let mut summary = ImportSummary::default();

    loop {
        match rdr.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.is_io_error() => return Err(FolioError::Io(e.into())),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                tracing::warn!(line, error = %e, "unreadable csv row");
                summary.rejected.push(RejectedRow {
                    line,
                    reason: format!("CSV parse error: {e}"),
                });
                continue;
            }
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let entry: ListingEntry = match record.deserialize(Some(&headers)) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(line, error = %e, "malformed csv row");
                summary.rejected.push(RejectedRow {
                    line,
                    reason: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match add_listing(registry, &entry) {
            Ok(_) => summary.imported += 1,
            Err(FolioError::DuplicatePrice { symbol, date }) => {
                tracing::debug!(line, symbol, date, "skipping duplicate price row");
                summary.duplicates += 1;
            }
            Err(e) if e.kind() == ErrorKind::Infrastructure => return Err(e),
            Err(e) => {
                tracing::warn!(line, error = %e, "rejected csv row");
                summary.rejected.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(summary)
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use crate::ports::price_port::PricePort;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "symbol,company_name,date,open,high,low,close,volume\n";

    fn store() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    #[test]
    fn imports_valid_rows() {
        let store = store();
        let data = format!(
            "{HEADER}abc,Abc Corp,2024-01-02,10,11,9,10.5,1000\n\
             ABC,Abc Corp,2024-01-03,10.5,12,10,11.5,1200\n\
             XYZ,Xyz Ltd,2024-01-02,50,51,49,50.5,300\n"
        );
        let summary = import_from_reader(data.as_bytes(), &store).unwrap();
        assert_eq!(summary.imported, 3);
        assert!(summary.rejected.is_empty());
        assert_eq!(store.latest_price("ABC").unwrap(), Some(11.5));
        assert_eq!(store.latest_price("XYZ").unwrap(), Some(50.5));
    }

    #[test]
    fn duplicates_are_counted_not_fatal() {
        let store = store();
        let data = format!(
            "{HEADER}ABC,Abc Corp,2024-01-02,10,11,9,10.5,1000\n\
             ABC,Abc Corp,2024-01-02,10,11,9,10.5,1000\n"
        );
        let summary = import_from_reader(data.as_bytes(), &store).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.duplicates, 1);
    }

    #[test]
    fn invalid_and_conflicting_rows_are_rejected() {
        let store = store();
        let data = format!(
            "{HEADER}ABC,Abc Corp,2024-01-02,10,11,9,10.5,1000\n\
             ABD,Abc Corp,2024-01-02,10,11,9,10.5,1000\n\
             ABC,Abc Corp,not-a-date,10,11,9,10.5,1000\n\
             ABC,Abc Corp,2024-01-04,10,11,9,,1000\n"
        );
        let summary = import_from_reader(data.as_bytes(), &store).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.rejected.len(), 3);
        assert!(summary.rejected[0].reason.contains("already registered"));
    }

    #[test]
    fn importer_reads_file() {
        let store = store();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{HEADER}ABC,Abc Corp,2024-01-02,10,11,9,10.5,1000\n").unwrap();
        let summary = CsvPriceImporter::new(file.path()).import(&store).unwrap();
        assert_eq!(summary.imported, 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let store = store();
        let err = CsvPriceImporter::new("/nonexistent/prices.csv")
            .import(&store)
            .unwrap_err();
        assert!(matches!(err, FolioError::Io(_)));
    }
}
