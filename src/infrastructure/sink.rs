//! Output side of a harvest: sink ordering, the fixed-width row, and file sinks
//!
//! Records reach a sink sorted newest first. The spreadsheet upload itself is
//! someone else's concern; anything that can take a list of rows implements
//! [`RecordSink`].

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

use crate::domain::contract::ContractRecord;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SinkError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Column titles of a sink row, in order.
pub const COLUMNS: [&str; 11] = [
    "URL",
    "Názov",
    "Obstarávateľ",
    "Dátum vytvorenia",
    "Dátum poslednej aktualizácie",
    "Stav zákazky",
    "CPV zákazky",
    "Druh zákazky",
    "Dátum zverejnenia",
    "Dokumenty",
    "Oznámenia",
];

/// One output row; always [`COLUMNS`]`.len()` cells.
pub type SheetRow = [String; 11];

/// Sort newest first by [`ContractRecord::sort_key`]. Ties keep their order.
pub fn sort_for_sink(records: &mut [ContractRecord]) {
    records.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
}

/// Flatten a record into its sink row. Absent fields become empty cells.
pub fn to_row(record: &ContractRecord) -> SheetRow {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let cpv = record
        .cpv_codes
        .as_deref()
        .map(|codes| codes.trim().replace('\n', ", "))
        .unwrap_or_default();

    [
        record.url().to_string(),
        record.title.clone(),
        record.authority.clone(),
        field(&record.created_at),
        field(&record.updated_at),
        field(&record.status),
        cpv,
        field(&record.kind),
        field(&record.published_at),
        record.documents.join(", "),
        record.announcements.join(", "),
    ]
}

/// Destination for the final, sorted record set.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write(&self, records: &[ContractRecord]) -> Result<(), SinkError>;
}

/// Tab separated file with a header line.
#[derive(Debug, Clone)]
pub struct TsvFileSink {
    path: PathBuf,
}

impl TsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(records: &[ContractRecord]) -> String {
        let mut out = COLUMNS.join("\t");
        out.push('\n');
        for record in records {
            let cells: Vec<String> = to_row(record).iter().map(String::as_str).map(sanitize).collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        out
    }
}

/// Tabs and line breaks would break the row structure.
fn sanitize(cell: &str) -> String {
    cell.replace(['\t', '\r', '\n'], " ")
}

#[async_trait]
impl RecordSink for TsvFileSink {
    async fn write(&self, records: &[ContractRecord]) -> Result<(), SinkError> {
        fs::write(&self.path, Self::render(records))
            .await
            .map_err(|e| SinkError::io(&self.path, e))?;
        info!("Wrote {} rows to {}", records.len(), self.path.display());
        Ok(())
    }
}

/// Pretty-printed JSON dump of the whole record set.
#[derive(Debug, Clone)]
pub struct JsonSnapshot {
    path: PathBuf,
}

impl JsonSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `contracts.json` → `contracts.<suffix>.json` in the same directory.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "contracts".to_string());
        let name = match self.path.extension() {
            Some(ext) => format!("{stem}.{suffix}.{}", ext.to_string_lossy()),
            None => format!("{stem}.{suffix}"),
        };
        Self::new(self.path.with_file_name(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, records: &[ContractRecord]) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, json)
            .await
            .map_err(|e| SinkError::io(&self.path, e))?;
        debug!("Snapshot of {} records saved to {}", records.len(), self.path.display());
        Ok(())
    }

    pub async fn load(&self) -> Result<Vec<ContractRecord>, SinkError> {
        let json = fs::read_to_string(&self.path)
            .await
            .map_err(|e| SinkError::io(&self.path, e))?;
        let records: Vec<ContractRecord> = serde_json::from_str(&json)?;
        debug!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

#[async_trait]
impl RecordSink for JsonSnapshot {
    async fn write(&self, records: &[ContractRecord]) -> Result<(), SinkError> {
        self.save(records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract_url::ContractUrl;
    use tempfile::tempdir;

    fn record(id: u32, created: Option<&str>, updated: Option<&str>) -> ContractRecord {
        let mut r = ContractRecord::new(
            ContractUrl::new(format!("https://www.uvo.gov.sk/vyhladavanie/detail/{id}")),
            format!("Zákazka {id}"),
            "Mesto",
        );
        r.created_at = created.map(str::to_string);
        r.updated_at = updated.map(str::to_string);
        r
    }

    fn ids(records: &[ContractRecord]) -> Vec<String> {
        records.iter().map(|r| r.title.clone()).collect()
    }

    #[test]
    fn sorts_newest_first_with_fallbacks() {
        let mut records = vec![
            record(1, Some("01.01.2020 10:00"), Some("")),
            record(2, None, None),
            record(3, Some("01.01.2019 10:00"), Some("01.06.2021 09:00")),
            record(4, Some("01.01.2021 10:00"), None),
            record(5, Some(""), Some("")),
        ];
        sort_for_sink(&mut records);
        assert_eq!(
            ids(&records),
            ["Zákazka 3", "Zákazka 4", "Zákazka 1", "Zákazka 2", "Zákazka 5"]
        );
    }

    #[test]
    fn row_has_fixed_shape() {
        let mut r = record(7, Some("01.01.2020 10:00"), None);
        r.cpv_codes = Some("48000000-8 Softvér\n72000000-5 IT\n".to_string());
        r.documents = vec!["A - a.pdf - 01.01.2020".into(), "B - b.pdf - 02.01.2020".into()];

        let row = to_row(&r);

        assert_eq!(row.len(), COLUMNS.len());
        assert_eq!(row[0], "https://www.uvo.gov.sk/vyhladavanie/detail/7");
        assert_eq!(row[3], "01.01.2020 10:00");
        assert_eq!(row[4], "");
        assert_eq!(row[6], "48000000-8 Softvér, 72000000-5 IT");
        assert_eq!(row[9], "A - a.pdf - 01.01.2020, B - b.pdf - 02.01.2020");
        assert_eq!(row[10], "");
    }

    #[tokio::test]
    async fn tsv_sink_writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let sink = TsvFileSink::new(dir.path().join("out.tsv"));
        let mut r = record(1, None, None);
        r.status = Some("Prebieha\tznova".to_string());

        sink.write(&[r, record(2, None, None)]).await.unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("URL\tNázov"));
        assert_eq!(lines[1].split('\t').count(), 11);
        assert!(lines[1].contains("Prebieha znova"));
    }

    #[tokio::test]
    async fn snapshot_save_then_load() {
        let dir = tempdir().unwrap();
        let snapshot = JsonSnapshot::new(dir.path().join("contracts.json"));
        let mut r = record(1, Some("01.01.2020 10:00"), None);
        r.announcements = vec!["VZS - 01.01.2020 - https://www.uvo.gov.sk/x".into()];
        let records = vec![r, record(2, None, None)];

        snapshot.save(&records).await.unwrap();
        let loaded = snapshot.load().await.unwrap();

        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn loading_missing_snapshot_is_io_error() {
        let dir = tempdir().unwrap();
        let err = JsonSnapshot::new(dir.path().join("none.json")).load().await.unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
    }

    #[test]
    fn stage_snapshot_names() {
        let snapshot = JsonSnapshot::new("/tmp/out/contracts.json");
        assert_eq!(
            snapshot.with_suffix("details").path(),
            Path::new("/tmp/out/contracts.details.json")
        );
        assert_eq!(
            JsonSnapshot::new("dump").with_suffix("listing").path(),
            Path::new("dump.listing")
        );
    }
}
