use crate::csv_format::{decimal, write_row};
use crate::record::{NetworkRecord, WebVitalRecord, round2};
use crate::{Error, Result};
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

pub const NETWORK_COLUMNS: [&str; 11] = [
    "timestamp",
    "method",
    "url",
    "resource_type",
    "status",
    "status_text",
    "duration_ms",
    "size_kb",
    "graphql_query_id",
    "graphql_endpoint",
    "post_data",
];

pub const VITALS_COLUMNS: [&str; 6] = [
    "timestamp",
    "url",
    "metric_name",
    "value_ms_or_score",
    "rating",
    "unit",
];

const NETWORK_TAG: &str = "NL";
const VITALS_TAG: &str = "WV";

/// Naming options for an export
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Prepended as `<prefix>_` to the generated name
    pub prefix: Option<String>,
    /// Explicit file name, overrides the generated one
    pub filename: Option<String>,
}

impl ExportOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            filename: None,
        }
    }

    pub fn with_filename(filename: impl Into<String>) -> Self {
        Self {
            prefix: None,
            filename: Some(filename.into()),
        }
    }
}

/// Render network records as CSV text
pub fn network_csv(records: &[NetworkRecord]) -> String {
    let mut out = String::new();
    write_row(&mut out, &NETWORK_COLUMNS);

    for record in records {
        let fields = [
            record.timestamp.clone(),
            record.method.clone(),
            record.url.clone(),
            record.resource_type.as_str().to_string(),
            record.status.map(|s| s.to_string()).unwrap_or_default(),
            record.status_text.clone().unwrap_or_default(),
            decimal(round2(record.duration * 1000.0)),
            decimal(round2(record.size as f64 / 1024.0)),
            record.graphql_query_id.clone(),
            record.graphql_operation.clone(),
            record.post_data.clone(),
        ];
        write_row(&mut out, &fields);
    }

    out
}

/// Render Web Vitals records as CSV text
pub fn vitals_csv(records: &[WebVitalRecord]) -> String {
    let mut out = String::new();
    write_row(&mut out, &VITALS_COLUMNS);

    for record in records {
        let fields = [
            record.timestamp.clone(),
            record.url.clone(),
            record.metric_name.clone(),
            decimal(record.value),
            record.rating.as_str().to_string(),
            record.unit().to_string(),
        ];
        write_row(&mut out, &fields);
    }

    out
}

/// Generated file name: `[<prefix>_]<TAG>_DDMMYY_HH:MM:SSAM.csv`
pub fn generated_filename(tag: &str, prefix: Option<&str>) -> String {
    let timestamp = Local::now().format("%d%m%y_%I:%M:%S%p");
    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}_{}_{}.csv", prefix, tag, timestamp),
        None => format!("{}_{}.csv", tag, timestamp),
    }
}

/// Writes CSV exports into a directory
pub struct Exporter {
    dir: PathBuf,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Export network records, returning the written path
    pub fn export_network(&self, records: &[NetworkRecord], options: &ExportOptions) -> Result<PathBuf> {
        if records.is_empty() {
            return Err(Error::NothingToExport("requests"));
        }

        let filename = self.filename(NETWORK_TAG, options);
        let path = self.write(&filename, &network_csv(records))?;

        tracing::info!("Exported {} requests to {}", records.len(), path.display());
        Ok(path)
    }

    /// Export Web Vitals records, returning the written path
    pub fn export_vitals(&self, records: &[WebVitalRecord], options: &ExportOptions) -> Result<PathBuf> {
        if records.is_empty() {
            return Err(Error::NothingToExport("web vitals"));
        }

        let filename = self.filename(VITALS_TAG, options);
        let path = self.write(&filename, &vitals_csv(records))?;

        tracing::info!("Exported {} web vitals to {}", records.len(), path.display());
        Ok(path)
    }

    fn filename(&self, tag: &str, options: &ExportOptions) -> String {
        let name = match options.filename.as_deref().filter(|f| !f.is_empty()) {
            Some(explicit) => explicit.to_string(),
            None => generated_filename(tag, options.prefix.as_deref()),
        };

        if name.ends_with(".csv") {
            name
        } else {
            format!("{}.csv", name)
        }
    }

    /// Write through a temp file so a failed export leaves nothing behind
    fn write(&self, filename: &str, content: &str) -> Result<PathBuf> {
        if filename.contains(['/', '\\']) {
            return Err(Error::InvalidFilename(filename.to_string()));
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        tracing::debug!("Writing CSV export to: {}", path.display());

        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        Ok(path)
    }
}
