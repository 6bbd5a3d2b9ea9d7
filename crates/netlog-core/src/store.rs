use crate::csv_format;
use crate::{Error, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// The two report categories, each a directory under the store root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Network,
    Vitals,
}

impl ReportCategory {
    pub const ALL: [ReportCategory; 2] = [ReportCategory::Network, ReportCategory::Vitals];

    pub fn dir_name(&self) -> &'static str {
        match self {
            ReportCategory::Network => "network_logs",
            ReportCategory::Vitals => "web_vitals",
        }
    }

    fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.dir_name() == name)
    }
}

/// Listing entry for an exported report
#[derive(Debug, Clone, Serialize)]
pub struct ReportInfo {
    pub filename: String,
    /// Path relative to the store root, e.g. `network_logs/NL_010324_09:30:00AM.csv`
    pub path: String,
    pub size_kb: f64,
    pub modified: String,
    pub rows: usize,
}

/// Manages exported CSV files under `<root>/network_logs` and `<root>/web_vitals`
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn category_dir(&self, category: ReportCategory) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Create both category directories
    pub fn ensure_dirs(&self) -> Result<()> {
        for category in ReportCategory::ALL {
            fs::create_dir_all(self.category_dir(category))?;
        }
        Ok(())
    }

    /// List reports in a category, newest first
    pub fn list(&self, category: ReportCategory) -> Result<Vec<ReportInfo>> {
        let dir = self.category_dir(category);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let pattern = format!("{}/*.csv", glob::Pattern::escape(&dir.to_string_lossy()));
        let paths = glob::glob_with(&pattern, glob::MatchOptions::new())
            .map_err(|e| Error::InvalidPattern(e.to_string()))?;

        let mut reports = Vec::new();
        let mut modified_at = Vec::new();
        for path in paths.filter_map(|p| p.ok()) {
            let Some(filename) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };

            // A dangling link or a file removed mid-listing is skipped
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!("Skipping unreadable report {}: {}", path.display(), e);
                    continue;
                }
            };
            let modified: DateTime<Local> = match metadata.modified() {
                Ok(modified) => modified.into(),
                Err(e) => {
                    tracing::debug!("Skipping report without mtime {}: {}", path.display(), e);
                    continue;
                }
            };
            let rows = match fs::read_to_string(&path) {
                Ok(content) => csv_format::parse(&content).len().saturating_sub(1),
                Err(e) => {
                    tracing::debug!("Could not count rows in {}: {}", path.display(), e);
                    0
                }
            };

            modified_at.push(modified);
            reports.push(ReportInfo {
                path: format!("{}/{}", category.dir_name(), filename),
                filename,
                size_kb: crate::record::round2(metadata.len() as f64 / 1024.0),
                modified: modified.format("%Y-%m-%d %H:%M:%S").to_string(),
                rows,
            });
        }

        let mut indexed: Vec<_> = modified_at.into_iter().zip(reports).collect();
        indexed.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(indexed.into_iter().map(|(_, report)| report).collect())
    }

    /// Validate a relative report path and map it to an existing file
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let (category, filename) = parse_relative(relative)?;
        let full_path = self.category_dir(category).join(filename);
        if !full_path.is_file() {
            return Err(Error::NotFound(relative.to_string()));
        }
        Ok(full_path)
    }

    /// Read a report as header-keyed rows
    pub fn read_rows(&self, relative: &str) -> Result<Vec<BTreeMap<String, String>>> {
        let path = self.resolve(relative)?;
        let content = fs::read_to_string(&path)?;
        let mut rows = csv_format::parse(&content).into_iter();

        let Some(header) = rows.next() else {
            return Ok(Vec::new());
        };

        Ok(rows
            .map(|row| {
                header
                    .iter()
                    .cloned()
                    .zip(row.into_iter().chain(std::iter::repeat(String::new())))
                    .collect()
            })
            .collect())
    }

    pub fn delete(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        fs::remove_file(&path)?;
        tracing::info!("Deleted report {}", path.display());
        Ok(())
    }

    /// Rename a report within its category, returning the new relative path
    pub fn rename(&self, relative: &str, new_filename: &str) -> Result<String> {
        let new_filename = new_filename.trim();
        if new_filename.is_empty() {
            return Err(Error::InvalidFilename("new filename is required".to_string()));
        }
        if new_filename.contains(['/', '\\']) {
            return Err(Error::InvalidFilename(format!(
                "{} - no path characters allowed",
                new_filename
            )));
        }

        let new_filename = if new_filename.ends_with(".csv") {
            new_filename.to_string()
        } else {
            format!("{}.csv", new_filename)
        };
        if new_filename == ".csv" || new_filename == "..csv" {
            return Err(Error::InvalidFilename(new_filename));
        }

        let (category, _) = parse_relative(relative)?;
        let old_path = self.resolve(relative)?;
        let new_path = self.category_dir(category).join(&new_filename);

        if new_path.exists() {
            return Err(Error::AlreadyExists(new_filename));
        }

        fs::rename(&old_path, &new_path)?;
        let new_relative = format!("{}/{}", category.dir_name(), new_filename);
        tracing::info!("Renamed report {} to {}", relative, new_relative);

        Ok(new_relative)
    }
}

/// Split `<category>/<name>.csv`, rejecting anything else
fn parse_relative(relative: &str) -> Result<(ReportCategory, &str)> {
    if !relative.ends_with(".csv") {
        return Err(Error::InvalidFilename(relative.to_string()));
    }

    let components: Vec<_> = Path::new(relative).components().collect();
    let [Component::Normal(dir), Component::Normal(_)] = components.as_slice() else {
        return Err(Error::InvalidPath(relative.to_string()));
    };

    let category = dir
        .to_str()
        .and_then(ReportCategory::from_dir_name)
        .ok_or_else(|| Error::InvalidPath(relative.to_string()))?;

    let filename = relative
        .split_once('/')
        .map(|(_, name)| name)
        .filter(|name| !name.contains(['/', '\\']))
        .ok_or_else(|| Error::InvalidPath(relative.to_string()))?;

    Ok((category, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, ReportStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        store.ensure_dirs().unwrap();
        for (relative, content) in files {
            fs::write(dir.path().join(relative), content).unwrap();
        }
        (dir, store)
    }

    #[test]
    fn test_list_reports() {
        let (_dir, store) = store_with(&[
            ("network_logs/NL_a.csv", "h1,h2\r\n1,2\r\n3,\"multi\nline\"\r\n"),
            ("network_logs/notes.txt", "ignored"),
            ("web_vitals/WV_a.csv", "h\r\n"),
        ]);

        let network = store.list(ReportCategory::Network).unwrap();
        assert_eq!(network.len(), 1);
        assert_eq!(network[0].filename, "NL_a.csv");
        assert_eq!(network[0].path, "network_logs/NL_a.csv");
        assert_eq!(network[0].rows, 2);

        let vitals = store.list(ReportCategory::Vitals).unwrap();
        assert_eq!(vitals[0].rows, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_skips_dangling_links() {
        let (dir, store) = store_with(&[("network_logs/NL_a.csv", "h\r\n1\r\n")]);
        std::os::unix::fs::symlink(
            dir.path().join("network_logs/gone.csv"),
            dir.path().join("network_logs/NL_broken.csv"),
        )
        .unwrap();

        let network = store.list(ReportCategory::Network).unwrap();
        assert_eq!(network.len(), 1);
        assert_eq!(network[0].filename, "NL_a.csv");
        assert_eq!(network[0].rows, 1);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("nowhere"));
        assert!(store.list(ReportCategory::Network).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_rejects_invalid_paths() {
        let (_dir, store) = store_with(&[("network_logs/NL_a.csv", "h\r\n")]);

        assert!(matches!(store.resolve("network_logs/NL_a.txt"), Err(Error::InvalidFilename(_))));
        assert!(matches!(store.resolve("other/NL_a.csv"), Err(Error::InvalidPath(_))));
        assert!(matches!(store.resolve("network_logs/../secret.csv"), Err(Error::InvalidPath(_))));
        assert!(matches!(store.resolve("/etc/network_logs/x.csv"), Err(Error::InvalidPath(_))));
        assert!(matches!(store.resolve("NL_a.csv"), Err(Error::InvalidPath(_))));
        assert!(store.resolve("network_logs/NL_a.csv").is_ok());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let (_dir, store) = store_with(&[("web_vitals/WV_a.csv", "h\r\n")]);

        store.delete("web_vitals/WV_a.csv").unwrap();
        assert!(matches!(store.delete("web_vitals/WV_a.csv"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_rename_within_category() {
        let (dir, store) = store_with(&[("network_logs/NL_a.csv", "h\r\n")]);

        let new_path = store.rename("network_logs/NL_a.csv", "checkout").unwrap();
        assert_eq!(new_path, "network_logs/checkout.csv");
        assert!(dir.path().join("network_logs/checkout.csv").exists());
        assert!(!dir.path().join("network_logs/NL_a.csv").exists());
    }

    #[test]
    fn test_rename_rejects_existing_destination() {
        let (dir, store) = store_with(&[
            ("network_logs/NL_a.csv", "a\r\n"),
            ("network_logs/NL_b.csv", "b\r\n"),
        ]);

        let err = store.rename("network_logs/NL_a.csv", "NL_b.csv").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(dir.path().join("network_logs/NL_b.csv")).unwrap(), "b\r\n");
        assert!(dir.path().join("network_logs/NL_a.csv").exists());
    }

    #[test]
    fn test_rename_rejects_path_characters() {
        let (_dir, store) = store_with(&[("network_logs/NL_a.csv", "a\r\n")]);

        assert!(matches!(
            store.rename("network_logs/NL_a.csv", "../web_vitals/x.csv"),
            Err(Error::InvalidFilename(_))
        ));
        assert!(matches!(
            store.rename("network_logs/missing.csv", "x.csv"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_read_rows() {
        let (_dir, store) = store_with(&[(
            "web_vitals/WV_a.csv",
            "metric_name,value_ms_or_score\r\nLCP,1200.5\r\nCLS\r\n",
        )]);

        let rows = store.read_rows("web_vitals/WV_a.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["metric_name"], "LCP");
        assert_eq!(rows[0]["value_ms_or_score"], "1200.5");
        assert_eq!(rows[1]["value_ms_or_score"], "");
    }
}
