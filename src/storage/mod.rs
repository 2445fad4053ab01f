// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::extractors::table::TableRecord;
use crate::utils::error::StorageError;

/// Suffix of the rendered summary file: `<base>_summary_report.pdf`.
pub const REPORT_SUFFIX: &str = "_summary_report.pdf";

/// Where one input document's artifacts live.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPaths {
    pub base_name: String,
    pub data_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl DocumentPaths {
    pub fn report_path(&self) -> PathBuf {
        self.report_dir.join(format!("{}{}", self.base_name, REPORT_SUFFIX))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.report_dir.join(format!("{}_run.json", self.base_name))
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.report_dir.join("debug")
    }
}

/// Clean directory name for a document: file stem, spaces to underscores,
/// lowercased. `"FWC Sample 1.pdf"` becomes `"fwc_sample_1"`.
pub fn base_name(document: &Path) -> String {
    document
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace(' ', "_").to_lowercase())
        .unwrap_or_else(|| "document".to_string())
}

pub struct StorageManager {
    data_root: PathBuf,
    report_root: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager, creating both root directories if needed.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(data_root: P, report_root: Q) -> Result<Self, StorageError> {
        let data_root = data_root.as_ref().to_path_buf();
        let report_root = report_root.as_ref().to_path_buf();

        fs::create_dir_all(&data_root)?;
        fs::create_dir_all(&report_root)?;

        Ok(Self { data_root, report_root })
    }

    /// Creates `data/<base>/` and `reports/<base>/` for a document.
    pub fn prepare_document(&self, document: &Path) -> Result<DocumentPaths, StorageError> {
        let base_name = base_name(document);
        let data_dir = self.data_root.join(&base_name);
        let report_dir = self.report_root.join(&base_name);

        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&report_dir)?;
        tracing::debug!(
            "Prepared directories for {}: {} / {}",
            base_name,
            data_dir.display(),
            report_dir.display()
        );

        Ok(DocumentPaths { base_name, data_dir, report_dir })
    }

    /// Writes a table's CSV text to `<data_dir>/<normalized name>.csv`.
    pub fn save_table(&self, paths: &DocumentPaths, record: &TableRecord) -> Result<PathBuf, StorageError> {
        let file_path = paths.data_dir.join(record.file_name());
        if file_path.exists() {
            tracing::warn!("Overwriting existing table {}", file_path.display());
        }

        fs::write(&file_path, &record.csv_data)?;
        tracing::info!("Saved: {}", file_path.display());

        Ok(file_path)
    }

    /// Saves run metadata in JSON format, stamped with the current time.
    pub fn save_run_metadata<T: Serialize>(&self, paths: &DocumentPaths, run: &T) -> Result<PathBuf, StorageError> {
        let file_path = paths.metadata_path();

        let metadata = serde_json::json!({
            "base_name": paths.base_name,
            "data_dir": paths.data_dir,
            "run": run,
            "generated_at": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        fs::write(&file_path, metadata_str)?;
        tracing::info!("Saved run metadata to {}", file_path.display());

        Ok(file_path)
    }
}
