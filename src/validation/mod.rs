// src/validation/mod.rs
//! Numeric sanity checks over the persisted statement tables.
//!
//! Only the year columns are checked: a column is expected to hold numbers
//! when its header text contains one of [`NUMERIC_HEADER_MARKERS`]. Rows whose
//! year columns are all blank are sub-table headings ("Current assets",
//! "Equity") and are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::Serialize;

use crate::utils::error::ValidationError;

/// Header fragments marking a column as numeric.
pub const NUMERIC_HEADER_MARKERS: [&str; 2] = ["Last Year", "Previous Year"];

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// How a cell's text is turned into a number.
///
/// `Strict` parses the trimmed cell as-is, so `"1,234"` and `"$5"` are
/// invalid. `Lenient` first removes thousands separators, currency symbols
/// and inner whitespace, and reads accounting negatives `(123)` as `-123`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberFormat {
    #[default]
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ValidationCounts {
    pub valid: usize,
    pub invalid: usize,
}

impl ValidationCounts {
    fn add(&mut self, other: ValidationCounts) {
        self.valid += other.valid;
        self.invalid += other.invalid;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidCell {
    /// 1-based, the header being row 1.
    pub row: usize,
    /// 0-based column position.
    pub column: usize,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TableValidation {
    pub numeric_columns: Vec<usize>,
    pub counts: ValidationCounts,
    pub divider_rows: Vec<usize>,
    pub invalid_cells: Vec<InvalidCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileValidation {
    pub file: PathBuf,
    pub header: Vec<String>,
    pub result: TableValidation,
}

/// A table that could not be read at all, e.g. not UTF-8 or ragged quoting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub file: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ValidationSummary {
    pub files: Vec<FileValidation>,
    pub skipped: Vec<SkippedFile>,
    pub totals: ValidationCounts,
}

/// Positions (never column 0, the label column) whose header names a year.
pub fn numeric_columns<S: AsRef<str>>(header: &[S]) -> Vec<usize> {
    header
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, name)| {
            NUMERIC_HEADER_MARKERS
                .iter()
                .any(|marker| name.as_ref().contains(marker))
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// True if every numeric column of the row is blank or missing: the row only
/// names a sub-table and carries no figures.
pub fn is_divider_row<S: AsRef<str>>(row: &[S], numeric_columns: &[usize]) -> bool {
    numeric_columns.iter().all(|&col| {
        row.get(col)
            .map_or(true, |cell| cell.as_ref().trim().is_empty())
    })
}

/// Parses a trimmed, non-empty cell according to `format`.
pub fn parse_number(value: &str, format: NumberFormat) -> Option<f64> {
    let value = value.trim();
    match format {
        NumberFormat::Strict => value.parse::<f64>().ok(),
        NumberFormat::Lenient => {
            let (negative, body) = match value.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
                Some(inner) => (true, inner),
                None => (false, value),
            };
            let cleaned: String = body
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
                .collect();
            let number = cleaned.parse::<f64>().ok()?;
            Some(if negative { -number } else { number })
        }
    }
}

/// Checks the year columns of persisted tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericValidator {
    format: NumberFormat,
    trace_cells: bool,
}

impl NumericValidator {
    pub fn new(format: NumberFormat) -> Self {
        Self { format, trace_cells: false }
    }

    /// Log every checked cell at debug level.
    pub fn with_cell_trace(mut self, trace_cells: bool) -> Self {
        self.trace_cells = trace_cells;
        self
    }

    /// Validates data rows against a header. Pure; no I/O.
    pub fn validate_rows<H, R, S>(&self, header: &[H], rows: R) -> TableValidation
    where
        H: AsRef<str>,
        R: IntoIterator,
        R::Item: AsRef<[S]>,
        S: AsRef<str>,
    {
        let numeric_columns = numeric_columns(header);
        let mut result = TableValidation {
            numeric_columns: numeric_columns.clone(),
            ..TableValidation::default()
        };

        // Row 1 is the header.
        for (row_number, row) in rows.into_iter().enumerate().map(|(i, r)| (i + 2, r)) {
            let row = row.as_ref();

            if is_divider_row(row, &numeric_columns) {
                tracing::trace!("Skipping row {} because it appears to be a subtable header.", row_number);
                result.divider_rows.push(row_number);
                continue;
            }

            for &col in &numeric_columns {
                let Some(cell) = row.get(col) else { continue };
                let value = cell.as_ref().trim();
                if value.is_empty() {
                    continue;
                }

                if parse_number(value, self.format).is_some() {
                    result.counts.valid += 1;
                    if self.trace_cells {
                        tracing::debug!("Row {}, Col {}: '{}' is a valid number.", row_number, col, value);
                    }
                } else {
                    result.counts.invalid += 1;
                    if self.trace_cells {
                        tracing::debug!("Row {}, Col {}: '{}' is not a valid number.", row_number, col, value);
                    }
                    result.invalid_cells.push(InvalidCell {
                        row: row_number,
                        column: col,
                        value: value.to_string(),
                    });
                }
            }
        }

        result
    }

    /// Validates one CSV file. An empty file validates to zero counts.
    pub fn validate_file(&self, path: &Path) -> Result<FileValidation, ValidationError> {
        let csv_err = |source: csv::Error| ValidationError::Csv { file: path.display().to_string(), source };

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(csv_err)?;

        let mut records = reader.records();
        let header: Vec<String> = match records.next() {
            Some(record) => record.map_err(csv_err)?.iter().map(str::to_string).collect(),
            None => {
                tracing::warn!("{} is empty; nothing to validate", path.display());
                return Ok(FileValidation {
                    file: path.to_path_buf(),
                    header: Vec::new(),
                    result: TableValidation::default(),
                });
            }
        };
        tracing::debug!("Header row is: {:?}", header);

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(csv_err)?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let result = self.validate_rows(header.as_slice(), &rows);
        if result.numeric_columns.is_empty() {
            tracing::warn!(
                "{} has no columns headed {:?}; no cells checked",
                path.display(),
                NUMERIC_HEADER_MARKERS
            );
        }

        Ok(FileValidation { file: path.to_path_buf(), header, result })
    }

    /// Validates every `.csv` file of `directory`, in file-name order.
    /// Unreadable files are recorded in `skipped`; only a directory that
    /// cannot be listed is an error.
    pub fn validate_directory(&self, directory: &Path) -> Result<ValidationSummary, ValidationError> {
        let mut summary = ValidationSummary::default();

        for path in csv_files(directory)? {
            tracing::info!("Validating {}", path.display());
            let file = match self.validate_file(&path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    summary.skipped.push(SkippedFile { file: path, reason: e.to_string() });
                    continue;
                }
            };
            tracing::info!(
                "{}: {} valid, {} non-valid",
                path.display(),
                file.result.counts.valid,
                file.result.counts.invalid
            );
            summary.totals.add(file.result.counts);
            summary.files.push(file);
        }

        tracing::info!(
            "Validation totals: {} valid, {} non-valid, {} files skipped",
            summary.totals.valid,
            summary.totals.invalid,
            summary.skipped.len()
        );
        Ok(summary)
    }
}

/// Lists `.csv` files of a directory, sorted by path.
pub fn csv_files(directory: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    Ok(files)
}
