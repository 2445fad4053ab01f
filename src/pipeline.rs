// src/pipeline.rs
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Config;
use crate::extractors::section::{Section, SectionSplitter};
use crate::extractors::table::{SkipReason, TableExtraction, TableExtractor};
use crate::extractors::{clean_text, extract_full_text};
use crate::genai::GenerativeModel;
use crate::report::summarize_tables;
use crate::storage::{DocumentPaths, StorageManager};
use crate::utils::debug::DebugDump;
use crate::utils::AppError;
use crate::validation::{csv_files, NumericValidator, ValidationSummary};

/// What happened to one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SectionOutcome {
    Extracted {
        index: usize,
        table_name: String,
        path: PathBuf,
    },
    Skipped {
        index: usize,
        reason: SkipReason,
    },
}

impl SectionOutcome {
    pub fn is_extracted(&self) -> bool {
        matches!(self, SectionOutcome::Extracted { .. })
    }
}

/// Everything one document's run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub document: PathBuf,
    pub base_name: String,
    pub section_count: usize,
    pub expected_sections: usize,
    /// Empty when existing tables were reused.
    pub sections: Vec<SectionOutcome>,
    pub reused_tables: bool,
    /// Recomputed every run; left out of the persisted metadata.
    #[serde(skip)]
    pub validation: ValidationSummary,
    pub report_path: Option<PathBuf>,
    pub summary_tokens: Option<u32>,
}

impl RunReport {
    pub fn extracted_count(&self) -> usize {
        self.sections.iter().filter(|s| s.is_extracted()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.sections.len() - self.extracted_count()
    }
}

/// Runs every stage for one document at a time.
pub struct Pipeline<'a, M: GenerativeModel> {
    config: &'a Config,
    model: &'a M,
    storage: &'a StorageManager,
    splitter: SectionSplitter,
    validator: NumericValidator,
}

impl<'a, M: GenerativeModel> Pipeline<'a, M> {
    pub fn new(config: &'a Config, model: &'a M, storage: &'a StorageManager) -> Self {
        Self {
            config,
            model,
            storage,
            splitter: SectionSplitter::default(),
            validator: NumericValidator::new(config.number_format).with_cell_trace(config.debug),
        }
    }

    /// extraction → cleaning → splitting → table extraction → validation →
    /// summary → rendering.
    pub async fn process_document(&self, document: &Path) -> Result<RunReport, AppError> {
        let paths = self.storage.prepare_document(document)?;
        let debug = if self.config.debug {
            DebugDump::enabled(paths.debug_dir())?
        } else {
            DebugDump::disabled()
        };

        tracing::info!("Step 1: Extracting text from {}", document.display());
        let raw_text = extract_full_text(document)?;
        debug.save("raw_text.txt", &raw_text);

        self.process_text(document, &raw_text, &paths, &debug).await
    }

    /// Every stage after text extraction.
    pub async fn process_text(
        &self,
        document: &Path,
        raw_text: &str,
        paths: &DocumentPaths,
        debug: &DebugDump,
    ) -> Result<RunReport, AppError> {
        tracing::info!("Step 2: Cleaning extracted text...");
        let cleaned = clean_text(raw_text);
        debug.save("cleaned_text.txt", &cleaned);

        tracing::info!("Step 3: Splitting into sections...");
        let sections = self.splitter.split(&cleaned);
        tracing::info!("Split into {} sections.", sections.len());
        if debug.is_enabled() {
            for section in &sections {
                debug.save_numbered("section", section.index, &section.text);
            }
        }

        let existing_tables = csv_files(&paths.data_dir)?;
        let reused_tables = self.config.reuse_tables && !existing_tables.is_empty();
        let outcomes = if reused_tables {
            tracing::info!(
                "Step 4: Reusing {} existing tables in {}",
                existing_tables.len(),
                paths.data_dir.display()
            );
            Vec::new()
        } else {
            tracing::info!("Step 4: Processing tables with the model and saving CSVs...");
            self.extract_tables(&sections, paths, debug).await?
        };

        tracing::info!("Step 5: Validating numeric columns...");
        let validation = self.validator.validate_directory(&paths.data_dir)?;

        tracing::info!("Step 6: Generating financial summary report...");
        let summary = summarize_tables(
            self.model,
            &self.config.model,
            &paths.data_dir,
            &paths.report_path(),
            self.config.debug,
        )
        .await?;
        if let Some(summary) = &summary {
            debug.save("summary.md", &summary.markdown);
        }

        let report = RunReport {
            document: document.to_path_buf(),
            base_name: paths.base_name.clone(),
            section_count: sections.len(),
            expected_sections: self.splitter.expected_sections(),
            sections: outcomes,
            reused_tables,
            validation,
            report_path: summary.as_ref().map(|s| s.path.clone()),
            summary_tokens: summary.as_ref().and_then(|s| s.total_tokens),
        };

        if let Err(e) = self.storage.save_run_metadata(paths, &report) {
            tracing::error!("Failed to save run metadata: {}", e);
        }

        Ok(report)
    }

    /// Sends each section to the model in order. Unusable responses are
    /// recorded and skipped; transport failures end the document.
    async fn extract_tables(
        &self,
        sections: &[Section],
        paths: &DocumentPaths,
        debug: &DebugDump,
    ) -> Result<Vec<SectionOutcome>, AppError> {
        let extractor = TableExtractor::new(self.model, self.config.model.clone());
        let mut outcomes = Vec::with_capacity(sections.len());

        for section in sections {
            let outcome = match extractor.extract(section).await? {
                TableExtraction::Extracted(record) => {
                    let path = self.storage.save_table(paths, &record)?;
                    SectionOutcome::Extracted {
                        index: section.index,
                        table_name: record.table_name,
                        path,
                    }
                }
                TableExtraction::Skipped { reason, raw_response } => {
                    if !raw_response.is_empty() {
                        debug.save_numbered("response", section.index, &raw_response);
                    }
                    SectionOutcome::Skipped { index: section.index, reason }
                }
            };
            outcomes.push(outcome);
        }

        let extracted = outcomes.iter().filter(|o| o.is_extracted()).count();
        tracing::info!(
            "{} of {} tables processed and saved as CSVs.",
            extracted,
            outcomes.len()
        );
        Ok(outcomes)
    }
}

/// Lists the `.pdf` files of the input directory in name order.
pub fn discover_documents(input_dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !input_dir.is_dir() {
        return Err(AppError::Config(format!(
            "Input directory {} does not exist",
            input_dir.display()
        )));
    }

    let mut documents: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    documents.sort();
    Ok(documents)
}
