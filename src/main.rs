// src/main.rs
mod config;
mod extractors;
mod genai;
mod pipeline;
mod report;
mod storage;
mod utils;
mod validation;

use std::path::PathBuf;

use clap::Parser;
use config::{Config, RunSettings};
use genai::GeminiClient;
use pipeline::{discover_documents, Pipeline};
use storage::StorageManager;
use utils::AppError;
use validation::NumberFormat;

/// Extracts the tables of financial-statement PDFs, validates their figures
/// and writes a narrative summary report per document.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the statement PDFs
    #[arg(long, default_value = "./pdf_inputs")]
    input_dir: PathBuf,

    /// Directory for extracted CSV tables (one sub-directory per document)
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Directory for summary reports (one sub-directory per document)
    #[arg(long, default_value = "./reports")]
    report_dir: PathBuf,

    /// Generative model used for table extraction and summaries
    #[arg(short, long, default_value = genai::client::DEFAULT_MODEL)]
    model: String,

    /// Debug mode - never overwrite reports, save intermediate text and
    /// unparseable model responses
    #[arg(short, long)]
    debug: bool,

    /// Skip table extraction for documents that already have CSV tables
    #[arg(long)]
    reuse_tables: bool,

    /// Accept thousands separators, currency symbols and (negatives) when
    /// validating numbers
    #[arg(long)]
    lenient_numbers: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn settings(&self) -> RunSettings {
        RunSettings {
            model: self.model.clone(),
            input_dir: self.input_dir.clone(),
            data_dir: self.data_dir.clone(),
            report_dir: self.report_dir.clone(),
            debug: self.debug,
            reuse_tables: self.reuse_tables,
            number_format: if self.lenient_numbers {
                NumberFormat::Lenient
            } else {
                NumberFormat::Strict
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments
    let args = Args::parse();

    // 2. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging(args.verbose);
    tracing::info!("Starting processing for args: {:?}", args);

    // 3. Resolve configuration; a missing API key stops here
    let config = Config::from_env(args.settings())?;

    // 4. Initialize storage and the model client for this run
    let storage = StorageManager::new(&config.data_dir, &config.report_dir)?;
    let client = GeminiClient::new(&config)?;
    let pipeline = Pipeline::new(&config, &client, &storage);

    // 5. Find input documents
    let documents = discover_documents(&config.input_dir)?;
    tracing::info!("Found {} documents in {}", documents.len(), config.input_dir.display());

    if documents.is_empty() {
        return Err(AppError::Config(format!(
            "No PDF files found in {}",
            config.input_dir.display()
        )));
    }

    // 6. Process each document
    let mut success_count = 0;
    let mut failure_count = 0;

    for document in &documents {
        tracing::info!("Processing {}", document.display());

        match pipeline.process_document(document).await {
            Ok(report) => {
                success_count += 1;
                tracing::info!(
                    "Finished {}: {} sections, {} tables saved, {} skipped, {} valid / {} non-valid numbers",
                    report.base_name,
                    report.section_count,
                    report.extracted_count(),
                    report.skipped_count(),
                    report.validation.totals.valid,
                    report.validation.totals.invalid
                );
                for skipped in &report.validation.skipped {
                    tracing::warn!("Table {} was not validated: {}", skipped.file.display(), skipped.reason);
                }
                match &report.report_path {
                    Some(path) => tracing::info!("Financial summary saved to {}", path.display()),
                    None => tracing::warn!("No summary written for {}", report.base_name),
                }
            }
            Err(e) => {
                failure_count += 1;
                tracing::error!("Failed to process {}: {}", document.display(), e);
            }
        }
    }

    tracing::info!("Processing finished. Success: {}, Failures: {}", success_count, failure_count);

    if success_count == 0 && failure_count > 0 {
        return Err(AppError::Processing(format!(
            "Failed to process any of {} documents",
            failure_count
        )));
    }

    Ok(())
}
