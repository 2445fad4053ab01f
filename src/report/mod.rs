// src/report/mod.rs
pub mod render;

use std::fs;
use std::path::Path;

use crate::genai::{Generation, GenerationRequest, GenerativeModel};
use crate::utils::error::GenAiError;
use crate::utils::AppError;
use crate::validation::csv_files;

pub use render::save_markdown_to_pdf;

/// Instruction for the narrative summary.
pub const SUMMARY_INSTRUCTION: &str = "Generate a summary report in markdown that highlights the financial health of the company, given the following tables. The report should include:\
Key financial metrics (revenue, net income, etc.). You can display this in markdown tables, with an extra column for notes.\
Any notable trends or observations\
A short narrative summary in natural language at the end.";

/// Python-style title case: the first letter after any non-letter is
/// uppercased, every other letter lowercased. `income_statement` becomes
/// `Income_Statement`.
pub fn title_case(text: &str) -> String {
    let mut titled = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                titled.extend(ch.to_lowercase());
            } else {
                titled.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            titled.push(ch);
            previous_is_letter = false;
        }
    }
    titled
}

/// Reads every CSV of `directory` into one prompt body, each table introduced
/// by a `### <Title> ###` line. Bytes that are not UTF-8 are replaced, not
/// rejected.
pub fn read_csv_tables(directory: &Path) -> Result<String, std::io::Error> {
    let mut all_csv_text = String::new();

    for path in csv_files(directory)? {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = fs::read(&path)?;
        let content = String::from_utf8_lossy(&bytes);
        if let std::borrow::Cow::Owned(_) = content {
            tracing::warn!("{} is not valid UTF-8; invalid bytes replaced", path.display());
        }

        all_csv_text.push_str(&format!("\n### {} ###\n", title_case(&stem)));
        all_csv_text.push_str(&content);
        all_csv_text.push('\n');
    }

    Ok(all_csv_text)
}

/// Asks the model for a markdown summary of the collected tables.
pub async fn generate_summary<M: GenerativeModel>(
    model: &M,
    model_name: &str,
    tables: &str,
) -> Result<Generation, GenAiError> {
    let request = GenerationRequest {
        model: model_name.to_string(),
        system_instruction: SUMMARY_INSTRUCTION.to_string(),
        contents: tables.to_string(),
    };

    let generation = model.generate(&request).await?;
    match generation.total_tokens {
        Some(tokens) => tracing::info!("Used {} tokens in total to generate summary report.", tokens),
        None => tracing::info!("Summary report generated (token usage not reported)."),
    }

    Ok(generation)
}

/// Summary produced for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    pub markdown: String,
    pub total_tokens: Option<u32>,
    pub path: std::path::PathBuf,
}

/// Reads the tables, asks for a summary and renders it to `output_path`.
/// Returns `None` when the directory holds no tables.
pub async fn summarize_tables<M: GenerativeModel>(
    model: &M,
    model_name: &str,
    data_dir: &Path,
    output_path: &Path,
    debug: bool,
) -> Result<Option<SummaryReport>, AppError> {
    let tables = read_csv_tables(data_dir)?;
    if tables.trim().is_empty() {
        tracing::warn!("No tables in {}; skipping summary", data_dir.display());
        return Ok(None);
    }

    let generation = generate_summary(model, model_name, &tables).await?;
    let path = save_markdown_to_pdf(&generation.text, output_path, debug)?;

    Ok(Some(SummaryReport {
        markdown: generation.text,
        total_tokens: generation.total_tokens,
        path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::client::testing::ScriptedModel;

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("income_statement"), "Income_Statement");
        assert_eq!(title_case("statement of CASH flows"), "Statement Of Cash Flows");
        assert_eq!(title_case("table2b"), "Table2B");
    }

    #[test]
    fn non_utf8_table_is_read_lossily() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("cafe.csv"), b"Item,Last Year\nCaf\xe9,12\n").unwrap();

        let text = read_csv_tables(tmp.path()).unwrap();
        assert_eq!(text, "\n### Cafe ###\nItem,Last Year\nCaf\u{FFFD},12\n\n");
    }

    #[test]
    fn reads_tables_with_titles_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("income_statement.csv"), "Item,Last Year\nRevenue,100").unwrap();
        fs::write(tmp.path().join("balance_sheet.csv"), "Item,Last Year\nCash,10").unwrap();
        fs::write(tmp.path().join("readme.md"), "ignored").unwrap();

        let text = read_csv_tables(tmp.path()).unwrap();

        assert_eq!(
            text,
            "\n### Balance_Sheet ###\nItem,Last Year\nCash,10\n\n### Income_Statement ###\nItem,Last Year\nRevenue,100\n"
        );
    }

    #[tokio::test]
    async fn summary_request_carries_instruction_and_tables() {
        let model = ScriptedModel::new(["# Report\nAll good."]);

        let generation = generate_summary(&model, "gemini-2.0-flash", "### T ###\na,b").await.unwrap();

        assert_eq!(generation.text, "# Report\nAll good.");
        let requests = model.requests.borrow();
        assert_eq!(requests[0].system_instruction, SUMMARY_INSTRUCTION);
        assert_eq!(requests[0].contents, "### T ###\na,b");
    }

    #[tokio::test]
    async fn empty_data_dir_skips_summary_without_calling_model() {
        let tmp = tempfile::tempdir().unwrap();
        let model = ScriptedModel::default();

        let report = summarize_tables(&model, "m", tmp.path(), &tmp.path().join("r.pdf"), false)
            .await
            .unwrap();

        assert!(report.is_none());
        assert!(model.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn summarize_renders_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("income_statement.csv"), "Item,Last Year\nRevenue,100").unwrap();
        let model = ScriptedModel::new(["## Key metrics\n| Metric | Value | Notes |\n|---|---|---|\n| Revenue | 100 | steady |"]);
        let output = tmp.path().join("summary_report.pdf");

        let report = summarize_tables(&model, "m", tmp.path(), &output, false)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.path, output);
        assert!(output.is_file());
        assert_eq!(report.total_tokens, Some(42));
    }
}
