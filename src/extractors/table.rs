// src/extractors/table.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extractors::section::Section;
use crate::genai::{GenerationRequest, GenerativeModel};
use crate::utils::error::GenAiError;

/// Instruction sent with every section.
pub const TABLE_EXTRACTION_INSTRUCTION: &str = "Extract financial information from the following text and return it in a JSON FORMAT with two primary keys:\n \
1. `table_name`: (The name of the financial table (e.g 'Income Statement')).\n \
2. `csv_data`:The extracted financial data in valid CSV format. .\n \
Ignore notes if they exist and replace any '-' sections with a 0. \
DO NOT ADD OR REMOVE NEGATIVE SIGNS THAT DO NOT EXIST.";

// --- Regex Patterns (Lazy Static) ---
static CODE_FENCE_OPEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*").expect("Failed to compile CODE_FENCE_OPEN_RE"));

static CODE_FENCE_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*```\s*$").expect("Failed to compile CODE_FENCE_CLOSE_RE"));

/// From the first `{` to the last `}`, across lines.
static JSON_OBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("Failed to compile JSON_OBJECT_RE"));

/// A table the model pulled out of one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRecord {
    pub table_name: String,
    pub csv_data: String,
}

impl TableRecord {
    /// File name for the persisted CSV: spaces become underscores, the name
    /// is lowercased, and path separators are neutralised.
    pub fn file_name(&self) -> String {
        format!("{}.csv", normalize_table_name(&self.table_name))
    }
}

/// Why a section produced no table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// No `{ ... }` anywhere in the response.
    NoJsonObject,
    /// An object-shaped span was found but is not valid JSON.
    MalformedJson(String),
    /// Valid JSON, but `csv_data` was missing or blank.
    EmptyTable,
    /// The model returned no text at all; carries the finish reason.
    EmptyResponse(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoJsonObject => write!(f, "no JSON object found in response"),
            SkipReason::MalformedJson(e) => write!(f, "failed to parse JSON: {}", e),
            SkipReason::EmptyTable => write!(f, "response carried no CSV data"),
            SkipReason::EmptyResponse(reason) => {
                write!(f, "model returned no text (finish reason: {})", reason)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTableResponse {
    #[serde(default)]
    table_name: Option<String>,
    #[serde(default)]
    csv_data: Option<String>,
}

/// Lowercases and replaces spaces (and path separators) with underscores.
pub fn normalize_table_name(name: &str) -> String {
    name.trim()
        .replace([' ', '/', '\\'], "_")
        .to_lowercase()
}

/// Removes markdown code-fence wrapping from a model response.
pub fn strip_code_fences(text: &str) -> String {
    let closed = CODE_FENCE_CLOSE_RE.replace(text, "");
    CODE_FENCE_OPEN_RE.replace_all(&closed, "").trim().to_string()
}

/// Returns the object-shaped span of a response, fences removed.
pub fn find_json_object(text: &str) -> Option<String> {
    let stripped = strip_code_fences(text);
    JSON_OBJECT_RE
        .find(&stripped)
        .map(|m| m.as_str().to_string())
}

/// Parses a model response into a table. `position` is the 1-based section
/// number, used for the fallback name `financial_table_<n>`.
pub fn parse_table_response(text: &str, position: usize) -> Result<TableRecord, SkipReason> {
    let json = find_json_object(text).ok_or(SkipReason::NoJsonObject)?;
    let raw: RawTableResponse =
        serde_json::from_str(&json).map_err(|e| SkipReason::MalformedJson(e.to_string()))?;

    let csv_data = raw
        .csv_data
        .filter(|csv| !csv.trim().is_empty())
        .ok_or(SkipReason::EmptyTable)?;
    let table_name = raw
        .table_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| format!("financial_table_{}", position));

    Ok(TableRecord { table_name, csv_data })
}

/// Result of sending one section to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum TableExtraction {
    Extracted(TableRecord),
    Skipped { reason: SkipReason, raw_response: String },
}

/// Turns sections into tables through a remote model.
pub struct TableExtractor<'a, M: GenerativeModel> {
    model: &'a M,
    model_name: String,
}

impl<'a, M: GenerativeModel> TableExtractor<'a, M> {
    pub fn new(model: &'a M, model_name: impl Into<String>) -> Self {
        Self { model, model_name: model_name.into() }
    }

    /// Sends one section to the model.
    ///
    /// A response that cannot be turned into a table, including an empty or
    /// blocked one, is a `Skipped` value; only transport failures come back
    /// as `Err`.
    pub async fn extract(&self, section: &Section) -> Result<TableExtraction, GenAiError> {
        let request = GenerationRequest {
            model: self.model_name.clone(),
            system_instruction: TABLE_EXTRACTION_INSTRUCTION.to_string(),
            contents: section.text.clone(),
        };

        let generation = match self.model.generate(&request).await {
            Ok(generation) => generation,
            Err(GenAiError::EmptyResponse(finish_reason)) => {
                let reason = SkipReason::EmptyResponse(finish_reason);
                tracing::warn!("Skipping table {}: {}", section.index, reason);
                return Ok(TableExtraction::Skipped { reason, raw_response: String::new() });
            }
            Err(e) => return Err(e),
        };
        if let Some(tokens) = generation.total_tokens {
            tracing::debug!("Section {} used {} tokens", section.index, tokens);
        }

        match parse_table_response(&generation.text, section.index) {
            Ok(record) => {
                tracing::info!("Section {} -> table '{}'", section.index, record.table_name);
                Ok(TableExtraction::Extracted(record))
            }
            Err(reason) => {
                tracing::warn!("Skipping table {}: {}", section.index, reason);
                Ok(TableExtraction::Skipped { reason, raw_response: generation.text })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::client::testing::ScriptedModel;

    fn section(index: usize, text: &str) -> Section {
        Section { index, text: text.to_string() }
    }

    #[test]
    fn normalizes_table_names() {
        assert_eq!(normalize_table_name("Income Statement"), "income_statement");
        assert_eq!(normalize_table_name(" Statement of Cash Flows "), "statement_of_cash_flows");
        assert_eq!(normalize_table_name("Assets/Liabilities"), "assets_liabilities");
    }

    #[test]
    fn strips_json_code_fences() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(text), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```\n"), "{}");
    }

    #[test]
    fn finds_object_amid_prose() {
        let text = "Here you go:\n{\"table_name\": \"X\",\n \"csv_data\": \"a,b\"}\nHope this helps!";
        assert_eq!(
            find_json_object(text).as_deref(),
            Some("{\"table_name\": \"X\",\n \"csv_data\": \"a,b\"}")
        );
        assert!(find_json_object("no object here").is_none());
    }

    #[test]
    fn parses_fenced_response() {
        let text = "```json\n{\"table_name\": \"Income Statement\", \"csv_data\": \"Item,Last Year,Previous Year\\nRevenue,100,90\"}\n```";
        let record = parse_table_response(text, 1).unwrap();
        assert_eq!(record.table_name, "Income Statement");
        assert_eq!(record.csv_data, "Item,Last Year,Previous Year\nRevenue,100,90");
        assert_eq!(record.file_name(), "income_statement.csv");
    }

    #[test]
    fn missing_name_falls_back_to_position() {
        let record = parse_table_response(r#"{"csv_data": "a,b\n1,2"}"#, 3).unwrap();
        assert_eq!(record.table_name, "financial_table_3");
    }

    #[test]
    fn classifies_unusable_responses() {
        assert_eq!(parse_table_response("Sorry, I can't.", 1), Err(SkipReason::NoJsonObject));
        assert!(matches!(
            parse_table_response("{table_name: oops}", 1),
            Err(SkipReason::MalformedJson(_))
        ));
        assert_eq!(
            parse_table_response(r#"{"table_name": "Empty", "csv_data": "  "}"#, 1),
            Err(SkipReason::EmptyTable)
        );
    }

    #[test]
    fn extractor_sends_instruction_and_section_text() {
        let model = ScriptedModel::new([r#"{"table_name": "Balance Sheet", "csv_data": "Item,Last Year\nCash,10"}"#]);
        let extractor = TableExtractor::new(&model, "gemini-2.0-flash");

        let outcome = tokio_test::block_on(extractor.extract(&section(2, "Cash 10"))).unwrap();

        match outcome {
            TableExtraction::Extracted(record) => assert_eq!(record.table_name, "Balance Sheet"),
            other => panic!("expected a table, got {:?}", other),
        }
        let requests = model.requests.borrow();
        assert_eq!(requests[0].model, "gemini-2.0-flash");
        assert_eq!(requests[0].contents, "Cash 10");
        assert_eq!(requests[0].system_instruction, TABLE_EXTRACTION_INSTRUCTION);
    }

    #[test]
    fn extractor_skips_unparseable_response() {
        let model = ScriptedModel::new(["I could not find a table."]);
        let extractor = TableExtractor::new(&model, "m");

        let outcome = tokio_test::block_on(extractor.extract(&section(1, "???"))).unwrap();
        assert_eq!(
            outcome,
            TableExtraction::Skipped {
                reason: SkipReason::NoJsonObject,
                raw_response: "I could not find a table.".to_string(),
            }
        );
    }

    #[test]
    fn empty_reply_is_skipped_with_finish_reason() {
        let model = ScriptedModel::default();
        model.push_error(GenAiError::EmptyResponse("SAFETY".to_string()));
        let extractor = TableExtractor::new(&model, "m");

        let outcome = tokio_test::block_on(extractor.extract(&section(1, "x"))).unwrap();
        assert_eq!(
            outcome,
            TableExtraction::Skipped {
                reason: SkipReason::EmptyResponse("SAFETY".to_string()),
                raw_response: String::new(),
            }
        );
    }

    #[test]
    fn transport_errors_propagate() {
        let model = ScriptedModel::default();
        model.push_error(GenAiError::Http {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "overloaded".to_string(),
        });
        let extractor = TableExtractor::new(&model, "m");

        let result = tokio_test::block_on(extractor.extract(&section(1, "x")));
        assert!(matches!(result, Err(GenAiError::Http { .. })));
    }
}
