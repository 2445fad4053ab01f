// src/genai/client.rs
use reqwest::header;

use crate::config::Config;
use crate::genai::models::{Content, GenerateContentRequest, GenerateContentResponse};
use crate::utils::error::GenAiError;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// One prompt sent to a remote text model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub system_instruction: String,
    pub contents: String,
}

/// The text the model returned, plus token usage when the service reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub total_tokens: Option<u32>,
}

/// A remote generative model, seen as a plain request/response collaborator.
#[allow(async_fn_in_trait)]
pub trait GenerativeModel {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenAiError>;
}

/// Client for the Gemini `generateContent` REST endpoint.
/// Built once per run from [`Config`] and passed to whoever needs it.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, GenAiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, model)
    }
}

impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenAiError> {
        let url = self.endpoint(&request.model);
        let body = GenerateContentRequest {
            system_instruction: Content::system(&request.system_instruction),
            contents: vec![Content::user(&request.contents)],
        };

        tracing::debug!(
            "Sending {} bytes of content to model {}",
            request.contents.len(),
            request.model
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?; // Propagates reqwest::Error as GenAiError::Network

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("HTTP error status: {} from model {}", status, request.model);
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                tracing::warn!("Received 429 Too Many Requests - the free tier allows ~15 requests/minute.");
            }
            return Err(GenAiError::Http { status, body });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let total_tokens = parsed.total_tokens();
        let text = parsed
            .first_text()
            .ok_or_else(|| GenAiError::EmptyResponse(parsed.finish_reason()))?;

        tracing::debug!("Model {} returned {} bytes ({:?} tokens)", request.model, text.len(), total_tokens);

        Ok(Generation { text, total_tokens })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(api_base: &str) -> Config {
        Config {
            api_key: "secret".to_string(),
            api_base: api_base.to_string(),
            model: DEFAULT_MODEL.to_string(),
            input_dir: PathBuf::from("pdf_inputs"),
            data_dir: PathBuf::from("data"),
            report_dir: PathBuf::from("reports"),
            debug: false,
            reuse_tables: false,
            number_format: crate::validation::NumberFormat::Strict,
        }
    }

    #[test]
    fn endpoint_includes_model_and_trims_base() {
        let client = GeminiClient::new(&config("https://example.test/")).unwrap();
        assert_eq!(
            client.endpoint("gemini-2.0-flash"),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn scripted_model_replays_in_order_and_records_requests() {
        let model = testing::ScriptedModel::new(["first", "second"]);
        let request = GenerationRequest {
            model: DEFAULT_MODEL.to_string(),
            system_instruction: "sys".to_string(),
            contents: "body".to_string(),
        };

        assert_eq!(model.generate(&request).await.unwrap().text, "first");
        assert_eq!(model.generate(&request).await.unwrap().text, "second");
        assert!(model.generate(&request).await.is_err());
        assert_eq!(model.requests.borrow().len(), 3);
    }
}
