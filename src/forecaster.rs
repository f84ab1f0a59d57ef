use crate::builder::{build_analysis_prompt, build_prompt};
use crate::error::{ForecastError, Result};
use crate::extraction::{build_extraction_prompt, parse_criteria, parse_extracted_data, ExtractedData};
use crate::parser::parse_forecast;
use crate::provider::CompletionProvider;
use crate::request::ForecastRequest;
use crate::table::{ForecastResponse, ForecastTable};
use log::info;

/// Runs one request/response cycle per call against an explicitly supplied
/// provider.
pub struct Forecaster<P> {
    provider: P,
    model: String,
    max_output_tokens: u32,
}

impl<P: CompletionProvider> Forecaster<P> {
    pub fn new(provider: P, model: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_output_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn forecast(&self, request: &ForecastRequest) -> Result<ForecastResponse> {
        info!(
            "Requesting {} forecast for {} periods from {}",
            request.kind(),
            request.horizon(),
            self.model
        );
        let prompt = build_prompt(request);
        let raw = self.complete(&prompt).await?;
        parse_forecast(&raw, request.kind())
    }

    /// Narrative analysis of a sales and a cost forecast, returned as the
    /// model wrote it (Markdown).
    pub async fn analyze(
        &self,
        sales: &ForecastTable,
        cost: &ForecastTable,
        horizon: u32,
    ) -> Result<String> {
        info!("Requesting forecast analysis from {}", self.model);
        let prompt = build_analysis_prompt(sales, cost, horizon)?;
        self.complete(&prompt).await
    }

    /// Pulls the comma-separated `criteria` out of document text.
    pub async fn extract_figures(&self, text: &str, criteria: &str) -> Result<ExtractedData> {
        let criteria = parse_criteria(criteria);
        if criteria.is_empty() {
            return Err(ForecastError::EmptyInput(
                "No extraction criteria were given".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(ForecastError::EmptyInput(
                "The document contains no text".to_string(),
            ));
        }

        info!("Extracting {} figures from document text", criteria.len());
        let prompt = build_extraction_prompt(text, &criteria)?;
        let raw = self.complete(&prompt).await?;
        parse_extracted_data(&raw, &criteria)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let raw = self
            .provider
            .complete(prompt, self.max_output_tokens, &self.model)
            .await?;
        if raw.trim().is_empty() {
            return Err(ForecastError::EmptyInput(
                "The model returned an empty response".to_string(),
            ));
        }
        Ok(raw)
    }
}
