//! OpenAI-compatible consolidation provider.
//!
//! Works with OpenAI, OpenRouter, vLLM and any endpoint that
//! exposes `/chat/completions`. The request is rendered into a single user
//! message and the model is asked for a JSON object; the raw content is
//! handed back untouched for validation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use timegap_config::AppConfig;
use timegap_core::consolidation::{ConsolidationRequest, Consolidator, RawConsolidation};
use timegap_core::error::ProviderError;
use timegap_reconcile::PromptTemplate;
use tracing::{debug, warn};

/// An OpenAI-compatible consolidation service.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    template: PromptTemplate,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            temperature: 0.3,
            template: PromptTemplate::builtin(),
            client,
        })
    }

    /// Build from configuration with an already-loaded prompt template.
    pub fn from_config(config: &AppConfig, template: PromptTemplate) -> Result<Self, ProviderError> {
        Ok(Self::new(
            "openai",
            &config.consolidation.api_url,
            config.consolidation.api_key.clone(),
            &config.model,
            config.dispatch_timeout(),
        )?
        .with_temperature(config.temperature)
        .with_template(template))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_body(&self, request: &ConsolidationRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: Some(self.template.render(request)),
            }],
            temperature: self.temperature,
            response_format: ResponseFormat {
                r#type: "json_object".into(),
            },
            stream: false,
        }
    }
}

fn parse_response(api_response: ApiResponse) -> Result<RawConsolidation, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    Ok(RawConsolidation {
        content: choice.message.content.unwrap_or_default(),
        model: api_response.model,
    })
}

#[async_trait]
impl Consolidator for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn consolidate(
        &self,
        request: &ConsolidationRequest,
    ) -> std::result::Result<RawConsolidation, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured("no API key (set OPENAI_API_KEY)".into())
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(request);

        debug!(
            provider = %self.name,
            model = %self.model,
            samples = request.samples.len(),
            "Sending consolidation request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        if let Some(usage) = &api_response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Consolidation usage"
            );
        }

        parse_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    response_format: ResponseFormat,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use timegap_core::window::TimeWindow;

    fn request() -> ConsolidationRequest {
        ConsolidationRequest {
            context_text: "pairing".into(),
            samples: vec![],
            min_duration_seconds: 300,
            window_span: TimeWindow::new(
                Utc.with_ymd_and_hms(2025, 6, 8, 9, 40, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 6, 8, 10, 30, 0).unwrap(),
            )
            .unwrap(),
        }
    }

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(
            "openai",
            "https://api.openai.com/v1/",
            Some("sk-test".into()),
            "gpt-5-nano",
            Duration::from_secs(30),
        )
        .unwrap()
    }

    #[test]
    fn body_asks_for_json_object() {
        let body = serde_json::to_value(provider().request_body(&request())).unwrap();
        assert_eq!(body["model"], "gpt-5-nano");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        let content = body["messages"][0]["content"].as_str().unwrap();
        assert!(content.contains("pairing"));
    }

    #[test]
    fn custom_template_is_used() {
        let provider = provider().with_template(PromptTemplate::with_instructions("Only JSON."));
        let body = provider.request_body(&request());
        assert!(body.messages[0].content.as_deref().unwrap().starts_with("Only JSON."));
    }

    #[test]
    fn first_choice_content_is_returned() {
        let api: ApiResponse = serde_json::from_value(serde_json::json!({
            "model": "gpt-5-nano-2025-08-07",
            "choices": [{"message": {"role": "assistant", "content": "{\"entries\": []}"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        }))
        .unwrap();
        let raw = parse_response(api).unwrap();
        assert_eq!(raw.content, "{\"entries\": []}");
        assert_eq!(raw.model, "gpt-5-nano-2025-08-07");
    }

    #[test]
    fn no_choices_is_an_api_error() {
        let api: ApiResponse =
            serde_json::from_value(serde_json::json!({"model": "m", "choices": []})).unwrap();
        assert!(matches!(
            parse_response(api),
            Err(ProviderError::ApiError { .. })
        ));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let provider = OpenAiCompatProvider::new(
            "openai",
            "https://api.openai.com/v1",
            None,
            "gpt-5-nano",
            Duration::from_secs(30),
        )
        .unwrap();
        assert!(matches!(
            provider.consolidate(&request()).await,
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
