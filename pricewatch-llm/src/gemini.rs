use crate::traits::{LlmClient, LlmResponse};
use async_trait::async_trait;
use pricewatch_common::{PriceWatchError, Result};
use pricewatch_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    total_token_count: Option<u32>,
}

/// Google Gemini API client.
///
/// Requires a valid API key and internet access.
pub struct GeminiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a new client using the provided API key and model.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL)
    }

    /// Same as [`GeminiClient::new`] against a different endpoint root.
    pub fn with_base_url(api_key: String, model: String, base_url: &str) -> Result<Self> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let client = HttpClient::with_connect_timeout(&base, Duration::from_secs(10))
            .map_err(|e| PriceWatchError::Llm(format!("Failed to create HTTP client: {e}")))?
            .with_timeout(Duration::from_secs(60));

        Ok(Self {
            client,
            api_key,
            model,
        })
    }
}

fn http_to_llm(e: HttpError) -> PriceWatchError {
    match e.status().map(|s| s.as_u16()) {
        Some(429) => PriceWatchError::Llm("Rate limit or quota exceeded".to_string()),
        Some(401) => PriceWatchError::Llm("Invalid API key".to_string()),
        Some(403) => PriceWatchError::Llm("API access forbidden".to_string()),
        _ => PriceWatchError::Llm(format!("Gemini request failed: {e}")),
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let path = format!("models/{}:generateContent", self.model);

        let generation_config = (max_tokens.is_some() || temperature.is_some()).then_some(
            GeminiGenerationConfig {
                temperature,
                max_output_tokens: max_tokens,
            },
        );

        let system_instruction = system_prompt.map(|sys| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: sys.to_string(),
            }],
        });

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config,
            system_instruction,
        };

        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "llm.gemini.request");

        let opts = RequestOpts {
            auth: Some(Auth::Query {
                name: "key",
                value: Cow::Borrowed(self.api_key.as_str()),
            }),
            ..Default::default()
        };
        let resp: GeminiResponse = self
            .client
            .post_json_opts(&path, &request, opts)
            .await
            .map_err(http_to_llm)?;

        let Some(candidate) = resp.candidates.first() else {
            return Err(PriceWatchError::Llm(
                "No candidates returned from Gemini".to_string(),
            ));
        };

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(PriceWatchError::Llm(
                "Content blocked by Gemini safety filters".to_string(),
            ));
        }

        let text = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(PriceWatchError::Llm(
                "No content parts in Gemini response".to_string(),
            ));
        }

        let tokens_used = resp.usage_metadata.and_then(|u| u.total_token_count);
        tracing::debug!(model = %self.model, ?tokens_used, "llm.gemini.response");

        Ok(LlmResponse {
            text,
            model: Some(self.model.clone()),
            tokens_used,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
