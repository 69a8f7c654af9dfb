//! Google Gemini client for the [`Generator`] seam.
//!
//! One `generateContent` call per request, no internal retries: rate limits
//! surface as `Gemini API error 429 ...` so the batch executor can classify
//! them and back off.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use exam_forge_core::generation::{Generation, GenerationRequest, Generator};
use exam_forge_core::models::TokenUsage;

use crate::config::GenerationConfig;

/// Environment variable that overrides `generation.model`.
pub const MODEL_ENV: &str = "GEMINI_MODEL";

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f64,
}

impl GeminiClient {
    /// Build a client from config. The API key is read from the variable
    /// named by `generation.api_key_env`.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("{} environment variable not set", config.api_key_env))?;
        let model = std::env::var(MODEL_ENV)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| config.model.clone());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

fn request_body(request: &GenerationRequest, temperature: f64) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": request.system }] },
        "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
        "generationConfig": {
            "temperature": temperature,
            "responseMimeType": "application/json"
        }
    })
}

fn parse_usage(json: &Value) -> Option<TokenUsage> {
    let usage = json.get("usageMetadata")?;
    let count = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
    Some(TokenUsage {
        prompt_tokens: count("promptTokenCount"),
        output_tokens: count("candidatesTokenCount"),
        total_tokens: count("totalTokenCount"),
    })
}

/// Concatenate the text parts of the first candidate.
fn parse_response(json: &Value) -> Result<Generation> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array);
    let text: String = parts
        .into_iter()
        .flatten()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        let reason = json
            .pointer("/candidates/0/finishReason")
            .or_else(|| json.pointer("/promptFeedback/blockReason"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        bail!("Gemini response contained no text (reason: {})", reason);
    }

    Ok(Generation {
        text,
        usage: parse_usage(json),
    })
}

#[async_trait]
impl Generator for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request, self.temperature))
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: Value = response
            .json()
            .await
            .context("Gemini returned a non-JSON body")?;
        parse_response(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let req = GenerationRequest {
            system: "sys".into(),
            prompt: "write a question".into(),
        };
        let body = request_body(&req, 0.7);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "write a question");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["temperature"], 0.7);
    }

    #[test]
    fn test_parse_response_with_usage() {
        let json = json!({
            "candidates": [{"content": {"parts": [{"text": "{\"id\": "}, {"text": "1}"}]}}],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 80, "totalTokenCount": 200}
        });
        let g = parse_response(&json).unwrap();
        assert_eq!(g.text, "{\"id\": 1}");
        assert_eq!(
            g.usage,
            Some(TokenUsage {
                prompt_tokens: 120,
                output_tokens: 80,
                total_tokens: 200
            })
        );
    }

    #[test]
    fn test_parse_blocked_response() {
        let json = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = parse_response(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_missing_api_key_is_reported() {
        let config = GenerationConfig {
            api_key_env: "EXAM_FORGE_TEST_MISSING_KEY".into(),
            ..Default::default()
        };
        let err = GeminiClient::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("EXAM_FORGE_TEST_MISSING_KEY"));
    }
}
