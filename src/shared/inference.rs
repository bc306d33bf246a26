use super::config::{InferenceConfig, InferenceFlavor};
use super::conversation::ChatMessage;
use super::error::{InferenceError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Chat completion boundary: ordered messages in, one reply out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelResponse>;
}

#[derive(Debug, Clone, Default)]
pub struct ModelResponse {
    pub content: String,
    /// Model that actually served the request (a router may pick one).
    pub model: Option<String>,
    pub total_tokens: Option<i64>,
    pub prompt_tokens: Option<i64>,
    pub completion_tokens: Option<i64>,
}

/// Sampling knobs; unset fields are left out of the request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompletionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    options: &'a CompletionOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: Option<i64>,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
}

#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    url: String,
    deployment: String,
    api_key: String,
    flavor: InferenceFlavor,
    options: CompletionOptions,
    log_dir: Option<PathBuf>,
    log_seq: Arc<AtomicU64>,
}

impl InferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferenceError::Model(format!("Failed to create inference client: {}", e)))?;

        Ok(Self {
            client,
            url: chat_completions_url(config),
            deployment: config.deployment.clone(),
            api_key: config.api_key.clone(),
            flavor: config.flavor.clone(),
            options: CompletionOptions::default(),
            log_dir: config.log_dir.clone(),
            log_seq: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request(&self, messages: &[ChatMessage]) -> Result<Value> {
        let model = match self.flavor {
            InferenceFlavor::Azure { .. } => None,
            InferenceFlavor::OpenAi => Some(self.deployment.as_str()),
        };
        let req = ChatRequest {
            model,
            messages,
            options: &self.options,
        };
        Ok(serde_json::to_value(&req)?)
    }

    async fn log_inference(&self, id: u64, kind: &str, body: &str) {
        let Some(dir) = &self.log_dir else {
            return;
        };
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!("Failed to create inference log dir {}: {}", dir.display(), e);
            return;
        }
        let filename = dir.join(format!("inference_{}_{}.json", id, kind));
        if let Err(e) = tokio::fs::write(&filename, body).await {
            tracing::warn!("Failed to write inference {} log: {}", kind, e);
        }
    }
}

#[async_trait]
impl CompletionService for InferenceClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ModelResponse> {
        if messages.is_empty() {
            return Err(InferenceError::Model("No messages provided".to_string()));
        }

        let req_value = self.build_request(messages)?;
        let log_id = self.log_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if self.log_dir.is_some() {
            if let Ok(json) = serde_json::to_string_pretty(&req_value) {
                self.log_inference(log_id, "request", &json).await;
            }
        }

        let request_builder = self.client.post(&self.url).json(&req_value);
        let request_builder = match self.flavor {
            InferenceFlavor::Azure { .. } => request_builder.header("api-key", &self.api_key),
            InferenceFlavor::OpenAi => request_builder.bearer_auth(&self.api_key),
        };

        tracing::debug!("Sending {} messages to {}", messages.len(), self.url);
        let resp = request_builder.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response>".to_string());
            return Err(InferenceError::Model(format!(
                "Inference service error ({}): {}",
                status, text
            )));
        }

        let response_text = resp
            .text()
            .await
            .map_err(|e| InferenceError::Model(format!("Failed to read response text: {}", e)))?;
        self.log_inference(log_id, "response", &response_text).await;

        parse_response(&response_text)
    }
}

fn chat_completions_url(config: &InferenceConfig) -> String {
    let base = config.endpoint.as_str().trim_end_matches('/');
    match &config.flavor {
        InferenceFlavor::Azure { api_version } => format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            base, config.deployment, api_version
        ),
        InferenceFlavor::OpenAi => format!("{}/chat/completions", base),
    }
}

fn parse_response(body: &str) -> Result<ModelResponse> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::Model("Inference response had no choices".to_string()))?;
    let usage = parsed.usage;

    Ok(ModelResponse {
        content: choice.message.content.unwrap_or_default(),
        model: parsed.model,
        total_tokens: usage.as_ref().and_then(|u| u.total_tokens),
        prompt_tokens: usage.as_ref().and_then(|u| u.prompt_tokens),
        completion_tokens: usage.as_ref().and_then(|u| u.completion_tokens),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::InferenceArgs;
    use serde_json::json;

    fn config(api_version: &str) -> InferenceConfig {
        InferenceArgs {
            endpoint: "https://example.openai.azure.com".to_string(),
            api_key: "key".to_string(),
            deployment: "model-router".to_string(),
            api_version: api_version.to_string(),
            timeout_secs: 10,
            inference_log_dir: None,
        }
        .into_config()
        .unwrap()
    }

    #[test]
    fn test_azure_request_shape() {
        let client = InferenceClient::new(&config("2024-10-01-preview")).unwrap();
        assert_eq!(
            client.url(),
            "https://example.openai.azure.com/openai/deployments/model-router/chat/completions?api-version=2024-10-01-preview"
        );

        let body = client
            .build_request(&[ChatMessage::system("sys"), ChatMessage::user("hi")])
            .unwrap();
        assert_eq!(
            body,
            json!({
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }

    #[test]
    fn test_openai_request_carries_model_and_options() {
        let client = InferenceClient::new(&config("")).unwrap().with_options(CompletionOptions {
            max_tokens: Some(100),
            temperature: Some(0.5),
            ..Default::default()
        });
        assert_eq!(client.url(), "https://example.openai.azure.com/chat/completions");

        let body = client.build_request(&[ChatMessage::user("hi")]).unwrap();
        assert_eq!(body["model"], "model-router");
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["temperature"], 0.5);
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn test_parse_response_reads_routed_model() {
        let body = json!({
            "model": "gpt-5-mini-2025-08-07",
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
            "usage": {"total_tokens": 12, "prompt_tokens": 9, "completion_tokens": 3}
        })
        .to_string();

        let response = parse_response(&body).unwrap();
        assert_eq!(response.content, "Hello!");
        assert_eq!(response.model.as_deref(), Some("gpt-5-mini-2025-08-07"));
        assert_eq!(response.total_tokens, Some(12));
    }

    #[test]
    fn test_parse_response_null_content_is_empty() {
        let body = json!({"choices": [{"message": {"content": null}}]}).to_string();
        let response = parse_response(&body).unwrap();
        assert_eq!(response.content, "");
        assert!(response.model.is_none());
    }

    #[test]
    fn test_parse_response_without_choices_fails() {
        let body = json!({"choices": []}).to_string();
        assert!(matches!(parse_response(&body), Err(InferenceError::Model(_))));
    }
}
