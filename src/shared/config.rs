use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use url::Url;

use super::error::{InferenceError, Result};

pub const DEFAULT_API_VERSION: &str = "2024-10-01-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 900;

/// Which request shape the inference endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceFlavor {
    /// Azure OpenAI deployment URL with `api-version` query and `api-key` header.
    Azure { api_version: String },
    /// OpenAI-compatible `/chat/completions` with a bearer token and `model` field.
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub deployment: String,
    pub flavor: InferenceFlavor,
    pub timeout: Duration,
    pub log_dir: Option<PathBuf>,
}

/// Inference connection flags shared by every binary.
#[derive(Debug, Clone, Args)]
pub struct InferenceArgs {
    /// Inference endpoint, e.g. https://<resource>.openai.azure.com
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    pub endpoint: String,

    /// API key for the inference endpoint
    #[arg(long, env = "AZURE_OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Deployment (or model) name to route requests to
    #[arg(long, env = "AZURE_OPENAI_DEPLOYMENT")]
    pub deployment: String,

    /// Azure API version; pass an empty value for an OpenAI-compatible endpoint
    #[arg(long, env = "AZURE_OPENAI_API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// Request timeout in seconds
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Directory to dump raw inference requests and responses into
    #[arg(long, env = "INFERENCE_LOG_DIR")]
    pub inference_log_dir: Option<PathBuf>,
}

impl InferenceArgs {
    pub fn into_config(self) -> Result<InferenceConfig> {
        let endpoint_raw = self.endpoint.trim().trim_end_matches('/');
        if endpoint_raw.is_empty() {
            return Err(InferenceError::Config(
                "Inference endpoint must not be empty".to_string(),
            ));
        }
        let endpoint = Url::parse(endpoint_raw).map_err(|e| {
            InferenceError::Config(format!("Invalid inference endpoint '{}': {}", endpoint_raw, e))
        })?;

        let api_key = self.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(InferenceError::Config(
                "Inference API key must not be empty".to_string(),
            ));
        }

        let deployment = self.deployment.trim().to_string();
        if deployment.is_empty() {
            return Err(InferenceError::Config(
                "Inference deployment must not be empty".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(InferenceError::Config(
                "Inference timeout must be at least one second".to_string(),
            ));
        }

        let api_version = self.api_version.trim();
        let flavor = if api_version.is_empty() {
            InferenceFlavor::OpenAi
        } else {
            InferenceFlavor::Azure {
                api_version: api_version.to_string(),
            }
        };

        Ok(InferenceConfig {
            endpoint,
            api_key,
            deployment,
            flavor,
            timeout: Duration::from_secs(self.timeout_secs),
            log_dir: self.inference_log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> InferenceArgs {
        InferenceArgs {
            endpoint: "https://example.openai.azure.com/".to_string(),
            api_key: " secret ".to_string(),
            deployment: "model-router".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout_secs: 30,
            inference_log_dir: None,
        }
    }

    #[test]
    fn test_azure_flavor_by_default() {
        let config = args().into_config().unwrap();
        assert_eq!(config.endpoint.as_str(), "https://example.openai.azure.com/");
        assert_eq!(config.api_key, "secret");
        assert_eq!(
            config.flavor,
            InferenceFlavor::Azure {
                api_version: DEFAULT_API_VERSION.to_string()
            }
        );
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_empty_api_version_selects_openai_flavor() {
        let mut raw = args();
        raw.api_version = "  ".to_string();
        let config = raw.into_config().unwrap();
        assert_eq!(config.flavor, InferenceFlavor::OpenAi);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut raw = args();
        raw.endpoint = "not a url".to_string();
        assert!(matches!(raw.into_config(), Err(InferenceError::Config(_))));

        let mut raw = args();
        raw.deployment = String::new();
        assert!(matches!(raw.into_config(), Err(InferenceError::Config(_))));

        let mut raw = args();
        raw.timeout_secs = 0;
        assert!(matches!(raw.into_config(), Err(InferenceError::Config(_))));
    }
}
