//! Model registry for the configured LLM provider

use super::{AnthropicModel, AnthropicService, LlmService, LoggingService};
use std::collections::HashMap;
use std::sync::Arc;

const PREFERRED_DEFAULT: AnthropicModel = AnthropicModel::Claude35Haiku;

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    /// Gateway URL that handles authentication on our behalf
    pub gateway: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
            default_model: std::env::var("DEFAULT_MODEL").ok(),
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model in [AnthropicModel::Claude4Sonnet, AnthropicModel::Claude35Haiku] {
            if let Some(service) = Self::try_create_model(model, config) {
                services.insert(model.model_id().to_string(), service);
            }
        }

        let default_model = config
            .default_model
            .as_deref()
            .and_then(AnthropicModel::from_model_id)
            .unwrap_or(PREFERRED_DEFAULT)
            .model_id()
            .to_string();

        Self {
            services,
            default_model,
        }
    }

    fn try_create_model(model: AnthropicModel, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        // In gateway mode the gateway handles authentication
        let api_key = if config.gateway.is_some() {
            "implicit".to_string()
        } else {
            config.anthropic_api_key.clone().filter(|k| !k.is_empty())?
        };

        match AnthropicService::new(api_key, model, config.gateway.as_deref()) {
            Ok(service) => Some(Arc::new(LoggingService::new(Arc::new(service)))),
            Err(e) => {
                tracing::warn!(model = model.model_id(), error = %e, "Failed to create LLM service");
                None
            }
        }
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default_service(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn available_models(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.services.keys().cloned().collect();
        ids.sort();
        ids
    }
}
