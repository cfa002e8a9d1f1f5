//! Layered configuration: `config/default.toml`, an optional
//! environment-specific file, an optional `config/local.toml`, then
//! `APA__SECTION__FIELD`-style environment overrides. Mirrors §6's
//! environment variable list.

use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub executor: ExecutorConfig,
    pub reasoning: ReasoningConfig,
    pub safety: SafetyConfig,
    pub context: ContextConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    pub default_max_iterations: usize,
    pub persist_traces: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReasoningConfig {
    pub default_provider: String,
    pub default_max_tokens: u32,
    pub allow_mock_fallback: bool,
    pub providers: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub models: Vec<String>,
    pub api_key: Option<Secret<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    /// `APPROVAL_TIMEOUT_SECONDS`, default 3600.
    pub approval_timeout_seconds: u64,
    /// Whether HITL requests block on a real operator channel
    /// (`blocking`) or auto-reject with a diagnostic decision
    /// (`auto_reject_diagnostic`) when none is configured.
    pub hitl_mode: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    /// `VECTOR_BACKEND`: `local` or `managed`.
    pub vector_backend: String,
    /// `VECTOR_PATH` for the local backend.
    pub vector_path: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_collection: String,
    /// `EMBEDDING_MODEL`, default produces 1536-dim vectors.
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub top_k: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObservabilityConfig {
    pub json_logs: bool,
    pub otel_endpoint: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APA_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig {
                default_max_iterations: 10,
                persist_traces: true,
            },
            reasoning: ReasoningConfig {
                default_provider: "openai".into(),
                default_max_tokens: 2000,
                allow_mock_fallback: true,
                providers: HashMap::new(),
            },
            safety: SafetyConfig {
                approval_timeout_seconds: 3600,
                hitl_mode: "blocking".into(),
            },
            context: ContextConfig {
                vector_backend: "local".into(),
                vector_path: None,
                qdrant_url: None,
                qdrant_collection: "apa_memory".into(),
                embedding_model: "text-embedding-3-small".into(),
                embedding_dim: 1536,
                top_k: 5,
            },
            observability: ObservabilityConfig {
                json_logs: false,
                otel_endpoint: None,
            },
        }
    }
}
