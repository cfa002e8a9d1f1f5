//! Model-provider abstraction: a thin `ModelProvider` interface replacing
//! the duck-typing described in spec.md §9's Design Notes, plus a registry
//! that tracks per-provider health so a long-running loop doesn't retry a
//! provider known to be down on every iteration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use apa_core::error::{Error, Result};

/// The text and token accounting a provider call yields. `input_tokens` +
/// `output_tokens` is the message-style accounting path; a chat-completion
/// adapter may report only a combined total, split arbitrarily between the
/// two fields as long as their sum is `usage.total_tokens`.
#[derive(Debug, Clone)]
pub struct ProviderCompletion {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ProviderCompletion {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Interface every model-provider adapter implements: chat-completion and
/// message-style backends both reduce to this single shape.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn call(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ProviderCompletion>;
}

/// Health tracking for one registered provider. A sustained failure rate
/// opens the circuit so the engine skips straight to the mock fallback
/// instead of paying a network timeout on every loop iteration.
struct ProviderHealth {
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    circuit_open_until: std::sync::Mutex<Option<Instant>>,
}

impl ProviderHealth {
    fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            circuit_open_until: std::sync::Mutex::new(None),
        }
    }

    fn record_success(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        *self.circuit_open_until.lock().unwrap() = None;
    }

    fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let failed = self.failed_requests.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total_requests.load(Ordering::Relaxed);
        if total >= 5 && (failed as f64 / total as f64) > 0.5 {
            *self.circuit_open_until.lock().unwrap() =
                Some(Instant::now() + Duration::from_secs(60));
        }
    }

    fn is_circuit_open(&self) -> bool {
        match *self.circuit_open_until.lock().unwrap() {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }
}

/// Providers keyed by id (`agent.provider`, lowercased). Unknown or
/// unconfigured ids, and ids whose circuit is open, fall back to the mock
/// response at the call site in `reason()`.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: DashMap<String, Arc<dyn ModelProvider>>,
    health: DashMap<String, Arc<ProviderHealth>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider: Arc<dyn ModelProvider>) {
        let id = provider.id().to_string();
        self.health.insert(id.clone(), Arc::new(ProviderHealth::new()));
        self.providers.insert(id, provider);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ModelProvider>> {
        if self.health.get(id).map(|h| h.is_circuit_open()).unwrap_or(false) {
            return None;
        }
        self.providers.get(id).map(|e| e.value().clone())
    }

    pub async fn call(
        &self,
        id: &str,
        prompt: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ProviderCompletion> {
        let provider = self
            .get(id)
            .ok_or_else(|| Error::provider(format!("provider '{id}' unconfigured or circuit open")))?;

        let health = self.health.get(id).map(|e| e.value().clone());
        match provider.call(prompt, model, temperature, max_tokens).await {
            Ok(completion) => {
                if let Some(h) = health {
                    h.record_success();
                }
                Ok(completion)
            }
            Err(err) => {
                if let Some(h) = health {
                    h.record_failure();
                }
                Err(err)
            }
        }
    }
}

/// Deterministic stand-in used in tests and whenever a real provider isn't
/// wired in. Returns scripted ReAct-formatted text, either the same response
/// every call or one drawn from a fixed sequence (clamped to the last entry
/// once exhausted, so a test agent that loops past its script still gets a
/// deterministic reply rather than a panic).
pub struct ScriptedProvider {
    id: String,
    responses: Vec<String>,
    calls: std::sync::Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            responses: vec![response.into()],
            calls: std::sync::Mutex::new(0),
        }
    }

    pub fn sequence(id: impl Into<String>, responses: Vec<String>) -> Self {
        Self {
            id: id.into(),
            responses,
            calls: std::sync::Mutex::new(0),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(
        &self,
        _prompt: &str,
        _model: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<ProviderCompletion> {
        let mut calls = self.calls.lock().unwrap();
        let idx = (*calls).min(self.responses.len() - 1);
        *calls += 1;
        Ok(ProviderCompletion {
            text: self.responses[idx].clone(),
            input_tokens: 40,
            output_tokens: 20,
        })
    }
}

/// Always fails; used to exercise the mock-fallback path in tests.
pub struct FailingProvider {
    id: String,
}

impl FailingProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl ModelProvider for FailingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(
        &self,
        _prompt: &str,
        _model: &str,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<ProviderCompletion> {
        Err(Error::provider("simulated transport failure"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_provider_errors() {
        let registry = ProviderRegistry::new();
        let err = registry.call("openai", "p", "gpt-4", 0.5, 100).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn circuit_opens_after_sustained_failures() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(FailingProvider::new("flaky")));
        for _ in 0..6 {
            let _ = registry.call("flaky", "p", "m", 0.5, 10).await;
        }
        assert!(registry.get("flaky").is_none());
    }

    #[tokio::test]
    async fn healthy_provider_stays_available() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(ScriptedProvider::new("mock", "Thought: x\nAction: finish\nResult: {}")));
        for _ in 0..10 {
            registry.call("mock", "p", "m", 0.5, 10).await.unwrap();
        }
        assert!(registry.get("mock").is_some());
    }
}
