use std::sync::Arc;
use std::time::Duration;

use intel_core::Settings;
use reqwest::Client;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::cache::ResponseCache;
use crate::provider::{resolve_backend, Backend};

const MAX_ATTEMPTS: u32 = 3;
const CLOUD_RATE_LIMIT_GAP: Duration = Duration::from_secs(1);

/// Generation client over whatever LLM backend `Settings` resolves to
/// (local Ollama or a configured cloud API), fronted by a shared response
/// cache and a process-wide concurrency semaphore. Grounded in
/// `core/llm/providers.py`'s `ollama_generate`/`ollama_generate_async`, with
/// LiteLLM's routing replaced by direct `reqwest` calls per backend since no
/// Rust LiteLLM equivalent exists in the stack.
pub struct GenerationClient {
    http: Client,
    settings: Settings,
    cache: ResponseCache,
    semaphore: Arc<Semaphore>,
}

impl GenerationClient {
    pub fn new(settings: Settings) -> Self {
        let http = Client::builder()
            .timeout(settings.ollama_request_timeout())
            .build()
            .unwrap_or_else(|_| Client::new());
        let cache = ResponseCache::new(Duration::from_secs(settings.llm_cache_ttl_seconds));
        let semaphore = Arc::new(Semaphore::new(settings.ollama_max_concurrent.max(1)));
        Self { http, settings, cache, semaphore }
    }

    /// Blocking-style single generation call (no semaphore gate — callers on
    /// the synchronous path are expected to serialize their own calls).
    pub async fn generate(&self, prompt: &str, system: &str, temperature: f64, max_tokens: u32) -> Option<String> {
        self.generate_with_retry(prompt, system, temperature, max_tokens).await
    }

    /// Concurrency-gated generation for the parallel-fanout path. Local
    /// backend permits up to `ollama_max_concurrent` in flight; cloud
    /// backend still goes through the semaphore but callers are expected to
    /// serialize cloud calls themselves with a rate-limit gap (see
    /// `generate_sequential_with_gap`).
    pub async fn generate_async(&self, prompt: &str, system: &str, temperature: f64, max_tokens: u32) -> Option<String> {
        let _permit = self.semaphore.acquire().await.ok()?;
        self.generate_with_retry(prompt, system, temperature, max_tokens).await
    }

    pub fn is_cloud(&self) -> bool {
        crate::provider::is_cloud_provider(&self.settings)
    }

    /// Sleeps the configured inter-call gap before returning — used between
    /// sequential cloud calls in `generate_parallel_intelligence` to respect
    /// free-tier rate limits, mirroring the Python original's
    /// `await asyncio.sleep(1.0)`.
    pub async fn rate_limit_gap(&self) {
        tokio::time::sleep(CLOUD_RATE_LIMIT_GAP).await;
    }

    /// Lazy token sequence. Collects the full response (retried the same as
    /// `generate`) then yields it split on whitespace, word-by-word, the
    /// same granularity `core/llm/providers.py::ollama_generate_stream`
    /// exposes to its callers. A real streaming HTTP read would avoid
    /// buffering the whole response, but no backend-specific SSE/NDJSON
    /// parser is warranted for a single adapter crate; the `Option` caller
    /// contract (nil on failure) is preserved either way.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        system: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Option<Vec<String>> {
        let text = self.generate_with_retry(prompt, system, temperature, max_tokens).await?;
        Some(text.split_whitespace().map(|w| w.to_string()).collect())
    }

    async fn generate_with_retry(&self, prompt: &str, system: &str, temperature: f64, max_tokens: u32) -> Option<String> {
        let cache_key = ResponseCache::key(system, prompt, temperature, max_tokens);
        if let Some(cached) = self.cache.get(&cache_key) {
            return Some(cached);
        }

        let backend = resolve_backend(&self.settings, None);
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.call_backend(&backend, prompt, system, temperature, max_tokens).await {
                Ok(text) => {
                    self.cache.put(cache_key, text.clone());
                    return Some(text);
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "LLM generate attempt failed");
                    last_err = Some(err);
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(250 * 2u64.pow(attempt))).await;
                    }
                }
            }
        }
        tracing::warn!(error = ?last_err, "LLM generate exhausted retries");
        None
    }

    async fn call_backend(
        &self,
        backend: &Backend,
        prompt: &str,
        system: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, String> {
        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let (url, body) = match backend {
            Backend::Ollama { host, model } => (
                format!("{host}/api/chat"),
                json!({
                    "model": model,
                    "messages": messages,
                    "stream": false,
                    "options": { "temperature": temperature, "num_predict": max_tokens },
                }),
            ),
            Backend::Cloud { base_url, model, .. } => (
                format!("{base_url}/chat/completions"),
                json!({
                    "model": model,
                    "messages": messages,
                    "temperature": temperature,
                    "max_tokens": max_tokens,
                }),
            ),
        };

        let mut request = self.http.post(&url).json(&body);
        if let Backend::Cloud { api_key, .. } = backend {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("backend returned status {}", response.status()));
        }
        let payload: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;

        match backend {
            Backend::Ollama { .. } => payload
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_str())
                .map(|s| s.trim().to_string())
                .ok_or_else(|| "missing message.content in ollama response".to_string()),
            Backend::Cloud { .. } => payload
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_str())
                .map(|s| s.trim().to_string())
                .ok_or_else(|| "missing choices[0].message.content in cloud response".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_hit_skips_backend_call() {
        let client = GenerationClient::new(Settings::default());
        let key = ResponseCache::key("sys", "prompt", 0.3, 100);
        client.cache.put(key, "cached response".to_string());
        let result = client.generate("prompt", "sys", 0.3, 100).await;
        assert_eq!(result, Some("cached response".to_string()));
    }
}
