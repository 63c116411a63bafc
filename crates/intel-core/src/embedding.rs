//! Text-to-vector embedding, shared by ingestion (chunk embeddings) and
//! retrieval (query embeddings). Talks to an Ollama-compatible embedding
//! endpoint; falls back to a deterministic pseudo-embedding derived from
//! the text's SHA-256 digest when the service is unavailable, so semantic
//! search degrades gracefully instead of failing outright.

use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::Settings;

pub struct EmbeddingClient {
    client: reqwest::Client,
    host: String,
    model: String,
    vector_size: usize,
}

impl EmbeddingClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            host: settings.ollama_host.clone(),
            model: settings.ollama_embed_model.clone(),
            vector_size: settings.embedding_vector_size,
        }
    }

    async fn embed_via_ollama(&self, text: &str) -> Option<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.host);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "model": self.model, "prompt": text }))
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        let embedding = body.get("embedding")?.as_array()?;
        let vector: Vec<f32> = embedding.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect();
        if vector.is_empty() {
            None
        } else {
            Some(vector)
        }
    }

    /// Reproducible pseudo-embedding: cycles the bytes of `SHA-256(text)`,
    /// mapping each byte `b` to `(b / 255.0) * 2.0 - 1.0`.
    pub fn fallback_vector(text: &str, size: usize) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..size)
            .map(|i| {
                let byte = digest[i % digest.len()];
                (byte as f32 / 255.0) * 2.0 - 1.0
            })
            .collect()
    }

    fn resize(mut vector: Vec<f32>, target_size: usize) -> Vec<f32> {
        if vector.len() >= target_size {
            vector.truncate(target_size);
            vector
        } else {
            vector.resize(target_size, 0.0);
            vector
        }
    }

    /// Embeds `text`, falling back to a deterministic pseudo-embedding of
    /// `self.vector_size` dimensions if the embedding service fails.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        match self.embed_via_ollama(text).await {
            Some(vector) => Self::resize(vector, self.vector_size),
            None => Self::fallback_vector(text, self.vector_size),
        }
    }

    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_vector_is_deterministic() {
        let a = EmbeddingClient::fallback_vector("hello world", 16);
        let b = EmbeddingClient::fallback_vector("hello world", 16);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn fallback_vector_differs_for_different_text() {
        let a = EmbeddingClient::fallback_vector("alpha", 8);
        let b = EmbeddingClient::fallback_vector("beta", 8);
        assert_ne!(a, b);
    }

    #[test]
    fn resize_pads_short_vectors_with_zero() {
        let resized = EmbeddingClient::resize(vec![1.0, 2.0], 4);
        assert_eq!(resized, vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn resize_truncates_long_vectors() {
        let resized = EmbeddingClient::resize(vec![1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(resized, vec![1.0, 2.0]);
    }
}
