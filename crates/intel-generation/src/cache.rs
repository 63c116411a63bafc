use std::time::{Duration, Instant};

use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Shared LLM response cache, keyed on the full generation request so
/// identical prompts never round-trip to the backend twice within the TTL.
/// Mirrors `analysis-orchestrator`'s `CacheEntry<T>` TTL-on-read pattern: no
/// background eviction task, a stale entry is just overwritten or ignored.
pub struct ResponseCache {
    entries: DashMap<String, (String, Instant)>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    pub fn key(system: &str, prompt: &str, temperature: f64, max_tokens: u32) -> String {
        let joined = format!("{}|{}|{}|{}", system, prompt, temperature.to_bits(), max_tokens);
        let digest = Sha256::digest(joined.as_bytes());
        hex::encode(digest)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        let (value, cached_at) = entry.value();
        if Instant::now().duration_since(*cached_at) < self.ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    pub fn put(&self, key: String, value: String) {
        self.entries.insert(key, (value, Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_for_identical_inputs() {
        let a = ResponseCache::key("sys", "prompt", 0.3, 512);
        let b = ResponseCache::key("sys", "prompt", 0.3, 512);
        assert_eq!(a, b);
    }

    #[test]
    fn key_differs_on_temperature() {
        let a = ResponseCache::key("sys", "prompt", 0.3, 512);
        let b = ResponseCache::key("sys", "prompt", 0.7, 512);
        assert_ne!(a, b);
    }

    #[test]
    fn expired_entry_is_not_served() {
        let cache = ResponseCache::new(Duration::from_millis(0));
        cache.put("k".to_string(), "v".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn fresh_entry_is_served() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.put("k".to_string(), "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }
}
