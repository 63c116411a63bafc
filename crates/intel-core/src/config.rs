use std::time::Duration;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Process-wide configuration, loaded once at startup. Replaces the
/// original's `lru_cache`d settings singleton with an explicit value that
/// callers receive as `Arc<Settings>` — see Design Notes §9 on reifying
/// global singletons as an `App` context passed down the call chain.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub job_broker_url: String,

    pub ollama_host: String,
    pub ollama_embed_model: String,
    pub ollama_generate_model: String,
    pub embedding_vector_size: usize,

    pub llm_provider: String,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_cloud_model: String,
    pub llm_cache_ttl_seconds: u64,
    pub ollama_max_concurrent: usize,
    pub ollama_request_timeout_secs: f64,

    pub ingest_min_interval_seconds: u64,
    pub ingest_user_agent: String,
    pub ingest_allowed_domains: String,
    pub ingest_policy_require_robots: bool,
    pub ingest_policy_deny_on_robots_error: bool,

    pub worker_concurrency: usize,
    pub worker_queue_capacity: usize,
    pub worker_poll_interval_secs: u64,

    pub retention_insights_days: u32,
    pub retention_snapshots_days: u32,
    pub retention_reports_days: u32,
    pub retention_search_days: u32,
    pub retention_audit_days: u32,

    pub intelligence_pipeline_timeout_secs: u64,

    pub api_write_key: String,
    pub api_cors_origins: String,

    pub sec_edgar_user_agent: String,
    pub fred_api_key: String,
    pub alpha_vantage_api_key: String,
    pub fmp_api_key: String,
    pub polygon_api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: env_string("DATABASE_URL", "sqlite::memory:"),
            job_broker_url: env_string("JOB_BROKER_URL", ""),

            ollama_host: env_string("OLLAMA_HOST", "http://localhost:11434"),
            ollama_embed_model: env_string("OLLAMA_EMBED_MODEL", "nomic-embed-text"),
            ollama_generate_model: env_string("OLLAMA_GENERATE_MODEL", "qwen2.5:1.5b"),
            embedding_vector_size: env_parsed("EMBEDDING_VECTOR_SIZE", 768),

            llm_provider: env_string("LLM_PROVIDER", "gemini"),
            llm_api_key: {
                let key = env_string("LLM_API_KEY", "");
                if key.is_empty() {
                    env_string("GEMINI_API_KEY", "")
                } else {
                    key
                }
            },
            llm_api_base_url: env_string("LLM_API_BASE_URL", ""),
            llm_cloud_model: env_string("LLM_CLOUD_MODEL", ""),
            llm_cache_ttl_seconds: env_parsed("LLM_CACHE_TTL_SECONDS", 900),
            ollama_max_concurrent: env_parsed("OLLAMA_MAX_CONCURRENT", 2),
            ollama_request_timeout_secs: env_parsed("OLLAMA_REQUEST_TIMEOUT", 120.0),

            ingest_min_interval_seconds: env_parsed("INGEST_MIN_INTERVAL_SECONDS", 60),
            ingest_user_agent: env_string("INGEST_USER_AGENT", "IntelBot/0.1 (+https://localhost)"),
            ingest_allowed_domains: env_string("INGEST_ALLOWED_DOMAINS", ""),
            ingest_policy_require_robots: env_parsed("INGEST_POLICY_REQUIRE_ROBOTS", true),
            ingest_policy_deny_on_robots_error: env_parsed(
                "INGEST_POLICY_DENY_ON_ROBOTS_ERROR",
                false,
            ),

            worker_concurrency: env_parsed("WORKER_CONCURRENCY", 4),
            worker_queue_capacity: env_parsed("WORKER_QUEUE_CAPACITY", 256),
            worker_poll_interval_secs: env_parsed("WORKER_POLL_INTERVAL_SECONDS", 300),

            retention_insights_days: env_parsed("RETENTION_INSIGHTS_DAYS", 90),
            retention_snapshots_days: env_parsed("RETENTION_SNAPSHOTS_DAYS", 90),
            retention_reports_days: env_parsed("RETENTION_REPORTS_DAYS", 180),
            retention_search_days: env_parsed("RETENTION_SEARCH_DAYS", 60),
            retention_audit_days: env_parsed("RETENTION_AUDIT_DAYS", 365),

            intelligence_pipeline_timeout_secs: env_parsed("INTELLIGENCE_PIPELINE_TIMEOUT", 600),

            api_write_key: env_string("API_WRITE_KEY", "intel-dev-key"),
            api_cors_origins: env_string(
                "API_CORS_ORIGINS",
                "http://localhost:3000,http://127.0.0.1:3000",
            ),

            sec_edgar_user_agent: env_string("SEC_EDGAR_USER_AGENT", "IntelAgent admin@localhost"),
            fred_api_key: env_string("FRED_API_KEY", ""),
            alpha_vantage_api_key: env_string("ALPHA_VANTAGE_API_KEY", ""),
            fmp_api_key: env_string("FMP_API_KEY", ""),
            polygon_api_key: env_string("POLYGON_API_KEY", ""),
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) then reads the environment. Call once at
    /// process start; pass the result down as `Arc<Settings>`.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::default()
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.api_cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn allowed_domains(&self) -> Vec<String> {
        self.ingest_allowed_domains
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn ollama_request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.ollama_request_timeout_secs)
    }

    pub fn intelligence_pipeline_timeout(&self) -> Duration {
        Duration::from_secs(self.intelligence_pipeline_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_origins_splits_and_trims() {
        let mut settings = Settings::default();
        settings.api_cors_origins = "http://a.test, http://b.test ,,".to_string();
        assert_eq!(
            settings.cors_origins(),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }

    #[test]
    fn empty_allowed_domains_means_allow_all() {
        let settings = Settings::default();
        assert!(settings.allowed_domains().is_empty());
    }
}
