use intel_core::Settings;

/// Resolved generation backend for one request: which API to hit and with
/// what model, translated from `Settings` the way the teacher's Python
/// original resolves LiteLLM kwargs from the same settings object. There is
/// no Rust LiteLLM equivalent in the dependency stack, so this crate talks
/// to each backend's native HTTP API directly with `reqwest` instead of
/// routing through a unifying LLM client library.
#[derive(Debug, Clone)]
pub enum Backend {
    Ollama { host: String, model: String },
    Cloud { base_url: String, model: String, api_key: String },
}

/// (default_base_url, default_model) per cloud provider name, mirroring
/// `providers.py::_PROVIDER_DEFAULTS`.
fn provider_defaults(provider: &str) -> (&'static str, &'static str) {
    match provider {
        "gemini" => ("https://generativelanguage.googleapis.com/v1beta/openai", "gemini-2.0-flash"),
        "claude" | "anthropic" => ("https://api.anthropic.com/v1", "claude-3-5-sonnet-20241022"),
        "openai" => ("https://api.openai.com/v1", "gpt-4o-mini"),
        "groq" => ("https://api.groq.com/openai/v1", "llama-3.1-8b-instant"),
        "openrouter" => ("https://openrouter.ai/api/v1", "meta-llama/llama-3.1-8b-instruct:free"),
        "together" => ("https://api.together.xyz/v1", "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo"),
        _ => ("", ""),
    }
}

pub fn is_cloud_provider(settings: &Settings) -> bool {
    let provider = settings.llm_provider.to_lowercase();
    !settings.llm_api_key.is_empty() && provider != "ollama" && !provider.is_empty()
}

pub fn resolve_backend(settings: &Settings, model_override: Option<&str>) -> Backend {
    if is_cloud_provider(settings) {
        let provider = settings.llm_provider.to_lowercase();
        let (default_base, default_model) = provider_defaults(&provider);
        let base_url = if settings.llm_api_base_url.is_empty() {
            default_base.to_string()
        } else {
            settings.llm_api_base_url.clone()
        };
        let model = if settings.llm_cloud_model.is_empty() {
            default_model.to_string()
        } else {
            settings.llm_cloud_model.clone()
        };
        Backend::Cloud { base_url, model, api_key: settings.llm_api_key.clone() }
    } else {
        let model = model_override.unwrap_or(&settings.ollama_generate_model).to_string();
        Backend::Ollama { host: settings.ollama_host.clone(), model }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(provider: &str, api_key: &str) -> Settings {
        let mut settings = Settings::default();
        settings.llm_provider = provider.to_string();
        settings.llm_api_key = api_key.to_string();
        settings
    }

    #[test]
    fn empty_api_key_falls_back_to_ollama() {
        let settings = settings_with("gemini", "");
        assert!(matches!(resolve_backend(&settings, None), Backend::Ollama { .. }));
    }

    #[test]
    fn configured_cloud_provider_resolves_to_cloud_backend() {
        let settings = settings_with("groq", "key-123");
        match resolve_backend(&settings, None) {
            Backend::Cloud { model, .. } => assert_eq!(model, "llama-3.1-8b-instant"),
            Backend::Ollama { .. } => panic!("expected cloud backend"),
        }
    }

    #[test]
    fn explicit_provider_name_of_ollama_never_counts_as_cloud() {
        let settings = settings_with("ollama", "key-123");
        assert!(!is_cloud_provider(&settings));
    }
}
