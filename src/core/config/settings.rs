use std::env;

use serde_json::Value;

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl ServerSettings {
    pub fn from_config(config: &Value) -> Self {
        let mut settings = Self::default();
        let Some(section) = config.get("server") else {
            return settings;
        };

        if let Some(host) = section.get("host").and_then(|v| v.as_str()) {
            settings.host = host.to_string();
        }
        if let Some(port) = section.get("port").and_then(|v| v.as_u64()) {
            settings.port = port as u16;
        }
        if let Some(origins) = section.get("cors_allowed_origins").and_then(|v| v.as_array()) {
            settings.cors_allowed_origins = origins
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| item.to_string())
                .collect();
        }

        settings
    }
}

/// Upstream model settings. The defaults target Gemini's OpenAI-compatible
/// endpoint with the models the corpus was embedded with.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub max_tokens: i32,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            api_key: None,
            chat_model: "gemini-1.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            temperature: 0.2,
            max_tokens: 500,
            presence_penalty: None,
            frequency_penalty: None,
            request_timeout_secs: 120,
        }
    }
}

impl LlmSettings {
    pub fn from_config(config: &Value) -> Self {
        let mut settings = Self::default();

        if let Some(section) = config.get("llm") {
            if let Some(url) = section.get("base_url").and_then(|v| v.as_str()) {
                settings.base_url = url.to_string();
            }
            if let Some(key) = section.get("api_key").and_then(|v| v.as_str()) {
                settings.api_key = Some(key.to_string());
            }
            if let Some(model) = section.get("chat_model").and_then(|v| v.as_str()) {
                settings.chat_model = model.to_string();
            }
            if let Some(model) = section.get("embedding_model").and_then(|v| v.as_str()) {
                settings.embedding_model = model.to_string();
            }
            if let Some(t) = section.get("temperature").and_then(|v| v.as_f64()) {
                settings.temperature = t;
            }
            if let Some(t) = section.get("max_tokens").and_then(|v| v.as_i64()) {
                settings.max_tokens = t as i32;
            }
            if let Some(p) = section.get("presence_penalty").and_then(|v| v.as_f64()) {
                settings.presence_penalty = Some(p);
            }
            if let Some(p) = section.get("frequency_penalty").and_then(|v| v.as_f64()) {
                settings.frequency_penalty = Some(p);
            }
            if let Some(secs) = section.get("request_timeout_secs").and_then(|v| v.as_u64()) {
                settings.request_timeout_secs = secs;
            }
        }

        if settings.api_key.is_none() {
            settings.api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        }

        settings
    }
}

/// Retrieval settings. Pool and cap sizes mirror the index the ingestion
/// job builds: a 768-dimension cosine index named `vector_index`.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub index: String,
    pub dimensions: usize,
    pub num_candidates: usize,
    pub limit: usize,
    pub fallback_patterns: Vec<String>,
    pub fallback_limit: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            index: "vector_index".to_string(),
            dimensions: 768,
            num_candidates: 20,
            limit: 10,
            fallback_patterns: vec![
                "elders.*quorum".to_string(),
                "quorum.*elders".to_string(),
            ],
            fallback_limit: 5,
        }
    }
}

impl RetrievalSettings {
    pub fn from_config(config: &Value) -> Self {
        let mut settings = Self::default();
        let Some(section) = config.get("retrieval") else {
            return settings;
        };

        if let Some(index) = section.get("index").and_then(|v| v.as_str()) {
            settings.index = index.to_string();
        }
        if let Some(dims) = section.get("dimensions").and_then(|v| v.as_u64()) {
            settings.dimensions = dims as usize;
        }
        if let Some(n) = section.get("num_candidates").and_then(|v| v.as_u64()) {
            settings.num_candidates = n as usize;
        }
        if let Some(n) = section.get("limit").and_then(|v| v.as_u64()) {
            settings.limit = n as usize;
        }
        if let Some(patterns) = section.get("fallback_patterns").and_then(|v| v.as_array()) {
            settings.fallback_patterns = patterns
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| item.to_string())
                .collect();
        }
        if let Some(n) = section.get("fallback_limit").and_then(|v| v.as_u64()) {
            settings.fallback_limit = n as usize;
        }

        settings
    }
}
