use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use super::paths::AppPaths;
use crate::core::errors::ApiError;

/// Loads the merged application configuration.
///
/// `config.yml` holds the public settings, `secrets.yml` holds credentials.
/// Both are optional; missing files merge as empty objects so the defaults
/// in the typed settings apply.
#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("QUORUM_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        // A copy in the data dir takes precedence over the repo default.
        let user_copy = self.paths.user_data_dir.join("config.yml");
        if user_copy.exists() {
            user_copy
        } else {
            self.paths.project_root.join("config.yml")
        }
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public = load_yaml_file(&self.config_path());
        let secrets = load_yaml_file(&self.secrets_path());
        Ok(deep_merge(&public, &secrets))
    }
}

fn empty_mapping() -> Value {
    Value::Object(Map::new())
}

fn load_yaml_file(path: &Path) -> Value {
    let Ok(raw) = fs::read_to_string(path) else {
        return empty_mapping();
    };
    match serde_yaml::from_str::<Value>(&raw) {
        Ok(parsed) if parsed.is_object() => parsed,
        Ok(_) => {
            warn!("Ignoring {}: top level is not a mapping", path.display());
            empty_mapping()
        }
        Err(err) => {
            warn!("Ignoring {}: {}", path.display(), err);
            empty_mapping()
        }
    }
}

fn deep_merge(base: &Value, overlay: &Value) -> Value {
    let (Value::Object(base_map), Value::Object(overlay_map)) = (base, overlay) else {
        // Scalars and arrays replace wholesale.
        return overlay.clone();
    };

    let mut merged = base_map.clone();
    for (key, value) in overlay_map {
        match merged.get_mut(key) {
            Some(existing) => {
                let combined = deep_merge(existing, value);
                *existing = combined;
            }
            None => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_overlays_nested_sections_and_replaces_arrays() {
        let public = json!({
            "server": { "port": 8080 },
            "llm": { "chat_model": "gemini-1.5-flash", "temperature": 0.2 },
            "retrieval": { "fallback_patterns": ["elders.*quorum"] }
        });
        let secrets = json!({
            "llm": { "api_key": "real-key" },
            "retrieval": { "fallback_patterns": ["quorum.*elders"] }
        });

        let merged = deep_merge(&public, &secrets);

        assert_eq!(
            merged,
            json!({
                "server": { "port": 8080 },
                "llm": {
                    "chat_model": "gemini-1.5-flash",
                    "temperature": 0.2,
                    "api_key": "real-key"
                },
                "retrieval": { "fallback_patterns": ["quorum.*elders"] }
            })
        );
    }

    #[test]
    fn load_yaml_file_tolerates_missing_and_non_mapping_files() {
        let missing = load_yaml_file(Path::new("/nonexistent/config.yml"));
        assert_eq!(missing, json!({}));

        let tmp = std::env::temp_dir().join(format!(
            "quorum-config-test-{}.yml",
            uuid::Uuid::new_v4()
        ));
        fs::write(&tmp, "- just\n- a\n- list\n").expect("write temp yaml");
        let non_mapping = load_yaml_file(&tmp);
        assert_eq!(non_mapping, json!({}));
        let _ = fs::remove_file(&tmp);
    }

    #[test]
    fn secrets_override_public_values() {
        let tmp = std::env::temp_dir().join(format!("quorum-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&tmp).expect("create temp dir");
        fs::write(
            tmp.join("config.yml"),
            "llm:\n  chat_model: gemini-1.5-flash\n  api_key: placeholder\n",
        )
        .expect("write config");
        fs::write(tmp.join("secrets.yml"), "llm:\n  api_key: real-key\n").expect("write secrets");

        let paths = AppPaths {
            project_root: tmp.clone(),
            user_data_dir: tmp.clone(),
            log_dir: tmp.join("logs"),
            db_path: tmp.join("passages.db"),
            secrets_path: tmp.join("secrets.yml"),
        };
        let service = ConfigService::new(Arc::new(paths));

        let merged = service.load_config().expect("load config");
        assert_eq!(merged["llm"]["chat_model"], json!("gemini-1.5-flash"));
        assert_eq!(merged["llm"]["api_key"], json!("real-key"));

        let _ = fs::remove_dir_all(&tmp);
    }
}
