//! Filesystem layout: where the config, secrets, passage database, and logs
//! live. `QUORUM_ROOT` and `QUORUM_DATA_DIR` override discovery.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = Self::project_root();
        let user_data_dir = Self::user_data_dir(&project_root);

        let paths = AppPaths {
            log_dir: user_data_dir.join("logs"),
            db_path: user_data_dir.join("passages.db"),
            secrets_path: user_data_dir.join("secrets.yml"),
            project_root,
            user_data_dir,
        };
        let _ = fs::create_dir_all(&paths.user_data_dir);
        let _ = fs::create_dir_all(&paths.log_dir);
        paths
    }

    fn project_root() -> PathBuf {
        if let Ok(root) = env::var("QUORUM_ROOT") {
            return PathBuf::from(root);
        }
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        if manifest_dir.join("config.yml").exists() {
            manifest_dir
        } else {
            env::current_dir().unwrap_or(manifest_dir)
        }
    }

    /// Dev builds keep data next to the sources; release builds use the
    /// platform's per-user data directory.
    fn user_data_dir(project_root: &Path) -> PathBuf {
        if let Ok(dir) = env::var("QUORUM_DATA_DIR") {
            return PathBuf::from(dir);
        }
        if cfg!(debug_assertions) {
            return project_root.to_path_buf();
        }

        if cfg!(target_os = "windows") {
            let base = env::var("LOCALAPPDATA")
                .or_else(|_| env::var("USERPROFILE"))
                .unwrap_or_else(|_| ".".into());
            PathBuf::from(base).join("QuorumBackend")
        } else if cfg!(target_os = "macos") {
            home_dir().join("Library/Application Support/QuorumBackend")
        } else {
            match env::var("XDG_DATA_HOME") {
                Ok(xdg) => PathBuf::from(xdg).join("quorum-backend"),
                Err(_) => home_dir().join(".local/share/quorum-backend"),
            }
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn home_dir() -> PathBuf {
    for var in ["HOME", "USERPROFILE"] {
        if let Ok(home) = env::var(var) {
            return PathBuf::from(home);
        }
    }
    PathBuf::from(".")
}
