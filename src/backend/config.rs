use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "rick-morty-tui";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_concurrent_fetches: usize,
    pub record_cache_capacity: usize,
    pub image_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://rickandmortyapi.com/api".to_string(),
            user_agent: format!("{}/{}", APP_NAME, env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 20,
            max_concurrent_fetches: 8,
            record_cache_capacity: 2048,
            image_cache_capacity: 512,
        }
    }
}

fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.json")
}

impl Config {
    /// Reads the user's config file, falling back to defaults when it is
    /// missing or unreadable. The file is never written.
    pub fn load() -> Self {
        Self::load_from(&get_config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Config::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => config.normalized(),
                Err(e) => {
                    log::warn!("ignoring malformed config {}: {e}", path.display());
                    Config::default()
                }
            },
            Err(e) => {
                log::warn!("could not read config {}: {e}", path.display());
                Config::default()
            }
        }
    }

    fn normalized(mut self) -> Self {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        // A zero permit semaphore would stall every fetch forever.
        self.max_concurrent_fetches = self.max_concurrent_fetches.max(1);
        self.record_cache_capacity = self.record_cache_capacity.max(1);
        self.image_cache_capacity = self.image_cache_capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.base_url, "https://rickandmortyapi.com/api");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "base_url": "http://localhost:8080/api/", "max_concurrent_fetches": 0 }}"#
        )
        .unwrap();

        let config = Config::load_from(file.path());
        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.max_concurrent_fetches, 1);
        assert_eq!(config.request_timeout_secs, 20);
        assert_eq!(config.image_cache_capacity, 512);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert_eq!(Config::load_from(file.path()), Config::default());
    }
}
