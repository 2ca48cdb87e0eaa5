use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const BACKEND_URL_ENV: &str = "STACKS_BACKEND_URL";
const APP_DIR: &str = "stacks-chat";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub backend_url: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)
            .map_err(|e| anyhow!("Invalid config file {:?}: {}", config_path, e))?;
        Ok(config)
    }

    /// Flag value, then the environment, then the config file, then the default.
    pub fn resolve_backend_url(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| std::env::var(BACKEND_URL_ENV).ok().filter(|v| !v.is_empty()))
            .or_else(|| self.backend_url.clone())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
    }

    pub fn resolve_data_dir(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = flag.map(Path::to_path_buf).or_else(|| self.data_dir.clone()) {
            return Ok(dir);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join(APP_DIR))
    }

    pub fn storage_path(data_dir: &Path) -> PathBuf {
        data_dir.join("local-storage.json")
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR).join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_load_reads_written_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            backend_url: Some("http://example.test:8080".to_string()),
            data_dir: Some(dir.path().join("data")),
        };

        fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "backend_url = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_flag_wins_over_config() {
        let config = Config {
            backend_url: Some("http://from-config".to_string()),
            data_dir: None,
        };
        assert_eq!(
            config.resolve_backend_url(Some("http://from-flag")),
            "http://from-flag"
        );
    }

    #[test]
    fn test_data_dir_flag_and_config() {
        let config = Config {
            backend_url: None,
            data_dir: Some(PathBuf::from("/tmp/from-config")),
        };
        assert_eq!(
            config.resolve_data_dir(Some(Path::new("/tmp/from-flag"))).unwrap(),
            PathBuf::from("/tmp/from-flag")
        );
        assert_eq!(
            config.resolve_data_dir(None).unwrap(),
            PathBuf::from("/tmp/from-config")
        );
        assert_eq!(
            Config::storage_path(Path::new("/tmp/x")),
            PathBuf::from("/tmp/x/local-storage.json")
        );
    }
}
