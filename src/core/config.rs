use crate::core::pagination::PageSize;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://agroapi-qwvb.onrender.com/api/";
pub const DEFAULT_REPORT_TITLE: &str = "AgroMarket - Market prices";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

fn default_page_size() -> usize {
    PageSize::default().get()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    pub export_dir: Option<String>,
    pub data_path: Option<String>,
    pub report_title: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api: ApiConfig::default(),
            page_size: default_page_size(),
            export_dir: None,
            data_path: None,
            report_title: None,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to built-in defaults when
    /// it does not exist yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "agromarket", "agromarket")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "agromarket", "agromarket")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn session_file(&self) -> Result<PathBuf> {
        Ok(self.default_data_path()?.join("session.json"))
    }

    pub fn page_size(&self) -> Result<PageSize> {
        PageSize::new(self.page_size).context("Invalid page_size in configuration")
    }

    pub fn report_title(&self) -> &str {
        self.report_title.as_deref().unwrap_or(DEFAULT_REPORT_TITLE)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
api:
  base_url: "http://example.com/api/"
page_size: 25
export_dir: "/tmp/exports"
report_title: "Weekly prices"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.api.base_url, "http://example.com/api/");
        assert_eq!(config.page_size().unwrap().get(), 25);
        assert_eq!(config.export_dir.as_deref(), Some("/tmp/exports"));
        assert_eq!(config.report_title(), "Weekly prices");
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.report_title(), DEFAULT_REPORT_TITLE);
    }

    #[test]
    fn test_invalid_page_size_is_rejected() {
        let config: AppConfig = serde_yaml::from_str("page_size: 7").unwrap();
        assert!(config.page_size().is_err());
    }

    #[test]
    fn test_custom_data_path() {
        let config: AppConfig = serde_yaml::from_str("data_path: /tmp/agro").unwrap();
        assert_eq!(
            config.session_file().unwrap(),
            PathBuf::from("/tmp/agro/session.json")
        );
    }
}
