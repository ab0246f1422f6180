// SPDX-License-Identifier: AGPL-3.0
// Bazaar Core - Configuration
//
// Configuration is one JSON document in the platform config directory,
// written through the same file backend as app data. Missing fields take
// their defaults.

use crate::store::{load_json, save_json, FileStore};
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::RwLock;

/// Which key-value backend the services run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// JSON files in the data directory
    File,
    /// Process memory only, for previews and tests
    Memory,
}

/// Identity provider the UI signs in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderKind {
    GitHub,
    Google,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_storage")]
    pub storage: StorageKind,
    /// Overrides the platform data directory for the file backend
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_identity_provider")]
    pub identity_provider: IdentityProviderKind,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    #[serde(default = "default_google_userinfo_url")]
    pub google_userinfo_url: String,
    /// Public catalog used for remote seeding; bundled defaults when unset
    #[serde(default)]
    pub catalog_url: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_storage() -> StorageKind {
    StorageKind::File
}

fn default_identity_provider() -> IdentityProviderKind {
    IdentityProviderKind::GitHub
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_google_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v3/userinfo".to_string()
}

fn default_user_agent() -> String {
    format!("bazaar/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            data_dir: None,
            identity_provider: default_identity_provider(),
            github_api_url: default_github_api_url(),
            google_userinfo_url: default_google_userinfo_url(),
            catalog_url: None,
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.request_timeout_secs == 0 {
            return Err(AppError::InvalidConfig(
                "requestTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        let endpoints = [
            ("githubApiUrl", Some(&self.github_api_url)),
            ("googleUserinfoUrl", Some(&self.google_userinfo_url)),
            ("catalogUrl", self.catalog_url.as_ref()),
        ];
        for (field, value) in endpoints {
            if let Some(url) = value {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(AppError::InvalidConfig(format!(
                        "{} must be an http(s) URL, got {:?}",
                        field, url
                    )));
                }
            }
        }
        Ok(())
    }
}

const CONFIG_KEY: &str = "config";

/// Current configuration, kept as `config.json` in a [`FileStore`]
pub struct ConfigStore {
    config: RwLock<AppConfig>,
    files: FileStore,
}

impl ConfigStore {
    /// Load from the platform config directory
    pub async fn new() -> Result<Self, AppError> {
        let dirs = directories::ProjectDirs::from("com", "bazaar", "marketplace")
            .ok_or_else(|| AppError::FileIo("Could not determine config directory".to_string()))?;
        Self::open(dirs.config_dir()).await
    }

    /// Load `config.json` from `dir`, writing defaults there on first run.
    /// An unreadable document is logged and replaced by defaults in memory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let files = FileStore::open(dir).await?;

        let config = match load_json::<AppConfig>(&files, CONFIG_KEY).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::info!("No config file found, writing defaults");
                let config = AppConfig::default();
                save_json(&files, CONFIG_KEY, &config).await?;
                config
            }
            Err(AppError::Serialization(e)) => {
                tracing::warn!("Failed to parse config, using defaults: {}", e);
                AppConfig::default()
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            config: RwLock::new(config),
            files,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.files.dir().join(format!("{}.json", CONFIG_KEY))
    }

    pub async fn get(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Validate and persist `new_config`, then make it current
    pub async fn update(&self, new_config: AppConfig) -> Result<(), AppError> {
        new_config.validate()?;

        let mut config = self.config.write().await;
        save_json(&self.files, CONFIG_KEY, &new_config)
            .await
            .inspect_err(|e| tracing::error!("Failed to persist config: {}", e))?;
        *config = new_config;
        tracing::info!("Config persisted");
        Ok(())
    }
}
