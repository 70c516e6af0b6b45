use crate::{
    domain::Viewer,
    ports::{AppConfig, ConfigError, ConfigResult, ConfigStore, DEFAULT_API_BASE_URL},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub const TOKEN_ENV_VAR: &str = "AGORA_TOKEN";

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    api_base_url: Option<String>,
    viewer_id: Option<u64>,
    viewer_is_staff: Option<bool>,
    cache_ttl_seconds: Option<u64>,
}

/// JSON config under the user's config dir; the token is kept apart from it,
/// in the OS keyring when one is available.
pub struct FileConfigStore {
    config_path: PathBuf,
    keyring_service: Option<String>,
    token_env_var: String,
}

impl FileConfigStore {
    pub fn new() -> ConfigResult<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            ConfigError::ReadError("Cannot determine config directory".to_string())
        })?;

        Ok(Self {
            config_path: config_dir.join("agora-cli").join("config.json"),
            keyring_service: Some("agora-cli".to_string()),
            token_env_var: TOKEN_ENV_VAR.to_string(),
        })
    }

    /// A store rooted at `config_path` that never touches the keyring.
    #[cfg(test)]
    pub fn at(config_path: impl Into<PathBuf>, token_env_var: &str) -> Self {
        Self {
            config_path: config_path.into(),
            keyring_service: None,
            token_env_var: token_env_var.to_string(),
        }
    }

    async fn ensure_config_dir(&self) -> ConfigResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }
        Ok(())
    }

    fn token_file_path(&self) -> PathBuf {
        self.config_path.with_file_name(".token")
    }

    async fn get_token_from_file(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(self.token_file_path()).await {
            Ok(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
            _ => Ok(None),
        }
    }

    async fn set_token_in_file(&self, token: &str) -> ConfigResult<()> {
        self.ensure_config_dir().await?;
        let token_path = self.token_file_path();
        fs::write(&token_path, token)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&token_path)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&token_path, perms)
                .await
                .map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        Ok(())
    }

    fn keyring_entry(&self) -> Option<keyring::Entry> {
        let service = self.keyring_service.as_deref()?;
        match keyring::Entry::new(service, "api_token") {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Keyring not available ({}), falling back to file storage", e);
                None
            }
        }
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load_config(&self) -> ConfigResult<AppConfig> {
        let config_file = match fs::read_to_string(&self.config_path).await {
            Ok(content) => serde_json::from_str::<ConfigFile>(&content)
                .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?,
            Err(_) => ConfigFile::default(),
        };

        // keyring, then the token file, then the environment
        let mut api_token = self.get_api_token().await?;
        if api_token.is_none() {
            api_token = std::env::var(&self.token_env_var)
                .ok()
                .filter(|t| !t.is_empty());
        }

        Ok(AppConfig {
            api_token,
            api_base_url: config_file
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            viewer: config_file
                .viewer_id
                .map(|id| Viewer::new(id, config_file.viewer_is_staff.unwrap_or(false))),
            cache_ttl_seconds: config_file.cache_ttl_seconds.unwrap_or(300),
        })
    }

    async fn save_config(&self, config: &AppConfig) -> ConfigResult<()> {
        self.ensure_config_dir().await?;

        let config_file = ConfigFile {
            api_base_url: Some(config.api_base_url.clone()),
            viewer_id: config.viewer.map(|v| v.id.0),
            viewer_is_staff: config.viewer.map(|v| v.is_staff),
            cache_ttl_seconds: Some(config.cache_ttl_seconds),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .await
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        // The token is only ever stored through set_api_token.
        Ok(())
    }

    async fn get_api_token(&self) -> ConfigResult<Option<String>> {
        if let Some(entry) = self.keyring_entry() {
            match entry.get_password() {
                Ok(token) => return Ok(Some(token)),
                Err(keyring::Error::NoEntry) => {}
                Err(e) => {
                    tracing::warn!("Keyring read failed ({}), falling back to file storage", e);
                }
            }
        }

        self.get_token_from_file().await
    }

    async fn set_api_token(&self, token: &str) -> ConfigResult<()> {
        if let Some(entry) = self.keyring_entry() {
            match entry.set_password(token) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!("Failed to store in keyring ({}), falling back to file storage", e);
                }
            }
        }

        self.set_token_in_file(token).await
    }
}
