//! Configuration service for fence-lsp

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::config::{FenceConfig, LanguageConfig, LspConfig};

const REQUEST_TIMEOUT_ENV: &str = "FENCE_LSP_REQUEST_TIMEOUT_MS";

#[async_trait]
pub trait ConfigService: Send + Sync {
    /// Global config overlaid with the workspace file and environment
    async fn load(&self) -> Result<FenceConfig, ConfigError>;
    fn config_path(&self, global: bool) -> PathBuf;
}

/// On-disk shape; `lsp` stays optional so a workspace file without it keeps the global one
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    lsp: Option<LspConfig>,
    #[serde(default)]
    languages: Vec<LanguageConfig>,
}

pub struct DefaultConfigService {
    root: PathBuf,
    global_path: PathBuf,
}

impl DefaultConfigService {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            global_path: Self::global_config_path(),
        }
    }

    pub fn with_global_path(mut self, path: PathBuf) -> Self {
        self.global_path = path;
        self
    }

    fn global_config_path() -> PathBuf {
        // XDG standard: ~/.config/fence-lsp/config.toml
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fence-lsp")
            .join("config.toml")
    }

    fn project_config_path(&self) -> PathBuf {
        self.root.join(".fence-lsp").join("config.toml")
    }

    async fn load_from_path(path: &Path) -> Result<ConfigFile, ConfigError> {
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(
            "Loaded config {} ({} languages)",
            path.display(),
            file.languages.len()
        );
        Ok(file)
    }
}

#[async_trait]
impl ConfigService for DefaultConfigService {
    async fn load(&self) -> Result<FenceConfig, ConfigError> {
        let global = Self::load_from_path(&self.global_path).await?;
        let project = Self::load_from_path(&self.project_config_path()).await?;

        let config = merge_config(global, project);
        let config = apply_env_overrides(config, |key| std::env::var(key).ok())?;
        validate(&config)?;
        Ok(config)
    }

    fn config_path(&self, global: bool) -> PathBuf {
        if global {
            self.global_path.clone()
        } else {
            self.project_config_path()
        }
    }
}

/// Workspace `[lsp]` replaces the global one; language tables accumulate
fn merge_config(base: ConfigFile, overlay: ConfigFile) -> FenceConfig {
    let mut languages = base.languages;
    languages.extend(overlay.languages);

    FenceConfig {
        lsp: overlay.lsp.or(base.lsp).unwrap_or_default(),
        languages,
    }
}

fn apply_env_overrides(
    mut config: FenceConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<FenceConfig, ConfigError> {
    if let Some(val) = lookup(REQUEST_TIMEOUT_ENV) {
        config.lsp.request_timeout_ms = val.parse().map_err(|_| ConfigError::InvalidValue {
            key: REQUEST_TIMEOUT_ENV.to_string(),
            message: format!("expected milliseconds, got '{val}'"),
        })?;
    }
    Ok(config)
}

fn validate(config: &FenceConfig) -> Result<(), ConfigError> {
    let timeouts = [
        ("lsp.request_timeout_ms", config.lsp.request_timeout_ms),
        ("lsp.init_timeout_ms", config.lsp.init_timeout_ms),
        ("lsp.shutdown_timeout_ms", config.lsp.shutdown_timeout_ms),
    ];
    for (key, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
    }

    for language in &config.languages {
        if language.id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "languages.id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if language.command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("languages.{}.command", language.id),
                message: "must not be empty".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn write(path: &Path, content: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(path, content).await.unwrap();
    }

    fn service(dir: &TempDir) -> DefaultConfigService {
        DefaultConfigService::new(dir.path())
            .with_global_path(dir.path().join("global").join("config.toml"))
    }

    #[tokio::test]
    async fn test_missing_files_give_defaults() {
        let dir = TempDir::new().unwrap();
        let config = service(&dir).load().await.unwrap();
        assert_eq!(config.lsp, LspConfig::default());
        assert!(config.languages.is_empty());
    }

    #[tokio::test]
    async fn test_workspace_overlays_global() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        write(
            &service.config_path(true),
            r#"
[lsp]
request_timeout_ms = 5000

[[languages]]
id = "zig"
command = "zls"
"#,
        )
        .await;
        write(
            &service.config_path(false),
            r#"
[[languages]]
id = "python"
command = "pylsp"
"#,
        )
        .await;

        let config = service.load().await.unwrap();
        // No [lsp] in the workspace file, so the global one survives
        assert_eq!(config.lsp.request_timeout_ms, 5000);
        let ids: Vec<_> = config.languages.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["zig", "python"]);
    }

    #[tokio::test]
    async fn test_workspace_lsp_replaces_global() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        write(&service.config_path(true), "[lsp]\nrequest_timeout_ms = 5000\n").await;
        write(&service.config_path(false), "[lsp]\ninit_timeout_ms = 1000\n").await;

        let config = service.load().await.unwrap();
        assert_eq!(config.lsp.init_timeout_ms, 1000);
        assert_eq!(config.lsp.request_timeout_ms, 10_000);
    }

    #[tokio::test]
    async fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        write(&service.config_path(false), "[[languages]]\nid = \n").await;

        match service.load().await {
            Err(ConfigError::Parse { path, .. }) => assert!(path.ends_with("config.toml")),
            other => panic!("expected parse error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        write(&service.config_path(false), "[lsp]\nrequest_timeout_ms = 0\n").await;

        assert!(matches!(
            service.load().await,
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_env_override() {
        let config = apply_env_overrides(FenceConfig::default(), |key| {
            (key == REQUEST_TIMEOUT_ENV).then(|| "250".to_string())
        })
        .unwrap();
        assert_eq!(config.lsp.request_timeout_ms, 250);

        let err = apply_env_overrides(FenceConfig::default(), |_| Some("soon".to_string()));
        assert!(err.is_err());
    }
}
