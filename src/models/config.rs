//! Configuration model for fence-lsp
//!
//! Loaded from the global config and the workspace-local override file.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::language::{Capability, LangEntry, LaunchDescriptor};

/// fence-lsp configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FenceConfig {
    #[serde(default)]
    pub lsp: LspConfig,

    /// Language entries merged over the built-in registry
    #[serde(default)]
    pub languages: Vec<LanguageConfig>,
}

/// Backend timing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LspConfig {
    #[serde(default = "defaults::request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "defaults::init_timeout_ms")]
    pub init_timeout_ms: u64,

    #[serde(default = "defaults::shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for LspConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: defaults::request_timeout_ms(),
            init_timeout_ms: defaults::init_timeout_ms(),
            shutdown_timeout_ms: defaults::shutdown_timeout_ms(),
        }
    }
}

mod defaults {
    pub fn request_timeout_ms() -> u64 {
        10_000
    }
    pub fn init_timeout_ms() -> u64 {
        30_000
    }
    pub fn shutdown_timeout_ms() -> u64 {
        2_000
    }
    pub fn capabilities() -> Vec<super::Capability> {
        vec![super::Capability::Completion, super::Capability::Hover]
    }
}

/// One `[[languages]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub id: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default = "defaults::capabilities")]
    pub capabilities: Vec<Capability>,

    #[serde(default)]
    pub extension: Option<String>,

    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub fallback: Option<FallbackConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl From<LanguageConfig> for LangEntry {
    fn from(config: LanguageConfig) -> Self {
        let fallback = config.fallback.map(|f| LaunchDescriptor {
            command: f.command,
            args: f.args,
            primary: false,
        });

        LangEntry {
            id: config.id.to_lowercase(),
            aliases: config
                .aliases
                .iter()
                .map(|a| a.to_lowercase())
                .collect::<BTreeSet<_>>(),
            capabilities: config.capabilities.into_iter().collect(),
            extension: config.extension,
            launch: LaunchDescriptor {
                command: config.command,
                args: config.args,
                primary: true,
            },
            fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FenceConfig::default();
        assert_eq!(config.lsp.request_timeout_ms, 10_000);
        assert_eq!(config.lsp.init_timeout_ms, 30_000);
        assert!(config.languages.is_empty());
    }

    #[test]
    fn test_language_table_to_entry() {
        let config: FenceConfig = toml::from_str(
            r#"
            [lsp]
            request_timeout_ms = 500

            [[languages]]
            id = "Python"
            aliases = ["PY", "py3"]
            command = "pyright-langserver"
            args = ["--stdio"]

            [languages.fallback]
            command = "pylsp"
            "#,
        )
        .unwrap();

        assert_eq!(config.lsp.request_timeout_ms, 500);
        assert_eq!(config.lsp.init_timeout_ms, 30_000);

        let entry = LangEntry::from(config.languages[0].clone());
        assert_eq!(entry.id, "python");
        assert!(entry.aliases.contains("py"));
        assert!(entry.declares(Capability::Hover));
        assert!(entry.launch.primary);
        let fallback = entry.fallback.as_ref().unwrap();
        assert_eq!(fallback.command, "pylsp");
        assert!(!fallback.primary);
    }
}
