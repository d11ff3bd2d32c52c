//! Hint Generator
//!
//! Human-readable explanations for fences that get no language
//! intelligence: either the tag is not registered, or the backend for the
//! language could not be started.

use std::fmt;

use serde::Serialize;

use crate::infra::lsp::{FailureKind, LanguageRegistry, SpawnFailure};
use crate::models::LangEntry;

const MAX_SUGGESTIONS: usize = 3;

/// Common informal tags and the canonical id they usually mean
const COMMON_ALIASES: &[(&str, &str)] = &[
    ("py", "python"),
    ("python3", "python"),
    ("golang", "go"),
    ("sh", "bash"),
    ("shell", "bash"),
    ("zsh", "bash"),
    ("console", "bash"),
    ("c++", "cpp"),
    ("cxx", "cpp"),
    ("c", "cpp"),
    ("js", "typescript"),
    ("jsx", "typescript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("javascript", "typescript"),
    ("node", "typescript"),
    ("rs", "rust"),
    ("rb", "ruby"),
    ("yml", "yaml"),
    ("jsonc", "json"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOS
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstallInstructions {
    pub macos: &'static str,
    pub linux: &'static str,
    pub windows: &'static str,
}

impl InstallInstructions {
    const fn everywhere(command: &'static str) -> Self {
        Self {
            macos: command,
            linux: command,
            windows: command,
        }
    }

    pub fn for_platform(&self, platform: Platform) -> &'static str {
        match platform {
            Platform::MacOS => self.macos,
            Platform::Linux => self.linux,
            Platform::Windows => self.windows,
        }
    }
}

/// Install instructions for the built-in backends
pub fn install_instructions(language: &str) -> Option<InstallInstructions> {
    let instructions = match language {
        "python" => InstallInstructions::everywhere(
            "npm install -g pyright  (or: pip install python-lsp-server)",
        ),
        "typescript" => InstallInstructions::everywhere(
            "npm install -g typescript-language-server typescript",
        ),
        "rust" => InstallInstructions::everywhere("rustup component add rust-analyzer"),
        "go" => InstallInstructions::everywhere("go install golang.org/x/tools/gopls@latest"),
        "bash" => InstallInstructions::everywhere("npm install -g bash-language-server"),
        "lua" => InstallInstructions {
            macos: "brew install lua-language-server",
            linux: "Download from https://github.com/LuaLS/lua-language-server/releases",
            windows: "Download from https://github.com/LuaLS/lua-language-server/releases",
        },
        "cpp" => InstallInstructions {
            macos: "brew install llvm",
            linux: "apt install clangd",
            windows: "Download from https://clangd.llvm.org/installation",
        },
        "ruby" => InstallInstructions::everywhere("gem install ruby-lsp"),
        "json" => InstallInstructions::everywhere("npm install -g vscode-langservers-extracted"),
        "yaml" => InstallInstructions::everywhere("npm install -g yaml-language-server"),
        _ => return None,
    };
    Some(instructions)
}

/// Explanation for a fence without language intelligence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hint {
    UnknownLanguage {
        tag: String,
        suggestions: Vec<String>,
        registered: Vec<String>,
    },
    BackendUnavailable {
        language: String,
        /// Command lines that were tried, primary first
        commands: Vec<String>,
        reason: String,
        install: String,
    },
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLanguage {
                tag,
                suggestions,
                registered,
            } => {
                write!(f, "No language server is registered for `{tag}`.")?;
                if !suggestions.is_empty() {
                    write!(f, " Did you mean: {}?", quoted(suggestions))?;
                }
                write!(f, "\n\nRegistered languages: {}.", quoted(registered))?;
                write!(
                    f,
                    "\nAdd a `[[languages]]` entry to .fence-lsp/config.toml to register `{tag}`."
                )
            }
            Self::BackendUnavailable {
                language,
                commands,
                reason,
                install,
            } => {
                write!(f, "The {language} language server is not available.")?;
                write!(f, "\n\nTried: {}", quoted(commands))?;
                write!(f, "\nReason: {reason}")?;
                write!(f, "\n\nInstall: {install}")
            }
        }
    }
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("`{item}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Hint for a tag the registry does not know
pub fn unknown_language(tag: &str, registry: &LanguageRegistry) -> Hint {
    Hint::UnknownLanguage {
        tag: tag.to_string(),
        suggestions: suggest(tag, registry),
        registered: registry.list_ids(),
    }
}

/// Alias table first, then registered ids sharing the first letter
fn suggest(tag: &str, registry: &LanguageRegistry) -> Vec<String> {
    let tag = tag.trim().to_lowercase();
    let mut suggestions: Vec<String> = Vec::new();

    for (alias, canonical) in COMMON_ALIASES {
        if *alias == tag && registry.resolve(canonical).is_some() {
            suggestions.push(canonical.to_string());
        }
    }

    if let Some(first) = tag.chars().next() {
        for id in registry.list_ids() {
            if suggestions.len() >= MAX_SUGGESTIONS {
                break;
            }
            if id.starts_with(first) && !suggestions.contains(&id) {
                suggestions.push(id);
            }
        }
    }

    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

/// Hint for a registered language whose backend failed to start
pub fn backend_unavailable(entry: &LangEntry, failure: &SpawnFailure) -> Hint {
    backend_unavailable_on(entry, failure, Platform::current())
}

fn backend_unavailable_on(entry: &LangEntry, failure: &SpawnFailure, platform: Platform) -> Hint {
    let commands = if failure.attempted.is_empty() {
        entry
            .launch_plan()
            .into_iter()
            .map(|launch| launch.command_line())
            .collect()
    } else {
        failure.attempted.clone()
    };

    let install = match install_instructions(&entry.id) {
        // Built-in instructions only apply to the built-in command
        Some(instructions) if is_builtin_launch(entry) => {
            instructions.for_platform(platform).to_string()
        }
        _ => format!(
            "Make sure `{}` is installed and on your PATH, or set `command` for `{}` in .fence-lsp/config.toml.",
            entry.launch.command, entry.id
        ),
    };

    let reason = match failure.kind {
        FailureKind::Handshake => format!(
            "the server started but failed to initialize ({})",
            failure.reason
        ),
        FailureKind::Spawn | FailureKind::Closed => failure.reason.clone(),
    };

    Hint::BackendUnavailable {
        language: entry.id.clone(),
        commands,
        reason,
        install,
    }
}

fn is_builtin_launch(entry: &LangEntry) -> bool {
    crate::infra::lsp::registry::defaults()
        .iter()
        .any(|builtin| builtin.id == entry.id && builtin.launch.command == entry.launch.command)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::models::LaunchDescriptor;

    fn failure(language: &str, attempted: &[&str]) -> SpawnFailure {
        SpawnFailure {
            language: language.to_string(),
            kind: FailureKind::Spawn,
            reason: "No such file or directory (os error 2)".to_string(),
            attempted: attempted.iter().map(|s| s.to_string()).collect(),
            failed_at: SystemTime::now(),
        }
    }

    #[test]
    fn test_suggestions_from_alias_table() {
        let mut registry = LanguageRegistry::new();
        registry.merge([LangEntry::new("go", LaunchDescriptor::primary("gopls", &[]))]);

        let suggestions = suggest("golang", &registry);
        assert_eq!(suggestions, vec!["go".to_string()]);
    }

    #[test]
    fn test_suggestions_by_first_letter() {
        let registry = LanguageRegistry::with_defaults();
        let suggestions = suggest("rexx", &registry);
        assert_eq!(suggestions, vec!["ruby".to_string(), "rust".to_string()]);
        assert!(suggest("zzz", &registry).is_empty());
    }

    #[test]
    fn test_suggestions_capped() {
        let mut registry = LanguageRegistry::new();
        for id in ["aa", "ab", "ac", "ad"] {
            registry.merge([LangEntry::new(id, LaunchDescriptor::primary(id, &[]))]);
        }
        assert_eq!(suggest("ax", &registry).len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn test_unknown_language_hint_lists_registered() {
        let registry = LanguageRegistry::with_defaults();
        let hint = unknown_language("cobol", &registry);
        let text = hint.to_string();

        assert!(text.contains("`cobol`"));
        assert!(text.contains("`python`"));
        assert!(text.contains("`yaml`"));
        assert!(text.contains("Did you mean: `cpp`?"));

        let hint = unknown_language("zig", &registry).to_string();
        assert!(!hint.contains("Did you mean"));
    }

    #[test]
    fn test_backend_hint_names_exact_command() {
        let registry = LanguageRegistry::with_defaults();
        let entry = registry.resolve("rust").unwrap();
        let hint =
            backend_unavailable_on(entry, &failure("rust", &["rust-analyzer"]), Platform::Linux);
        let text = hint.to_string();

        assert!(text.contains("`rust-analyzer`"));
        assert!(text.contains("rustup component add rust-analyzer"));
        assert!(!text.contains("undefined"));
        assert!(!text.contains("null"));
    }

    #[test]
    fn test_backend_hint_per_platform() {
        let registry = LanguageRegistry::with_defaults();
        let entry = registry.resolve("cpp").unwrap();
        let f = failure("cpp", &["clangd"]);

        let mac = backend_unavailable_on(entry, &f, Platform::MacOS).to_string();
        let linux = backend_unavailable_on(entry, &f, Platform::Linux).to_string();
        assert!(mac.contains("brew install llvm"));
        assert!(linux.contains("apt install clangd"));
    }

    #[test]
    fn test_custom_command_gets_generic_guidance() {
        let entry = LangEntry::new("rust", LaunchDescriptor::primary("/opt/ra/bin/ra", &[]));
        let hint = backend_unavailable_on(&entry, &failure("rust", &[]), Platform::Linux);
        let text = hint.to_string();

        assert!(text.contains("`/opt/ra/bin/ra`"));
        assert!(text.contains(".fence-lsp/config.toml"));
        assert!(!text.contains("rustup"));
    }

    #[test]
    fn test_fallback_commands_listed() {
        let registry = LanguageRegistry::with_defaults();
        let entry = registry.resolve("python").unwrap();
        let hint = backend_unavailable_on(
            entry,
            &failure("python", &["pyright-langserver --stdio", "pylsp"]),
            Platform::Linux,
        );
        match hint {
            Hint::BackendUnavailable { commands, .. } => {
                assert_eq!(commands, vec!["pyright-langserver --stdio", "pylsp"]);
            }
            other => panic!("unexpected hint: {other:?}"),
        }
    }
}
