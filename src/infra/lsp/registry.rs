//! Language Registry
//!
//! Maps fence tags to canonical languages and their backend launch plans.
//! Built-in defaults cover the common embedded languages; user and
//! workspace configuration can replace or extend them at startup.

use std::collections::{BTreeSet, HashMap};

use crate::models::{Capability, LangEntry, LaunchDescriptor};

#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    entries: HashMap<String, LangEntry>,
    /// Lower-cased alias -> canonical id
    aliases: HashMap<String, String>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in language table
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.merge(defaults());
        registry
    }

    /// Case-insensitive lookup: canonical ids first, then aliases
    pub fn resolve(&self, tag: &str) -> Option<&LangEntry> {
        let key = tag.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }
        self.entries.get(&key).or_else(|| {
            self.aliases
                .get(&key)
                .and_then(|canonical| self.entries.get(canonical))
        })
    }

    /// Add or replace entries; a replaced entry loses its previous aliases
    pub fn merge(&mut self, entries: impl IntoIterator<Item = LangEntry>) {
        for entry in entries {
            if self.entries.remove(&entry.id).is_some() {
                self.aliases.retain(|_, canonical| canonical != &entry.id);
                tracing::debug!("Replacing language entry '{}'", entry.id);
            }
            for alias in &entry.aliases {
                if alias != &entry.id {
                    self.aliases.insert(alias.clone(), entry.id.clone());
                }
            }
            self.entries.insert(entry.id.clone(), entry);
        }
    }

    /// Canonical ids in sorted order
    pub fn list_ids(&self) -> Vec<String> {
        self.entries
            .keys()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LangEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Built-in language table
pub fn defaults() -> Vec<LangEntry> {
    use Capability::{Completion, Diagnostics, Hover};

    vec![
        LangEntry::new(
            "python",
            LaunchDescriptor::primary("pyright-langserver", &["--stdio"]),
        )
        .with_aliases(&["py", "python3", "py3"])
        .with_extension("py")
        .with_capabilities(&[Completion, Hover, Diagnostics])
        .with_fallback(LaunchDescriptor::external("pylsp", &[])),
        LangEntry::new(
            "typescript",
            LaunchDescriptor::primary("typescript-language-server", &["--stdio"]),
        )
        .with_aliases(&["ts", "tsx", "javascript", "js", "jsx", "mjs"])
        .with_extension("ts")
        .with_capabilities(&[Completion, Hover, Diagnostics]),
        LangEntry::new("rust", LaunchDescriptor::primary("rust-analyzer", &[]))
            .with_aliases(&["rs"])
            .with_extension("rs")
            .with_capabilities(&[Completion, Hover, Diagnostics]),
        LangEntry::new("go", LaunchDescriptor::primary("gopls", &[]))
            .with_aliases(&["golang"])
            .with_extension("go")
            .with_capabilities(&[Completion, Hover, Diagnostics]),
        LangEntry::new(
            "bash",
            LaunchDescriptor::primary("bash-language-server", &["start"]),
        )
        .with_aliases(&["sh", "shell", "zsh", "shellscript"])
        .with_extension("sh"),
        LangEntry::new("lua", LaunchDescriptor::primary("lua-language-server", &[]))
            .with_extension("lua"),
        LangEntry::new("cpp", LaunchDescriptor::primary("clangd", &[]))
            .with_aliases(&["c++", "cxx", "cc", "c", "h", "hpp"])
            .with_extension("cpp")
            .with_capabilities(&[Completion, Hover, Diagnostics]),
        LangEntry::new("ruby", LaunchDescriptor::primary("ruby-lsp", &[]))
            .with_aliases(&["rb"])
            .with_extension("rb"),
        LangEntry::new(
            "json",
            LaunchDescriptor::primary("vscode-json-language-server", &["--stdio"]),
        )
        .with_aliases(&["jsonc"])
        .with_extension("json"),
        LangEntry::new(
            "yaml",
            LaunchDescriptor::primary("yaml-language-server", &["--stdio"]),
        )
        .with_aliases(&["yml"])
        .with_extension("yaml"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive() {
        let registry = LanguageRegistry::with_defaults();
        assert_eq!(registry.resolve("Python").unwrap().id, "python");
        assert_eq!(registry.resolve("PY").unwrap().id, "python");
        assert_eq!(registry.resolve("  rs ").unwrap().id, "rust");
        assert!(registry.resolve("cobol").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_js_resolves_typescript() {
        let registry = LanguageRegistry::with_defaults();
        let entry = registry.resolve("JS").unwrap();
        assert_eq!(entry.id, "typescript");
        assert_eq!(entry.launch.command, "typescript-language-server");
    }

    #[test]
    fn test_every_alias_resolves_to_its_entry() {
        let registry = LanguageRegistry::with_defaults();
        for entry in registry.entries() {
            let by_id = registry.resolve(&entry.id).unwrap();
            assert!(std::ptr::eq(by_id, entry), "{}", entry.id);
            for alias in &entry.aliases {
                let by_alias = registry.resolve(alias).unwrap();
                assert!(std::ptr::eq(by_alias, by_id), "{alias} -> {}", entry.id);
            }
        }
    }

    #[test]
    fn test_merge_replaces_entry_and_aliases() {
        let mut registry = LanguageRegistry::with_defaults();
        let before = registry.len();

        registry.merge([
            LangEntry::new("python", LaunchDescriptor::primary("pylsp", &[]))
                .with_aliases(&["snake"]),
        ]);

        assert_eq!(registry.len(), before);
        let entry = registry.resolve("snake").unwrap();
        assert_eq!(entry.launch.command, "pylsp");
        // Old aliases belonged to the replaced entry
        assert!(registry.resolve("py").is_none());
    }

    #[test]
    fn test_merge_adds_new_language() {
        let mut registry = LanguageRegistry::new();
        assert!(registry.is_empty());
        registry.merge([LangEntry::new("Zig", LaunchDescriptor::primary("zls", &[]))]);
        assert_eq!(registry.list_ids(), vec!["zig".to_string()]);
        assert_eq!(registry.resolve("ZIG").unwrap().launch.command, "zls");
    }

    #[test]
    fn test_list_ids_sorted() {
        let ids = LanguageRegistry::with_defaults().list_ids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert!(ids.contains(&"yaml".to_string()));
    }

    #[test]
    fn test_only_python_has_fallback() {
        let registry = LanguageRegistry::with_defaults();
        for entry in registry.entries() {
            assert_eq!(entry.fallback.is_some(), entry.id == "python", "{}", entry.id);
        }
    }
}
