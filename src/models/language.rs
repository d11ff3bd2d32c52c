//! Language entries and backend launch descriptors

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Request types a backend may serve for a fence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// textDocument/completion
    Completion,
    /// textDocument/hover
    Hover,
    /// textDocument/publishDiagnostics
    Diagnostics,
}

impl Capability {
    pub fn method(self) -> &'static str {
        match self {
            Self::Completion => "textDocument/completion",
            Self::Hover => "textDocument/hover",
            Self::Diagnostics => "textDocument/publishDiagnostics",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completion => "completion",
            Self::Hover => "hover",
            Self::Diagnostics => "diagnostics",
        };
        f.write_str(name)
    }
}

/// How to start one backend process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchDescriptor {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Primary (bundled) attempt, as opposed to an external fallback
    #[serde(default)]
    pub primary: bool,
}

impl LaunchDescriptor {
    pub fn primary(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            primary: true,
        }
    }

    pub fn external(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            primary: false,
            ..Self::primary(command, args)
        }
    }

    /// Full command line as the user would type it
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// A supported language: identity, aliases, declared capabilities and launch plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangEntry {
    /// Canonical id, always lower-case
    pub id: String,
    pub aliases: BTreeSet<String>,
    pub capabilities: BTreeSet<Capability>,
    /// File extension used for virtual document URIs
    pub extension: Option<String>,
    pub launch: LaunchDescriptor,
    pub fallback: Option<LaunchDescriptor>,
}

impl LangEntry {
    pub fn new(id: &str, launch: LaunchDescriptor) -> Self {
        Self {
            id: id.to_lowercase(),
            aliases: BTreeSet::new(),
            capabilities: [Capability::Completion, Capability::Hover]
                .into_iter()
                .collect(),
            extension: None,
            launch,
            fallback: None,
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_lowercase()).collect();
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = Some(extension.to_string());
        self
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        self.capabilities = capabilities.iter().copied().collect();
        self
    }

    pub fn with_fallback(mut self, fallback: LaunchDescriptor) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn declares(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Launch attempts in order: the primary, then its fallback if the primary allows one
    pub fn launch_plan(&self) -> Vec<&LaunchDescriptor> {
        let mut plan = vec![&self.launch];
        if self.launch.primary
            && let Some(fallback) = &self.fallback
        {
            plan.push(fallback);
        }
        plan
    }
}
