//! CLI module for fence-lsp
//!
//! Provides command-line interface using clap derive macros.

pub mod commands;
pub mod location;
pub mod output;
pub mod response;

pub use location::ParsedLocation;
pub use output::OutputContext;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    complete::CompleteArgs, fences::FencesArgs, hint::HintArgs, hover::HoverArgs,
    languages::LanguagesArgs, status::StatusArgs,
};

const LONG_ABOUT: &str = r#"
fence-lsp - language intelligence for code fenced inside markdown

Every fenced code block with a language tag is mirrored into a virtual
document and served by that language's own language server. Positions
are 1-indexed on the command line.

EXAMPLES:
  fence-lsp languages                       # Registered languages and servers
  fence-lsp fences README.md                # Fenced blocks and their languages
  fence-lsp hover README.md:14:7            # Hover inside a fence
  fence-lsp complete README.md:14:8         # Completion inside a fence
  fence-lsp hint rust                       # Why a language has no intelligence
  fence-lsp status --file README.md         # Start and report backends

CONFIGURATION:
  ~/.config/fence-lsp/config.toml           # Global
  .fence-lsp/config.toml                    # Workspace (overrides global)
"#;

/// fence-lsp - language intelligence for code fenced inside markdown
#[derive(Parser, Debug)]
#[command(name = "fence-lsp")]
#[command(author, version, about, long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
#[command(after_help = "Use 'fence-lsp <COMMAND> --help' for more information about a command.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root (defaults to the current directory)
    #[arg(short = 'C', long, global = true, env = "FENCE_LSP_ROOT")]
    pub root: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered languages
    Languages(LanguagesArgs),

    /// List fenced code blocks in a markdown file
    Fences(FencesArgs),

    /// Hover information at a position inside a fence
    Hover(HoverArgs),

    /// Completion items at a position inside a fence
    Complete(CompleteArgs),

    /// Explain why a language gets no intelligence
    Hint(HintArgs),

    /// Show configuration and backend status
    Status(StatusArgs),
}
