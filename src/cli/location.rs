//! `file:line[:column]` arguments
//!
//! Lines and columns are 1-indexed on the command line and 0-indexed
//! everywhere else.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::models::Position;

#[derive(Debug, Clone)]
pub struct ParsedLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl ParsedLocation {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("Location cannot be empty");
        }

        let (file_part, rest) = Self::split_path_and_position(input)?;
        let (line, column) = Self::parse_position(rest)?;

        Ok(Self {
            file: PathBuf::from(file_part),
            line,
            column,
        })
    }

    /// Split at the first `:` followed by a digit, skipping a Windows drive prefix
    fn split_path_and_position(input: &str) -> Result<(&str, &str)> {
        let bytes = input.as_bytes();
        let has_drive = input.len() > 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic();
        let search_start = if has_drive { 2 } else { 0 };

        let split = input[search_start..]
            .char_indices()
            .map(|(idx, ch)| (search_start + idx, ch))
            .find(|&(idx, ch)| {
                ch == ':'
                    && input[idx + 1..]
                        .chars()
                        .next()
                        .is_some_and(|c| c.is_ascii_digit() || c == '-')
            })
            .map(|(idx, _)| idx);

        let Some(split) = split else {
            bail!("Invalid location format. Expected: file:line[:column]\nExample: notes/README.md:12:5")
        };
        if input[split + 1..].starts_with('-') {
            bail!("Invalid line number: negative values not allowed. Line numbers are 1-indexed.");
        }

        Ok((&input[..split], &input[split + 1..]))
    }

    fn parse_position(rest: &str) -> Result<(u32, u32)> {
        let mut parts = rest.splitn(2, ':');

        let line_str = parts.next().unwrap_or_default();
        let line: u32 = line_str.parse().map_err(|_| {
            anyhow::anyhow!("Invalid line number '{line_str}': must be a positive integer (1-indexed)")
        })?;

        let column: u32 = match parts.next() {
            Some(col_str) => col_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "Invalid column number '{col_str}': must be a positive integer (1-indexed)"
                )
            })?,
            None => 1,
        };

        if line == 0 {
            bail!("Line number must be >= 1 (got 0). Line numbers are 1-indexed.");
        }
        if column == 0 {
            bail!("Column number must be >= 1 (got 0). Column numbers are 1-indexed.");
        }

        Ok((line, column))
    }

    /// Resolve the file against the working directory; it must exist
    pub fn to_absolute(&self) -> Result<Self> {
        let file = if self.file.is_absolute() {
            self.file.clone()
        } else {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(&self.file)
        };

        let canonical = file
            .canonicalize()
            .map_err(|_| anyhow::anyhow!("File not found: {}", file.display()))?;

        Ok(Self {
            file: canonical,
            line: self.line,
            column: self.column,
        })
    }

    /// 0-indexed position for the aggregator
    pub fn position(&self) -> Position {
        Position::from_cli(self.line, self.column)
    }

    pub fn validate_position_with_content(&self, content: &str) -> Result<()> {
        let line_count = content.lines().count().max(1);
        if self.line as usize > line_count {
            bail!("Line {} exceeds file length ({} lines)", self.line, line_count);
        }

        if let Some(line_content) = content.lines().nth((self.line - 1) as usize) {
            let col_max = line_content.chars().count() + 1;
            if self.column as usize > col_max {
                bail!(
                    "Column {} exceeds line length ({} chars) at line {}",
                    self.column,
                    col_max - 1,
                    self.line
                );
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for ParsedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}
