//! Backend process creation
//!
//! The supervisor never touches `tokio::process` directly; it asks a
//! [`Spawner`] for a pair of byte streams so that tests can substitute an
//! in-memory backend.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use super::transport::{BoxedReader, BoxedWriter};
use crate::error::LspError;
use crate::models::LaunchDescriptor;

/// Streams and process handle of a freshly spawned backend
pub struct BackendIo {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
    pub child: Option<Child>,
}

#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, language: &str, launch: &LaunchDescriptor)
    -> Result<BackendIo, LspError>;
}

/// Spawns real backend processes over piped stdio
pub struct ProcessSpawner {
    root: PathBuf,
}

impl ProcessSpawner {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Spawner for ProcessSpawner {
    async fn spawn(
        &self,
        language: &str,
        launch: &LaunchDescriptor,
    ) -> Result<BackendIo, LspError> {
        tracing::info!("Starting {} backend: {}", language, launch.command_line());

        let mut child = Command::new(&launch.command)
            .args(&launch.args)
            .current_dir(&self.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LspError::spawn_failed(launch.command_line(), e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LspError::spawn_failed(launch.command_line(), "stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LspError::spawn_failed(launch.command_line(), "stdout unavailable"))?;

        if let Some(stderr) = child.stderr.take() {
            let language = language.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!("{} stderr: {}", language, line);
                }
            });
        }

        // A binary that exits immediately (wrong arch, missing runtime) is a spawn failure
        tokio::task::yield_now().await;
        if let Ok(Some(status)) = child.try_wait() {
            return Err(LspError::spawn_failed(
                launch.command_line(),
                format!("exited immediately ({status})"),
            ));
        }

        Ok(BackendIo {
            reader: Box::new(stdout),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_spawn_failure() {
        let spawner = ProcessSpawner::new(std::env::temp_dir());
        let launch = LaunchDescriptor::primary("fence-lsp-no-such-backend", &["--stdio"]);

        let err = match spawner.spawn("rust", &launch).await {
            Ok(_) => panic!("spawn should fail"),
            Err(e) => e,
        };
        match err {
            LspError::SpawnFailed { command, .. } => {
                assert_eq!(command, "fence-lsp-no-such-backend --stdio");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
