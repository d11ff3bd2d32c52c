//! Backend Supervisor
//!
//! Owns at most one backend per canonical language. The first request for a
//! language spawns and initializes its backend; concurrent requests share the
//! same in-flight startup. A language whose startup failed is remembered as
//! dead and never retried. A ready backend that later exits is dropped so the
//! next request starts a fresh one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::SystemTime;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use tokio::sync::RwLock;

use super::client::BackendClient;
use super::spawner::{BackendIo, Spawner};
use crate::config::RuntimeConfig;
use crate::error::LspError;
use crate::models::LangEntry;

const PHASE_SPAWNING: u8 = 0;
const PHASE_INITIALIZING: u8 = 1;

/// Lifecycle state of one language's backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendState {
    Absent,
    Spawning,
    Initializing,
    Ready,
    Dead,
}

impl std::fmt::Display for BackendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Absent => "absent",
            Self::Spawning => "spawning",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Dead => "dead",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The process could not be started or exited immediately
    Spawn,
    /// The process started but the initialize handshake failed
    Handshake,
    /// The supervisor was shut down while the backend was starting
    Closed,
}

/// Why a language's backend is dead
#[derive(Debug, Clone, Serialize)]
pub struct SpawnFailure {
    pub language: String,
    pub kind: FailureKind,
    pub reason: String,
    /// Command lines tried, primary first
    pub attempted: Vec<String>,
    #[serde(skip)]
    pub failed_at: SystemTime,
}

impl std::fmt::Display for SpawnFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} backend unavailable: {}", self.language, self.reason)
    }
}

#[derive(Debug, Clone)]
pub enum AcquireError {
    Dead(SpawnFailure),
    ShuttingDown,
}

type StartFuture = Shared<BoxFuture<'static, Result<Arc<BackendClient>, SpawnFailure>>>;

enum Slot {
    Starting {
        phase: Arc<AtomicU8>,
        future: StartFuture,
    },
    Ready(Arc<BackendClient>),
    Dead(SpawnFailure),
}

type Slots = Arc<RwLock<HashMap<String, Slot>>>;

pub struct Supervisor {
    spawner: Arc<dyn Spawner>,
    config: RuntimeConfig,
    root_uri: Option<String>,
    slots: Slots,
    closed: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(spawner: Arc<dyn Spawner>, config: RuntimeConfig, root_uri: Option<String>) -> Self {
        Self {
            spawner,
            config,
            root_uri,
            slots: Arc::new(RwLock::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ready backend for `entry`, starting it on first use
    pub async fn acquire(&self, entry: &LangEntry) -> Result<Arc<BackendClient>, AcquireError> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(AcquireError::ShuttingDown);
            }

            let existing = {
                let slots = self.slots.read().await;
                match slots.get(&entry.id) {
                    Some(Slot::Ready(client)) => Some(Ok(Arc::clone(client))),
                    Some(Slot::Starting { future, .. }) => Some(Err(future.clone())),
                    Some(Slot::Dead(failure)) => {
                        return Err(AcquireError::Dead(failure.clone()));
                    }
                    None => None,
                }
            };

            match existing {
                Some(Ok(client)) => {
                    if client.is_running().await {
                        return Ok(client);
                    }
                    self.evict(&entry.id, &client).await;
                    continue;
                }
                Some(Err(future)) => return self.await_start(future).await,
                None => {}
            }

            let future = {
                let mut slots = self.slots.write().await;
                if slots.contains_key(&entry.id) {
                    // Another caller installed a slot between our read and write
                    continue;
                }
                let phase = Arc::new(AtomicU8::new(PHASE_SPAWNING));
                let future = self.start(entry.clone(), Arc::clone(&phase));
                slots.insert(
                    entry.id.clone(),
                    Slot::Starting {
                        phase,
                        future: future.clone(),
                    },
                );
                future
            };

            return self.await_start(future).await;
        }
    }

    async fn await_start(&self, future: StartFuture) -> Result<Arc<BackendClient>, AcquireError> {
        match future.await {
            Ok(client) => Ok(client),
            Err(failure) if failure.kind == FailureKind::Closed => Err(AcquireError::ShuttingDown),
            Err(failure) => Err(AcquireError::Dead(failure)),
        }
    }

    /// Build the shared startup future; it records its own outcome in the table
    fn start(&self, entry: LangEntry, phase: Arc<AtomicU8>) -> StartFuture {
        let spawner = Arc::clone(&self.spawner);
        let slots = Arc::clone(&self.slots);
        let closed = Arc::clone(&self.closed);
        let config = self.config.clone();
        let root_uri = self.root_uri.clone();

        async move {
            let result = launch(spawner.as_ref(), &entry, &config, root_uri, &phase, &closed).await;

            let mut slots = slots.write().await;
            match result {
                Ok(client) if closed.load(Ordering::Acquire) => {
                    slots.remove(&entry.id);
                    drop(slots);
                    client.shutdown().await;
                    Err(closed_failure(&entry.id, Vec::new()))
                }
                Ok(client) => {
                    tracing::info!("{} backend ready", entry.id);
                    slots.insert(entry.id.clone(), Slot::Ready(Arc::clone(&client)));
                    Ok(client)
                }
                Err(failure) if failure.kind == FailureKind::Closed => {
                    tracing::debug!("{} startup abandoned: supervisor closed", entry.id);
                    Err(failure)
                }
                Err(failure) => {
                    tracing::warn!("{}", failure);
                    if !closed.load(Ordering::Acquire) {
                        slots.insert(entry.id.clone(), Slot::Dead(failure.clone()));
                    }
                    Err(failure)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drop a ready backend that exited, unless it was already replaced
    async fn evict(&self, language: &str, client: &Arc<BackendClient>) {
        let mut slots = self.slots.write().await;
        if let Some(Slot::Ready(current)) = slots.get(language)
            && Arc::ptr_eq(current, client)
        {
            tracing::warn!("{} backend exited; restarting on next request", language);
            slots.remove(language);
        }
    }

    /// Ready backend if one is already running; never spawns
    pub async fn client(&self, language: &str) -> Option<Arc<BackendClient>> {
        match self.slots.read().await.get(language) {
            Some(Slot::Ready(client)) => Some(Arc::clone(client)),
            _ => None,
        }
    }

    pub async fn status(&self, language: &str) -> BackendState {
        let ready = {
            let slots = self.slots.read().await;
            match slots.get(language) {
                None => return BackendState::Absent,
                Some(Slot::Dead(_)) => return BackendState::Dead,
                Some(Slot::Starting { phase, .. }) => {
                    return match phase.load(Ordering::Acquire) {
                        PHASE_SPAWNING => BackendState::Spawning,
                        _ => BackendState::Initializing,
                    };
                }
                Some(Slot::Ready(client)) => Arc::clone(client),
            }
        };
        if ready.is_running().await {
            BackendState::Ready
        } else {
            self.evict(language, &ready).await;
            BackendState::Absent
        }
    }

    /// Recorded startup failure for a dead language
    pub async fn failure(&self, language: &str) -> Option<SpawnFailure> {
        match self.slots.read().await.get(language) {
            Some(Slot::Dead(failure)) => Some(failure.clone()),
            _ => None,
        }
    }

    /// State of every language that has been touched, sorted by id
    pub async fn snapshot(&self) -> Vec<(String, BackendState)> {
        let mut languages: Vec<String> = self.slots.read().await.keys().cloned().collect();
        languages.sort();

        let mut states = Vec::with_capacity(languages.len());
        for language in languages {
            let state = self.status(&language).await;
            if state != BackendState::Absent {
                states.push((language, state));
            }
        }
        states
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop every live backend and wait out startups still in flight
    ///
    /// Later acquisitions fail with `ShuttingDown`.
    pub async fn shutdown_all(&self) {
        self.closed.store(true, Ordering::Release);

        let (clients, starting) = {
            let mut slots = self.slots.write().await;
            let mut clients = Vec::new();
            let mut starting = Vec::new();
            for (_, slot) in slots.drain() {
                match slot {
                    Slot::Ready(client) => clients.push(client),
                    Slot::Starting { future, .. } => starting.push(future),
                    Slot::Dead(_) => {}
                }
            }
            (clients, starting)
        };

        if clients.is_empty() && starting.is_empty() {
            return;
        }
        tracing::debug!(
            "Shutting down {} backends ({} still starting)",
            clients.len(),
            starting.len()
        );
        // A startup that finishes after close shuts its own client down
        tokio::join!(
            futures::future::join_all(clients.iter().map(|client| client.shutdown())),
            futures::future::join_all(starting)
        );
    }
}

/// Try each launch descriptor in order; the first that handshakes wins
async fn launch(
    spawner: &dyn Spawner,
    entry: &LangEntry,
    config: &RuntimeConfig,
    root_uri: Option<String>,
    phase: &AtomicU8,
    closed: &AtomicBool,
) -> Result<Arc<BackendClient>, SpawnFailure> {
    let mut attempted = Vec::new();
    let mut last_error = None;

    for (attempt, descriptor) in entry.launch_plan().into_iter().enumerate() {
        if closed.load(Ordering::Acquire) {
            return Err(closed_failure(&entry.id, attempted));
        }
        if attempt > 0 {
            tracing::info!(
                "{} primary backend failed, trying fallback: {}",
                entry.id,
                descriptor.command_line()
            );
        }
        attempted.push(descriptor.command_line());
        phase.store(PHASE_SPAWNING, Ordering::Release);

        let io = match spawner.spawn(&entry.id, descriptor).await {
            Ok(io) => io,
            Err(e) => {
                tracing::warn!("{} backend '{}' failed: {}", entry.id, descriptor.command, e);
                last_error = Some(e);
                continue;
            }
        };
        if closed.load(Ordering::Acquire) {
            // Dropping the streams and child handle stops the process
            drop(io);
            return Err(closed_failure(&entry.id, attempted));
        }

        phase.store(PHASE_INITIALIZING, Ordering::Release);
        match start_backend(entry, io, config, root_uri.clone()).await {
            Ok(client) => return Ok(client),
            Err(e) => {
                tracing::warn!("{} backend '{}' failed: {}", entry.id, descriptor.command, e);
                last_error = Some(e);
            }
        }
    }

    let kind = match &last_error {
        Some(LspError::HandshakeFailed { .. }) => FailureKind::Handshake,
        _ => FailureKind::Spawn,
    };
    Err(SpawnFailure {
        language: entry.id.clone(),
        kind,
        reason: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no launch command configured".to_string()),
        attempted,
        failed_at: SystemTime::now(),
    })
}

fn closed_failure(language: &str, attempted: Vec<String>) -> SpawnFailure {
    SpawnFailure {
        language: language.to_string(),
        kind: FailureKind::Closed,
        reason: "supervisor is shutting down".to_string(),
        attempted,
        failed_at: SystemTime::now(),
    }
}

async fn start_backend(
    entry: &LangEntry,
    io: BackendIo,
    config: &RuntimeConfig,
    root_uri: Option<String>,
) -> Result<Arc<BackendClient>, LspError> {
    let client = BackendClient::connect(&entry.id, io, config.clone(), root_uri);
    if let Err(e) = client.initialize().await {
        client.abort().await;
        return Err(e);
    }
    Ok(client)
}
