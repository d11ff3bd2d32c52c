//! Scripted in-memory backends for tests
//!
//! Each spawn gets a fresh pair of duplex pipes and a task that speaks just
//! enough LSP to exercise the client, supervisor and synchronizer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::DuplexStream;
use tokio::sync::Notify;

use super::protocol::{Message, Notification, Request, Response, error_codes};
use super::spawner::{BackendIo, Spawner};
use super::transport::{Transport, write_message};
use crate::error::LspError;
use crate::models::LaunchDescriptor;

/// Behaviour of one fake backend command
#[derive(Debug, Clone)]
pub struct FakeBackend {
    capabilities: Value,
    reject_initialize: bool,
    exit_after_initialize: bool,
    respond: bool,
    publish_diagnostics: bool,
    hover: Value,
    completion: Value,
}

impl FakeBackend {
    /// Serves completion and hover
    pub fn full() -> Self {
        Self {
            capabilities: json!({
                "textDocumentSync": 1,
                "completionProvider": { "triggerCharacters": ["."] },
                "hoverProvider": true
            }),
            reject_initialize: false,
            exit_after_initialize: false,
            respond: true,
            publish_diagnostics: false,
            hover: json!({
                "contents": { "kind": "markdown", "value": "```python\ndef foo() -> int\n```" },
                "range": {
                    "start": { "line": 1, "character": 0 },
                    "end": { "line": 1, "character": 3 }
                }
            }),
            completion: json!({
                "isIncomplete": false,
                "items": [
                    { "label": "append", "kind": 2 },
                    { "label": "extend", "kind": 2 }
                ]
            }),
        }
    }

    pub fn hover_only() -> Self {
        Self {
            capabilities: json!({ "textDocumentSync": 1, "hoverProvider": true }),
            ..Self::full()
        }
    }

    pub fn rejecting_initialize() -> Self {
        Self {
            reject_initialize: true,
            ..Self::full()
        }
    }

    pub fn exiting_after_initialize() -> Self {
        Self {
            exit_after_initialize: true,
            ..Self::full()
        }
    }

    /// Answers the handshake but never answers feature requests
    pub fn unresponsive() -> Self {
        Self {
            respond: false,
            ..Self::full()
        }
    }

    pub fn with_diagnostics(mut self) -> Self {
        self.publish_diagnostics = true;
        self
    }

    pub fn with_hover(mut self, hover: Value) -> Self {
        self.hover = hover;
        self
    }

    pub fn with_completion(mut self, completion: Value) -> Self {
        self.completion = completion;
        self
    }
}

#[derive(Default)]
struct Received {
    messages: Mutex<Vec<(String, Value)>>,
    changed: Notify,
}

impl Received {
    fn record(&self, method: &str, params: Value) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((method.to_string(), params));
        }
        self.changed.notify_waiters();
    }
}

/// Spawner that maps launch commands to scripted backends
pub struct FakeSpawner {
    backends: HashMap<String, FakeBackend>,
    spawn_delay: Duration,
    spawns: AtomicUsize,
    attempts: Mutex<Vec<String>>,
    received: Arc<Received>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            spawn_delay: Duration::ZERO,
            spawns: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
            received: Arc::new(Received::default()),
        }
    }

    /// Commands without a backend fail to spawn like a missing binary
    pub fn with_backend(mut self, command: &str, backend: FakeBackend) -> Self {
        self.backends.insert(command.to_string(), backend);
        self
    }

    pub fn with_spawn_delay(mut self, delay: Duration) -> Self {
        self.spawn_delay = delay;
        self
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn attempted_commands(&self) -> Vec<String> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn methods(&self) -> Vec<String> {
        self.received
            .messages
            .lock()
            .map(|m| m.iter().map(|(method, _)| method.clone()).collect())
            .unwrap_or_default()
    }

    /// Params of every message with this method, in arrival order
    pub fn received(&self, method: &str) -> Vec<Value> {
        self.received
            .messages
            .lock()
            .map(|m| {
                m.iter()
                    .filter(|(name, _)| name == method)
                    .map(|(_, params)| params.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Wait until some backend received `method`; returns its first params
    pub async fn wait_for_method(&self, method: &str) -> Value {
        let wait = async {
            loop {
                let changed = self.received.changed.notified();
                if let Some(params) = self.received(method).into_iter().next() {
                    return params;
                }
                changed.await;
            }
        };
        match tokio::time::timeout(Duration::from_secs(5), wait).await {
            Ok(params) => params,
            Err(_) => panic!("no backend received {method}; got {:?}", self.methods()),
        }
    }
}

#[async_trait]
impl Spawner for FakeSpawner {
    async fn spawn(
        &self,
        _language: &str,
        launch: &LaunchDescriptor,
    ) -> Result<BackendIo, LspError> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(launch.command.clone());
        }
        if !self.spawn_delay.is_zero() {
            tokio::time::sleep(self.spawn_delay).await;
        }

        let Some(backend) = self.backends.get(&launch.command).cloned() else {
            return Err(LspError::spawn_failed(
                launch.command_line(),
                "No such file or directory (os error 2)",
            ));
        };

        // One pipe per direction so dropping the client writer is seen as EOF
        let (client_writer, server_reader) = tokio::io::duplex(64 * 1024);
        let (server_writer, client_reader) = tokio::io::duplex(64 * 1024);
        tokio::spawn(serve(
            backend,
            server_reader,
            server_writer,
            Arc::clone(&self.received),
        ));

        Ok(BackendIo {
            reader: Box::new(client_reader),
            writer: Box::new(client_writer),
            child: None,
        })
    }
}

async fn serve(
    backend: FakeBackend,
    reader: DuplexStream,
    mut writer: DuplexStream,
    received: Arc<Received>,
) {
    let mut transport = Transport::new(Box::new(reader));

    while let Ok(message) = transport.read_message().await {
        match message {
            Message::Request(request) => {
                received.record(
                    &request.method,
                    request.params.clone().unwrap_or(Value::Null),
                );
                let reply = match request.method.as_str() {
                    "initialize" if backend.reject_initialize => Some(Response::failure(
                        Some(request.id),
                        error_codes::INTERNAL_ERROR,
                        "initialization rejected",
                    )),
                    "initialize" => Some(Response::success(
                        request.id,
                        json!({
                            "capabilities": backend.capabilities,
                            "serverInfo": { "name": "fake-ls", "version": "0.0.1" }
                        }),
                    )),
                    "shutdown" => Some(Response::success(request.id, Value::Null)),
                    _ if !backend.respond => None,
                    "textDocument/hover" => {
                        Some(Response::success(request.id, backend.hover.clone()))
                    }
                    "textDocument/completion" => {
                        Some(Response::success(request.id, backend.completion.clone()))
                    }
                    _ => Some(Response::failure(
                        Some(request.id),
                        error_codes::METHOD_NOT_FOUND,
                        "not implemented",
                    )),
                };
                if let Some(reply) = reply
                    && write_message(&mut writer, &reply).await.is_err()
                {
                    break;
                }
            }
            Message::Notification(notification) => {
                let params = notification.params.unwrap_or(Value::Null);
                received.record(&notification.method, params.clone());
                match notification.method.as_str() {
                    "initialized" if backend.exit_after_initialize => break,
                    "initialized" => {
                        let ask = Request::new(
                            900,
                            "workspace/configuration",
                            Some(json!({ "items": [{ "section": "a" }, { "section": "b" }] })),
                        );
                        if write_message(&mut writer, &ask).await.is_err() {
                            break;
                        }
                    }
                    "textDocument/didOpen" | "textDocument/didChange"
                        if backend.publish_diagnostics =>
                    {
                        let uri = params
                            .pointer("/textDocument/uri")
                            .cloned()
                            .unwrap_or(Value::Null);
                        let publish = Notification::new(
                            "textDocument/publishDiagnostics",
                            Some(json!({
                                "uri": uri,
                                "diagnostics": [{
                                    "range": {
                                        "start": { "line": 1, "character": 4 },
                                        "end": { "line": 1, "character": 7 }
                                    },
                                    "severity": 1,
                                    "source": "fake-ls",
                                    "message": "undefined name"
                                }]
                            })),
                        );
                        if write_message(&mut writer, &publish).await.is_err() {
                            break;
                        }
                    }
                    "exit" => break,
                    _ => {}
                }
            }
            Message::Response(response) => {
                received.record(
                    "response:workspace/configuration",
                    response.result.unwrap_or(Value::Null),
                );
            }
        }
    }
}
