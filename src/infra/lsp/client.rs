use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;
use tokio::process::Child;
use tokio::sync::{Mutex, MutexGuard, RwLock, oneshot};
use tokio::time::timeout;

use super::protocol::{
    ClientCapabilities, ClientInfo, Diagnostic, InitializeParams, InitializeResult,
    LogMessageParams, Message, MessageType, Notification, Request, RequestId, Response,
    ServerCapabilities, TextDocumentClientCapabilities, TextDocumentIdentifier,
    TextDocumentPositionParams, WindowClientCapabilities, WorkspaceClientCapabilities,
    error_codes,
};
use super::spawner::BackendIo;
use super::transport::{BoxedWriter, Transport, write_message};
use crate::config::RuntimeConfig;
use crate::error::LspError;
use crate::models::{Capability, Position};

type PendingRequest = oneshot::Sender<Response>;

const MAX_DIAGNOSTICS_CACHE: usize = 200;

/// RPC connection to one running backend process
pub struct BackendClient {
    language: String,
    process: Mutex<Option<Child>>,
    writer: Mutex<Option<BoxedWriter>>,
    next_id: AtomicU64,
    pending: RwLock<HashMap<RequestId, PendingRequest>>,
    capabilities: RwLock<Option<InitializeResult>>,
    /// Virtual document URI -> last version sent to this backend
    documents: Mutex<HashMap<String, i32>>,
    diagnostics: RwLock<HashMap<String, Vec<Diagnostic>>>,
    config: RuntimeConfig,
    root_uri: Option<String>,
    shutdown: AtomicBool,
    terminated: AtomicBool,
}

impl BackendClient {
    /// Wrap freshly spawned streams and start the response reader task
    pub fn connect(
        language: &str,
        io: BackendIo,
        config: RuntimeConfig,
        root_uri: Option<String>,
    ) -> Arc<Self> {
        let BackendIo {
            reader,
            writer,
            child,
        } = io;

        let client = Arc::new(Self {
            language: language.to_string(),
            process: Mutex::new(child),
            writer: Mutex::new(Some(writer)),
            next_id: AtomicU64::new(1),
            pending: RwLock::new(HashMap::new()),
            capabilities: RwLock::new(None),
            documents: Mutex::new(HashMap::new()),
            diagnostics: RwLock::new(HashMap::new()),
            config,
            root_uri,
            shutdown: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        });

        let reader_client = Arc::clone(&client);
        tokio::spawn(async move {
            reader_client.read_responses(Transport::new(reader)).await;
        });

        client
    }

    /// Perform the initialize / initialized handshake
    pub async fn initialize(&self) -> Result<(), LspError> {
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri: self.root_uri.clone(),
            capabilities: Self::client_capabilities(),
            client_info: Some(ClientInfo {
                name: "fence-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        };

        let handshake = |reason: String| LspError::HandshakeFailed {
            language: self.language.clone(),
            reason,
        };

        let result: InitializeResult = self
            .request("initialize", Some(serde_json::to_value(params)?))
            .await
            .map_err(|e| handshake(e.to_string()))?;

        if let Some(info) = &result.server_info {
            tracing::debug!(
                "{} backend is {} {}",
                self.language,
                info.name,
                info.version.as_deref().unwrap_or("")
            );
        }
        *self.capabilities.write().await = Some(result);

        self.notify("initialized", Some(serde_json::json!({})))
            .await
            .map_err(|e| handshake(e.to_string()))?;

        Ok(())
    }

    /// Capabilities this aggregator actually exercises
    fn client_capabilities() -> ClientCapabilities {
        ClientCapabilities {
            window: Some(WindowClientCapabilities {
                work_done_progress: Some(false),
            }),
            text_document: Some(TextDocumentClientCapabilities {
                synchronization: Some(serde_json::json!({
                    "dynamicRegistration": false,
                    "didSave": false
                })),
                completion: Some(serde_json::json!({
                    "dynamicRegistration": false,
                    "contextSupport": false,
                    "completionItem": {
                        "snippetSupport": false,
                        "documentationFormat": ["markdown", "plaintext"],
                        "insertReplaceSupport": false
                    }
                })),
                hover: Some(serde_json::json!({
                    "dynamicRegistration": false,
                    "contentFormat": ["markdown", "plaintext"]
                })),
                publish_diagnostics: Some(serde_json::json!({
                    "relatedInformation": false,
                    "versionSupport": true
                })),
            }),
            workspace: Some(WorkspaceClientCapabilities {
                configuration: Some(true),
                workspace_folders: Some(false),
            }),
        }
    }

    /// Send a request and wait for its response, bounded by the configured timeout
    pub async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, LspError> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(LspError::ServerTerminated {
                language: self.language.clone(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.write().await;
            pending.insert(RequestId::Number(id), tx);
        }

        let request = Request::new(id, method, params);

        tracing::trace!("{} LSP request {}: {}", self.language, id, method);

        {
            let mut writer_guard = self.writer.lock().await;
            let writer = writer_guard.as_mut().ok_or(LspError::NotConnected)?;
            if let Err(e) = write_message(writer, &request).await {
                self.pending.write().await.remove(&RequestId::Number(id));
                return Err(e.into());
            }
        }

        match timeout(self.config.timeout_for(method), rx).await {
            Ok(Ok(response)) => match response.into_result() {
                Ok(result) => {
                    serde_json::from_value(result).map_err(|e| LspError::Protocol(e.to_string()))
                }
                Err(err) if err.code == error_codes::SERVER_TERMINATED => {
                    Err(LspError::ServerTerminated {
                        language: self.language.clone(),
                    })
                }
                Err(err) => Err(err.into()),
            },
            Ok(Err(_)) => Err(LspError::RequestCancelled),
            Err(_) => {
                self.cancel_request(id).await;
                Err(LspError::Timeout(format!(
                    "{} '{}' timed out. The backend may be busy or unresponsive",
                    self.language, method
                )))
            }
        }
    }

    pub async fn cancel_request(&self, id: u64) {
        self.pending.write().await.remove(&RequestId::Number(id));
        let _ = self
            .notify("$/cancelRequest", Some(serde_json::json!({ "id": id })))
            .await;
    }

    /// Send a notification (no response expected)
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), LspError> {
        let notification = Notification::new(method, params);

        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(LspError::NotConnected)?;
        write_message(writer, &notification).await?;

        Ok(())
    }

    /// Background task that reads and dispatches backend messages
    async fn read_responses(self: Arc<Self>, mut transport: Transport) {
        loop {
            match transport.read_message().await {
                Ok(message) => self.handle_message(message).await,
                Err(e) => {
                    if self.shutdown.load(Ordering::Acquire) {
                        tracing::debug!("{} backend stream closed", self.language);
                    } else {
                        tracing::warn!("{} backend read error: {}", self.language, e);
                    }
                    self.fail_pending_requests().await;
                    break;
                }
            }
        }
    }

    /// Mark the backend terminated and fail every in-flight request fast
    async fn fail_pending_requests(&self) {
        self.terminated.store(true, Ordering::Release);
        let mut pending = self.pending.write().await;
        if !pending.is_empty() {
            tracing::debug!(
                "Failing {} pending requests: {} backend terminated",
                pending.len(),
                self.language
            );
        }
        for (id, sender) in pending.drain() {
            let _ = sender.send(Response::failure(
                Some(id),
                error_codes::SERVER_TERMINATED,
                format!("{} backend terminated", self.language),
            ));
        }
    }

    async fn handle_message(&self, message: Message) {
        match message {
            Message::Response(response) => {
                let Some(id) = response.id.clone() else {
                    tracing::debug!("{} sent a response without id", self.language);
                    return;
                };
                let mut pending = self.pending.write().await;
                // Some servers echo numeric ids back as strings
                let sender = pending.remove(&id).or_else(|| match &id {
                    RequestId::String(s) => s
                        .parse::<u64>()
                        .ok()
                        .and_then(|n| pending.remove(&RequestId::Number(n))),
                    RequestId::Number(_) => None,
                });
                match sender {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => tracing::debug!(
                        "Received response for unknown request ID {:?} (may have timed out)",
                        id
                    ),
                }
            }
            Message::Request(request) => self.handle_server_request(request).await,
            Message::Notification(notification) => {
                let params = notification.params.unwrap_or(Value::Null);
                match notification.method.as_str() {
                    "textDocument/publishDiagnostics" => self.cache_diagnostics(params).await,
                    "window/logMessage" | "window/showMessage" => {
                        if let Ok(log) = serde_json::from_value::<LogMessageParams>(params) {
                            self.log_backend_message(&log);
                        }
                    }
                    method => tracing::trace!("Unhandled notification: {}", method),
                }
            }
        }
    }

    fn log_backend_message(&self, log: &LogMessageParams) {
        match log.typ {
            MessageType::Error => tracing::error!("LSP {}: {}", self.language, log.message),
            MessageType::Warning => tracing::warn!("LSP {}: {}", self.language, log.message),
            MessageType::Info => tracing::info!("LSP {}: {}", self.language, log.message),
            MessageType::Log | MessageType::Debug => {
                tracing::debug!("LSP {}: {}", self.language, log.message)
            }
        }
    }

    async fn cache_diagnostics(&self, params: Value) {
        let uri = params.get("uri").and_then(|u| u.as_str());
        let diags = params.get("diagnostics").cloned();
        if let (Some(uri), Some(diags)) = (uri, diags)
            && let Ok(diagnostics) = serde_json::from_value::<Vec<Diagnostic>>(diags)
        {
            let mut cache = self.diagnostics.write().await;

            // Evict an arbitrary entry at capacity
            if cache.len() >= MAX_DIAGNOSTICS_CACHE
                && !cache.contains_key(uri)
                && let Some(oldest_key) = cache.keys().next().cloned()
            {
                cache.remove(&oldest_key);
            }

            tracing::debug!("Cached {} diagnostics for {}", diagnostics.len(), uri);
            cache.insert(uri.to_string(), diagnostics);
        }
    }

    async fn handle_server_request(&self, request: Request) {
        let response = match request.method.as_str() {
            "workspace/configuration" => {
                let items = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("items"))
                    .and_then(|i| i.as_array())
                    .map(|arr| arr.len())
                    .unwrap_or(0);
                Response::success(
                    request.id,
                    Value::Array(vec![Value::Object(serde_json::Map::new()); items]),
                )
            }
            "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create" => Response::success(request.id, Value::Null),
            method => {
                tracing::debug!("Unhandled server request: {}", method);
                Response::failure(
                    Some(request.id),
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {method}"),
                )
            }
        };

        let mut writer_guard = self.writer.lock().await;
        if let Some(writer) = writer_guard.as_mut()
            && let Err(e) = write_message(writer, &response).await
        {
            tracing::debug!("{} failed to answer server request: {}", self.language, e);
        }
    }

    /// Shutdown the backend with 3-stage graceful termination
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);

        // Stage 1: shutdown request then exit notification
        let graceful = timeout(self.config.shutdown_timeout, async {
            if self.request::<Value>("shutdown", None).await.is_ok() {
                let _ = self.notify("exit", None).await;
            }
        })
        .await;

        if graceful.is_err() {
            tracing::debug!("{} shutdown request timed out", self.language);
        }

        // Closing stdin signals EOF to servers that ignored `exit`
        self.writer.lock().await.take();

        // Stage 2 & 3: wait for process exit, then force kill
        if let Some(mut child) = self.process.lock().await.take() {
            match timeout(self.config.shutdown_timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!("{} backend exited: {:?}", self.language, status);
                }
                Ok(Err(e)) => {
                    tracing::warn!("{} backend wait error: {}", self.language, e);
                }
                Err(_) => {
                    tracing::warn!(
                        "{} backend termination timed out, forcing kill",
                        self.language
                    );
                    let _ = child.kill().await;
                }
            }
        }

        self.fail_pending_requests().await;
        tracing::info!("{} backend stopped", self.language);
    }

    /// Tear down a backend that never became ready
    pub async fn abort(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.writer.lock().await.take();
        if let Some(mut child) = self.process.lock().await.take() {
            let _ = child.start_kill();
        }
        self.fail_pending_requests().await;
    }

    /// False once the stream closed or the process exited
    pub async fn is_running(&self) -> bool {
        if self.terminated.load(Ordering::Acquire) {
            return false;
        }
        let mut process = self.process.lock().await;
        match process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => !self.shutdown.load(Ordering::Acquire),
        }
    }

    pub async fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.capabilities
            .read()
            .await
            .as_ref()
            .map(|result| result.capabilities.clone())
    }

    pub async fn server_name(&self) -> Option<String> {
        self.capabilities
            .read()
            .await
            .as_ref()
            .and_then(|result| result.server_info.as_ref())
            .map(|info| info.name.clone())
    }

    /// Negotiated support; false until initialize has completed
    pub async fn supports(&self, capability: Capability) -> bool {
        self.capabilities
            .read()
            .await
            .as_ref()
            .is_some_and(|result| result.capabilities.supports(capability))
    }

    /// Per-backend record of synced virtual documents; held across the send
    pub(crate) async fn documents(&self) -> MutexGuard<'_, HashMap<String, i32>> {
        self.documents.lock().await
    }

    pub async fn get_diagnostics(&self, uri: &str) -> Vec<Diagnostic> {
        self.diagnostics
            .read()
            .await
            .get(uri)
            .cloned()
            .unwrap_or_default()
    }

    pub fn position_params(uri: &str, position: Position) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier::new(uri),
            position,
        }
    }
}

impl Drop for BackendClient {
    fn drop(&mut self) {
        if let Ok(mut process_guard) = self.process.try_lock() {
            if let Some(child) = process_guard.as_mut() {
                let _ = child.start_kill();
                tracing::debug!("{} backend client dropped, process killed", self.language);
            }
        } else {
            tracing::warn!(
                "{} backend client dropped but could not acquire lock - potential zombie process",
                self.language
            );
        }
    }
}
