//! Document Synchronizer
//!
//! Keeps each backend's view of a virtual document in step with the fence
//! it mirrors. Versions only ever move forward: an older fence snapshot
//! never overwrites a newer one the backend already has.

use serde_json::json;

use crate::error::LspError;
use crate::infra::lsp::BackendClient;
use crate::models::FenceMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// First sight of the virtual document: didOpen sent
    Opened,
    /// Newer version: full-text didChange sent
    Changed,
    /// Backend already has this version
    Unchanged,
    /// Backend already has a newer version; nothing sent
    Stale,
}

/// Make the backend's copy of `fence` current
pub async fn sync_fence(client: &BackendClient, fence: &FenceMeta) -> Result<SyncAction, LspError> {
    // Held across the send so open/change for one URI never interleave
    let mut documents = client.documents().await;

    let action = match documents.get(&fence.virt_uri).copied() {
        None => {
            client
                .notify(
                    "textDocument/didOpen",
                    Some(json!({
                        "textDocument": {
                            "uri": fence.virt_uri,
                            "languageId": fence.lang_id(),
                            "version": fence.version,
                            "text": fence.code,
                        }
                    })),
                )
                .await?;
            SyncAction::Opened
        }
        Some(sent) if fence.version > sent => {
            client
                .notify(
                    "textDocument/didChange",
                    Some(json!({
                        "textDocument": { "uri": fence.virt_uri, "version": fence.version },
                        "contentChanges": [{ "text": fence.code }],
                    })),
                )
                .await?;
            SyncAction::Changed
        }
        Some(sent) if fence.version == sent => return Ok(SyncAction::Unchanged),
        Some(sent) => {
            tracing::debug!(
                "Skipping stale sync of {} (v{} < v{})",
                fence.virt_uri,
                fence.version,
                sent
            );
            return Ok(SyncAction::Stale);
        }
    };

    documents.insert(fence.virt_uri.clone(), fence.version);
    tracing::trace!("{:?} {} v{}", action, fence.virt_uri, fence.version);
    Ok(action)
}

/// Send didClose if the backend has the document open; returns whether it did
pub async fn close_fence(client: &BackendClient, virt_uri: &str) -> Result<bool, LspError> {
    let mut documents = client.documents().await;
    if documents.remove(virt_uri).is_none() {
        return Ok(false);
    }
    client
        .notify(
            "textDocument/didClose",
            Some(json!({ "textDocument": { "uri": virt_uri } })),
        )
        .await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::RuntimeConfig;
    use crate::infra::lsp::Spawner;
    use crate::infra::lsp::fake::{FakeBackend, FakeSpawner};
    use crate::models::LaunchDescriptor;
    use crate::models::fence::virtual_uri;

    async fn client(spawner: &FakeSpawner) -> Arc<BackendClient> {
        let io = spawner
            .spawn("python", &LaunchDescriptor::primary("fake-python", &[]))
            .await
            .unwrap();
        let client = BackendClient::connect("python", io, RuntimeConfig::default(), None);
        client.initialize().await.unwrap();
        client
    }

    fn fence(version: i32, code: &str) -> FenceMeta {
        FenceMeta {
            raw_lang: "python".to_string(),
            canonical: Some("python".to_string()),
            code_start: 3,
            code_end: 4,
            code: code.to_string(),
            virt_uri: virtual_uri("file:///a.md", 0, "py"),
            version,
        }
    }

    #[tokio::test]
    async fn test_open_then_change_then_noop() {
        let spawner = FakeSpawner::new().with_backend("fake-python", FakeBackend::full());
        let client = client(&spawner).await;

        assert_eq!(sync_fence(&client, &fence(1, "x = 1\n")).await.unwrap(), SyncAction::Opened);
        assert_eq!(sync_fence(&client, &fence(1, "x = 1\n")).await.unwrap(), SyncAction::Unchanged);
        assert_eq!(sync_fence(&client, &fence(2, "x = 2\n")).await.unwrap(), SyncAction::Changed);

        let opened = spawner.wait_for_method("textDocument/didOpen").await;
        assert_eq!(opened["textDocument"]["languageId"], "python");
        assert_eq!(opened["textDocument"]["version"], 1);

        let changed = spawner.wait_for_method("textDocument/didChange").await;
        assert_eq!(changed["textDocument"]["version"], 2);
        assert_eq!(changed["contentChanges"][0]["text"], "x = 2\n");

        assert_eq!(spawner.received("textDocument/didOpen").len(), 1);
    }

    #[tokio::test]
    async fn test_older_version_never_sent() {
        let spawner = FakeSpawner::new().with_backend("fake-python", FakeBackend::full());
        let client = client(&spawner).await;

        sync_fence(&client, &fence(3, "new\n")).await.unwrap();
        assert_eq!(sync_fence(&client, &fence(2, "old\n")).await.unwrap(), SyncAction::Stale);

        // Round-trip a request so every earlier notification has been read
        let _: serde_json::Value = client
            .request("textDocument/hover", Some(json!({})))
            .await
            .unwrap();
        assert!(spawner.received("textDocument/didChange").is_empty());
    }

    #[tokio::test]
    async fn test_close_only_when_open() {
        let spawner = FakeSpawner::new().with_backend("fake-python", FakeBackend::full());
        let client = client(&spawner).await;
        let uri = fence(1, "").virt_uri;

        assert!(!close_fence(&client, &uri).await.unwrap());
        sync_fence(&client, &fence(1, "x\n")).await.unwrap();
        assert!(close_fence(&client, &uri).await.unwrap());

        let closed = spawner.wait_for_method("textDocument/didClose").await;
        assert_eq!(closed["textDocument"]["uri"], uri.as_str());

        // Reopening after close starts over with didOpen
        assert_eq!(sync_fence(&client, &fence(2, "y\n")).await.unwrap(), SyncAction::Opened);
    }
}
