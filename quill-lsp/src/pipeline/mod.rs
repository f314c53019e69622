//! Event pipelines between the editor and the analysis store.
//!
//! One startup routine ([`Pipelines::spawn`]) constructs four independent
//! pipelines, each its own channel plus consumer task:
//!
//! | pipeline        | key  | window | on flush                          |
//! |-----------------|------|--------|-----------------------------------|
//! | workspace edits | none | none   | deliver edit to the client        |
//! | diagnostics     | URI  | 100 ms | publish latest diagnostics        |
//! | change analysis | URI  | 300 ms | re-analyze, install into store    |
//! | created files   | none | 500 ms | batch-analyze new files, install  |
//!
//! Isolation is structural: one task and one channel per pipeline, no
//! shared locking. A fault in one consumer is logged and never reaches
//! the others. Within one key, flushes are chronological; across keys or
//! pipelines there is no ordering guarantee.

pub mod debounce;
pub mod single_flight;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use quill_analysis::{AnalyzeError, Analyzer};
use tokio::sync::mpsc;
use tracing::warn;

use tower_lsp::async_trait;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::{Diagnostic, Url, WorkspaceEdit};
use tower_lsp::Client;

use crate::store::AnalysisStore;
use debounce::{debounce_all, debounce_by_key};
use worker::spawn_consumer;

/// Window for collapsing diagnostics publications per document.
pub const DIAGNOSTICS_DEBOUNCE: Duration = Duration::from_millis(100);

/// Window for collapsing re-analysis triggers per document.
pub const CHANGE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Window for batching watched-file creation events.
pub const CREATED_FILES_DEBOUNCE: Duration = Duration::from_millis(500);

/// Upper bound on any client round-trip (workspace-edit apply). On
/// expiry the outcome is logged and treated as "no response".
pub const CLIENT_ROUNDTRIP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-bound side of the server, abstracted so pipelines and tests
/// run against a recording mock instead of a live connection.
#[async_trait]
pub trait EditorLink: Send + Sync + 'static {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    );

    /// Ask the client to apply a workspace edit; `Ok(true)` means the
    /// client applied it.
    async fn apply_edit(&self, edit: WorkspaceEdit) -> jsonrpc::Result<bool>;
}

#[async_trait]
impl EditorLink for Client {
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<Diagnostic>,
        version: Option<i32>,
    ) {
        Client::publish_diagnostics(self, uri, diagnostics, version).await;
    }

    async fn apply_edit(&self, edit: WorkspaceEdit) -> jsonrpc::Result<bool> {
        let response = Client::apply_edit(self, edit).await?;
        Ok(response.applied)
    }
}

/// Owned handles to the four pipelines. Producers push events through
/// these methods; nothing here is process-global.
pub struct Pipelines {
    edits: mpsc::UnboundedSender<WorkspaceEdit>,
    diagnostics: mpsc::UnboundedSender<Url>,
    changes: mpsc::UnboundedSender<Url>,
    created: mpsc::UnboundedSender<Url>,
}

impl Pipelines {
    /// Construct all pipelines and spawn their consumer tasks. The tasks
    /// run for the life of the process; they exit when the returned
    /// handle (and its clones of the senders) is dropped.
    pub fn spawn<L, A>(link: Arc<L>, analyzer: Arc<A>, store: Arc<AnalysisStore>) -> Self
    where
        L: EditorLink,
        A: Analyzer,
    {
        // Diagnostics publication: keyed by URI, trailing edge.
        let (diagnostics_tx, diagnostics_rx) =
            debounce_by_key(DIAGNOSTICS_DEBOUNCE, |uri: &Url| uri.clone());
        {
            let store = store.clone();
            let link = link.clone();
            spawn_consumer("diagnostics", diagnostics_rx, move |uri: Url| {
                let store = store.clone();
                let link = link.clone();
                async move {
                    if !store.settings().await.diagnostics {
                        return Ok::<(), AnalyzeError>(());
                    }
                    let diagnostics = store
                        .analysis(&uri)
                        .await
                        .map(|analysis| analysis.diagnostics.clone())
                        .unwrap_or_default();
                    link.publish_diagnostics(uri, diagnostics, None).await;
                    Ok(())
                }
            });
        }

        // Change analysis: keyed by URI, feeds the diagnostics pipeline
        // once a fresh result is installed.
        let (changes_tx, changes_rx) = debounce_by_key(CHANGE_DEBOUNCE, |uri: &Url| uri.clone());
        {
            let store = store.clone();
            let analyzer = analyzer.clone();
            let diagnostics = diagnostics_tx.clone();
            spawn_consumer("change-analysis", changes_rx, move |uri: Url| {
                let store = store.clone();
                let analyzer = analyzer.clone();
                let diagnostics = diagnostics.clone();
                async move {
                    let text = store.text(&uri).await.ok_or_else(|| {
                        AnalyzeError::UnknownDocument { uri: uri.clone() }
                    })?;
                    let analysis = analyzer.analyze(&uri, &text)?;
                    store.install_analysis(uri.clone(), analysis).await;
                    let _ = diagnostics.send(uri);
                    Ok::<(), AnalyzeError>(())
                }
            });
        }

        // Watched-file creations: collapse-all batch. One unreadable
        // file is skipped, the rest of the batch still lands.
        let (created_tx, created_rx) = debounce_all(CREATED_FILES_DEBOUNCE);
        {
            let store = store.clone();
            let analyzer = analyzer.clone();
            spawn_consumer("created-files", created_rx, move |uris: Vec<Url>| {
                let store = store.clone();
                let analyzer = analyzer.clone();
                async move {
                    for uri in uris {
                        if let Err(error) =
                            analyze_created_file(&store, analyzer.as_ref(), &uri).await
                        {
                            warn!(task = "created-files", %uri, %error, "skipping created file");
                        }
                    }
                    Ok::<(), AnalyzeError>(())
                }
            });
        }

        // Workspace edits: no debounce, delivered as they arrive.
        let (edits_tx, edits_rx) = mpsc::unbounded_channel();
        {
            let link = link.clone();
            spawn_consumer("workspace-edits", edits_rx, move |edit: WorkspaceEdit| {
                let link = link.clone();
                async move { deliver_edit(link.as_ref(), edit).await }
            });
        }

        Self {
            edits: edits_tx,
            diagnostics: diagnostics_tx,
            changes: changes_tx,
            created: created_tx,
        }
    }

    /// Queue a workspace edit for delivery to the client.
    pub fn publish_workspace_edit(&self, edit: WorkspaceEdit) {
        let _ = self.edits.send(edit);
    }

    /// Record that a document changed; analysis re-runs after the burst
    /// settles.
    pub fn document_changed(&self, uri: Url) {
        let _ = self.changes.send(uri);
    }

    /// Request a (debounced) diagnostics publication for a document.
    pub fn diagnostics_ready(&self, uri: Url) {
        let _ = self.diagnostics.send(uri);
    }

    /// Record a watched-file creation for the next batch analysis.
    pub fn file_created(&self, uri: Url) {
        let _ = self.created.send(uri);
    }
}

async fn analyze_created_file<A: Analyzer>(
    store: &AnalysisStore,
    analyzer: &A,
    uri: &Url,
) -> Result<(), AnalyzeError> {
    let path = uri
        .to_file_path()
        .map_err(|()| AnalyzeError::Analysis(format!("not a file URI: {uri}")))?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| AnalyzeError::Read {
            uri: uri.clone(),
            source,
        })?;
    let analysis = analyzer.analyze(uri, &text)?;
    store.set_text(uri.clone(), text).await;
    store.install_analysis(uri.clone(), analysis).await;
    Ok(())
}

/// Deliver one workspace edit, bounding the client round-trip. A timeout
/// is not an error: it is logged and treated as no response.
async fn deliver_edit<L: EditorLink>(link: &L, edit: WorkspaceEdit) -> jsonrpc::Result<()> {
    match tokio::time::timeout(CLIENT_ROUNDTRIP_TIMEOUT, link.apply_edit(edit)).await {
        Ok(Ok(applied)) => {
            if !applied {
                warn!("client declined workspace edit");
            }
            Ok(())
        }
        Ok(Err(error)) => Err(error),
        Err(_elapsed) => {
            warn!(
                timeout_secs = CLIENT_ROUNDTRIP_TIMEOUT.as_secs(),
                "no response to workspace edit; proceeding"
            );
            Ok(())
        }
    }
}
