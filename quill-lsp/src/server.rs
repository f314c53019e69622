//! Main language server implementation.

use std::sync::Arc;

use quill_analysis::{Analyzer, LineRange, Settings};
use tower_lsp::async_trait;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{
    ClientCapabilities, DidChangeTextDocumentParams, DidChangeWatchedFilesParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DocumentRangeFormattingParams,
    FileChangeType, InitializeParams, InitializeResult, InitializedParams, OneOf, Range,
    SemanticTokens, SemanticTokensFullOptions, SemanticTokensLegend, SemanticTokensOptions,
    SemanticTokensParams, SemanticTokensRangeParams, SemanticTokensRangeResult,
    SemanticTokensResult, SemanticTokensServerCapabilities, ServerCapabilities, ServerInfo,
    TextDocumentItem, TextDocumentSyncCapability, TextDocumentSyncKind, TextEdit, Url,
    WorkDoneProgressOptions,
};
use tower_lsp::Client;
use tracing::{info, warn};

use crate::features::semantic_tokens::{self, TOKEN_TYPES};
use crate::pipeline::single_flight::SingleFlight;
use crate::pipeline::{EditorLink, Pipelines};
use crate::store::AnalysisStore;

fn semantic_tokens_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: TOKEN_TYPES.to_vec(),
        token_modifiers: Vec::new(),
    }
}

fn client_supports_semantic_tokens(capabilities: &ClientCapabilities) -> bool {
    capabilities
        .text_document
        .as_ref()
        .and_then(|doc| doc.semantic_tokens.as_ref())
        .is_some()
}

/// Protocol ranges are 0-indexed; usage coordinates are 1-indexed.
fn line_range_of(range: Range) -> LineRange {
    LineRange {
        row: range.start.line + 1,
        end_row: range.end.line + 1,
    }
}

/// The Quill language server.
///
/// Owns the [`AnalysisStore`], the event [`Pipelines`], and the
/// single-flight guard for range formatting. Handlers stay thin: they
/// install state, push events, and read store snapshots through the
/// feature layer. The analyzer is the embedder-supplied collaborator
/// that actually understands Quill source.
pub struct QuillLanguageServer<L, A> {
    link: Arc<L>,
    analyzer: Arc<A>,
    store: Arc<AnalysisStore>,
    pipelines: Pipelines,
    format_flight: SingleFlight,
}

impl<A: Analyzer> QuillLanguageServer<Client, A> {
    pub fn new(client: Client, analyzer: Arc<A>) -> Self {
        Self::with_link(Arc::new(client), analyzer)
    }
}

impl<L, A> QuillLanguageServer<L, A>
where
    L: EditorLink,
    A: Analyzer,
{
    /// Construct the server and spawn its pipelines. Must run inside a
    /// tokio runtime.
    pub fn with_link(link: Arc<L>, analyzer: Arc<A>) -> Self {
        let store = Arc::new(AnalysisStore::new());
        let pipelines = Pipelines::spawn(link.clone(), analyzer.clone(), store.clone());
        Self {
            link,
            analyzer,
            store,
            pipelines,
            format_flight: SingleFlight::new("range-formatting"),
        }
    }

    pub fn store(&self) -> &Arc<AnalysisStore> {
        &self.store
    }

    /// Pipeline handles for collaborators that produce events outside
    /// the protocol surface (diagnostics-ready, pending workspace
    /// edits).
    pub fn pipelines(&self) -> &Pipelines {
        &self.pipelines
    }

    async fn record_document(&self, uri: Url, text: String) {
        self.store.set_text(uri.clone(), text).await;
        self.pipelines.document_changed(uri);
    }
}

#[async_trait]
impl<L, A> tower_lsp::LanguageServer for QuillLanguageServer<L, A>
where
    L: EditorLink,
    A: Analyzer,
{
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.store.reset().await;

        let settings = Settings::from_initialization_options(params.initialization_options);
        let tokens_supported = client_supports_semantic_tokens(&params.capabilities);
        let advertise_tokens = tokens_supported && settings.semantic_tokens;
        self.store.set_settings(settings).await;
        self.store.set_client_supports_tokens(tokens_supported).await;

        let mut capabilities = ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
            document_range_formatting_provider: Some(OneOf::Left(true)),
            ..ServerCapabilities::default()
        };
        if advertise_tokens {
            capabilities.semantic_tokens_provider = Some(
                SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
                    work_done_progress_options: WorkDoneProgressOptions::default(),
                    legend: semantic_tokens_legend(),
                    range: Some(true),
                    full: Some(SemanticTokensFullOptions::Bool(true)),
                }),
            );
        }

        Ok(InitializeResult {
            capabilities,
            server_info: Some(ServerInfo {
                name: "quill-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        self.store.reset().await;
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let TextDocumentItem { uri, text, .. } = params.text_document;
        self.record_document(uri, text).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole document.
        if let Some(change) = params.content_changes.into_iter().last() {
            self.record_document(params.text_document.uri, change.text)
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.store.remove_document(&uri).await;
        self.link.publish_diagnostics(uri, Vec::new(), None).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for event in params.changes {
            if event.typ == FileChangeType::CREATED {
                self.pipelines.file_created(event.uri);
            }
        }
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        let Some(analysis) = self.store.analysis(&params.text_document.uri).await else {
            return Ok(None);
        };
        let data = semantic_tokens::full_tokens(&analysis.usages);
        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data,
        })))
    }

    async fn semantic_tokens_range(
        &self,
        params: SemanticTokensRangeParams,
    ) -> Result<Option<SemanticTokensRangeResult>> {
        let Some(analysis) = self.store.analysis(&params.text_document.uri).await else {
            return Ok(None);
        };
        let data = semantic_tokens::range_tokens(&analysis.usages, line_range_of(params.range));
        Ok(Some(SemanticTokensRangeResult::Tokens(SemanticTokens {
            result_id: None,
            data,
        })))
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        let uri = params.text_document.uri;
        // At most one formatting run process-wide; concurrent callers
        // get an empty edit list, not an error.
        let Some(_permit) = self.format_flight.try_acquire() else {
            return Ok(Some(Vec::new()));
        };

        let Some(text) = self.store.text(&uri).await else {
            return Ok(None);
        };
        match self.analyzer.format_range(&uri, &text, params.range) {
            Ok(edits) => Ok(Some(edits)),
            Err(error) => {
                warn!(%uri, %error, "range formatting failed");
                Ok(None)
            }
        }
    }
}
