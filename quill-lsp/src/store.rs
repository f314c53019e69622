//! Process-wide analysis state.

use std::collections::HashMap;
use std::sync::Arc;

use quill_analysis::{DocumentAnalysis, Settings};
use tokio::sync::RwLock;
use tower_lsp::lsp_types::Url;

/// Shared holder of per-document state, client capability, and settings.
///
/// Mutations are whole-value inserts under the write lock: a consumer
/// installs a complete new `Arc` for a URI, never a partial update, so
/// readers always observe either the previous result or the new one.
/// At most one authoritative analysis exists per URI at any time.
#[derive(Default)]
pub struct AnalysisStore {
    texts: RwLock<HashMap<Url, Arc<String>>>,
    analyses: RwLock<HashMap<Url, Arc<DocumentAnalysis>>>,
    settings: RwLock<Settings>,
    /// Whether the connected client declared semantic-token support.
    client_supports_tokens: RwLock<bool>,
}

impl AnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all document state and return capability/settings to their
    /// defaults. Called on `initialize` (before the new session's values
    /// are recorded) and on `shutdown`.
    pub async fn reset(&self) {
        self.texts.write().await.clear();
        self.analyses.write().await.clear();
        *self.settings.write().await = Settings::default();
        *self.client_supports_tokens.write().await = false;
    }

    pub async fn set_text(&self, uri: Url, text: String) {
        self.texts.write().await.insert(uri, Arc::new(text));
    }

    pub async fn text(&self, uri: &Url) -> Option<Arc<String>> {
        self.texts.read().await.get(uri).cloned()
    }

    /// Install a complete analysis result for a URI, replacing any
    /// previous one.
    pub async fn install_analysis(&self, uri: Url, analysis: DocumentAnalysis) {
        self.analyses.write().await.insert(uri, Arc::new(analysis));
    }

    pub async fn analysis(&self, uri: &Url) -> Option<Arc<DocumentAnalysis>> {
        self.analyses.read().await.get(uri).cloned()
    }

    pub async fn remove_document(&self, uri: &Url) {
        self.texts.write().await.remove(uri);
        self.analyses.write().await.remove(uri);
    }

    pub async fn set_settings(&self, settings: Settings) {
        *self.settings.write().await = settings;
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn set_client_supports_tokens(&self, supported: bool) {
        *self.client_supports_tokens.write().await = supported;
    }

    pub async fn client_supports_tokens(&self) -> bool {
        *self.client_supports_tokens.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_analysis::{Usage, UsageTag};

    fn uri() -> Url {
        Url::parse("file:///sample.quill").unwrap()
    }

    fn analysis_with(rows: &[u32]) -> DocumentAnalysis {
        DocumentAnalysis {
            usages: rows
                .iter()
                .map(|&row| Usage {
                    row,
                    col: 1,
                    end_row: row,
                    end_col: 4,
                    tags: vec![UsageTag::Declared],
                    raw_text: String::new(),
                })
                .collect(),
            diagnostics: Vec::new(),
        }
    }

    #[tokio::test]
    async fn install_replaces_whole_value() {
        let store = AnalysisStore::new();
        store.install_analysis(uri(), analysis_with(&[1, 2])).await;
        store.install_analysis(uri(), analysis_with(&[3])).await;

        let current = store.analysis(&uri()).await.unwrap();
        assert_eq!(current.usages.len(), 1);
        assert_eq!(current.usages[0].row, 3);
    }

    #[tokio::test]
    async fn readers_hold_their_snapshot_across_updates() {
        let store = AnalysisStore::new();
        store.install_analysis(uri(), analysis_with(&[1])).await;
        let snapshot = store.analysis(&uri()).await.unwrap();

        store.install_analysis(uri(), analysis_with(&[2])).await;
        // The earlier snapshot is unaffected by the replacement.
        assert_eq!(snapshot.usages[0].row, 1);
        assert_eq!(store.analysis(&uri()).await.unwrap().usages[0].row, 2);
    }

    #[tokio::test]
    async fn reset_clears_documents_and_session_state() {
        let store = AnalysisStore::new();
        store.set_text(uri(), "(def x 1)".into()).await;
        store.install_analysis(uri(), analysis_with(&[1])).await;
        store.set_client_supports_tokens(true).await;

        store.reset().await;

        assert!(store.text(&uri()).await.is_none());
        assert!(store.analysis(&uri()).await.is_none());
        assert!(!store.client_supports_tokens().await);
        assert!(store.settings().await.semantic_tokens);
    }
}
