//! Language server runtime for Quill.
//!
//! This crate is the event-orchestration core of the server process. It
//! takes the raw, high-frequency event stream an editor produces (edits,
//! watched-file notifications, protocol requests), collapses bursts, and
//! drives the analysis pipeline that every request handler reads from.
//!
//! Architecture
//!
//!     LSP Layer (tower-lsp):
//!         - JSON-RPC framing, handshake, request routing
//!
//!     Server Layer ([`server`]):
//!         - Implements the `LanguageServer` trait
//!         - Owns the [`store::AnalysisStore`] and the pipeline handles
//!         - Thin: handlers read the store and call the feature layer
//!
//!     Pipeline Layer ([`pipeline`]):
//!         - Keyed and collapse-all debouncing of event bursts
//!         - One supervised consumer task per pipeline; a failure in one
//!           pipeline never stops the others
//!         - A single-flight guard for operations that must not overlap
//!
//!     Feature Layer ([`features`]):
//!         - Pure transformations over analysis results, dense unit tests
//!         - Semantic-token encoding (full document and range)
//!
//! The static analyzer is a collaborator supplied by the embedder via the
//! `quill_analysis::Analyzer` trait; this crate never parses source text
//! itself. Logging goes through `tracing`; install a subscriber writing
//! to stderr, since stdout carries the protocol.

pub mod features;
pub mod pipeline;
pub mod server;
pub mod store;

pub use server::QuillLanguageServer;

use std::sync::Arc;

use quill_analysis::Analyzer;
use tower_lsp::{LspService, Server};

/// Serve LSP over stdio with the given analyzer until the client
/// disconnects.
pub async fn run_stdio<A: Analyzer>(analyzer: Arc<A>) {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) =
        LspService::new(move |client| QuillLanguageServer::new(client, analyzer.clone()));
    Server::new(stdin, stdout, socket).serve(service).await;
}
