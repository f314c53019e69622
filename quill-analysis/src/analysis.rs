//! The analyzer boundary: result type, error type, and the trait the
//! server runtime calls through.

use lsp_types::{Diagnostic, Range, TextEdit, Url};
use thiserror::Error;

use crate::usage::Usage;

/// Complete analysis result for one document.
///
/// The server installs these whole-value per URI: an update replaces the
/// previous result, it never merges into it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentAnalysis {
    pub usages: Vec<Usage>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to read {uri}: {source}")]
    Read {
        uri: Url,
        #[source]
        source: std::io::Error,
    },
    #[error("document {uri} is not tracked")]
    UnknownDocument { uri: Url },
    #[error("analysis failed: {0}")]
    Analysis(String),
}

/// Static analyzer collaborator.
///
/// Implementations produce [`Usage`] records and diagnostics for a
/// document, and perform range formatting on request. Both operations are
/// synchronous; the runtime schedules them from its own tasks.
pub trait Analyzer: Send + Sync + 'static {
    fn analyze(&self, uri: &Url, text: &str) -> Result<DocumentAnalysis, AnalyzeError>;

    fn format_range(
        &self,
        uri: &Url,
        text: &str,
        range: Range,
    ) -> Result<Vec<TextEdit>, AnalyzeError>;
}
