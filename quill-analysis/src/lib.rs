//! Analysis data model for the Quill language server.
//!
//! This crate defines the boundary between the static analyzer and the
//! server runtime in `quill-lsp`:
//!
//! - [`Usage`] records, the analyzer's output: one located occurrence of a
//!   symbol with its classification tags.
//! - [`DocumentAnalysis`], the whole-value result installed per document.
//! - The [`Analyzer`] trait, implemented by whoever produces analyses.
//! - [`Settings`], deserialized from the client's `initializationOptions`.
//!
//! The analyzer itself lives elsewhere; everything here is the data it
//! hands over and the contract it implements.

pub mod analysis;
pub mod settings;
pub mod usage;

pub use analysis::{AnalyzeError, Analyzer, DocumentAnalysis};
pub use settings::Settings;
pub use usage::{LineRange, Usage, UsageTag};
