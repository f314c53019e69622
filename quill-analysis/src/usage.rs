//! Symbol occurrences as produced by the analyzer.

use serde::{Deserialize, Serialize};

/// Classification label attached to a [`Usage`].
///
/// A usage may carry several tags at once (a declared var is also a
/// referable symbol); consumers decide which tag wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageTag {
    /// Invocation of a macro.
    Macro,
    /// Definition site of a symbol.
    Declared,
    /// Reference to a symbol defined elsewhere in the same namespace.
    Referred,
    /// Qualified reference through a namespace alias, `alias/name`.
    AliasReference,
}

/// One occurrence of a symbol in source text.
///
/// Positions are 1-indexed line/column bounds, columns half-open in the
/// sense that the occurrence spans `[col, end_col)` on `row`. `raw_text`
/// is the original source slice and is only consulted for
/// [`UsageTag::AliasReference`], where it locates the separator between
/// the alias and the referenced name.
///
/// Usages are produced and owned by the analyzer; the server treats them
/// as immutable input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub row: u32,
    pub col: u32,
    pub end_row: u32,
    pub end_col: u32,
    #[serde(default)]
    pub tags: Vec<UsageTag>,
    #[serde(default)]
    pub raw_text: String,
}

impl Usage {
    pub fn has_tag(&self, tag: UsageTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Inclusive 1-indexed line bounds used to restrict a token query to part
/// of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub row: u32,
    pub end_row: u32,
}

impl LineRange {
    /// A usage is kept only when it lies entirely inside the range;
    /// partial overlap at a boundary excludes the whole usage.
    pub fn contains(&self, usage: &Usage) -> bool {
        usage.row >= self.row && usage.end_row <= self.end_row
    }
}
