//! Semantic-token encoding.
//!
//! Converts the analyzer's [`Usage`] records into the protocol's
//! relative-integer token stream: classify each usage by tag, expand it
//! into absolute single-line spans, then delta-encode against the
//! previous token. The whole transformation is pure; callers hand in a
//! snapshot of usages and get the wire payload back.

use quill_analysis::{LineRange, Usage, UsageTag};
use tower_lsp::lsp_types::{SemanticToken, SemanticTokenType};

/// Legend order; a token's `token_type` is its index in this table.
pub const TOKEN_TYPES: &[SemanticTokenType] = &[
    SemanticTokenType::TYPE,     // 0
    SemanticTokenType::FUNCTION, // 1
    SemanticTokenType::MACRO,    // 2
];

/// No modifier categories are defined; every token carries an empty
/// bitset.
const NO_MODIFIERS: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Type = 0,
    Function = 1,
    Macro = 2,
}

/// One highlightable span in 0-indexed protocol coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AbsoluteToken {
    line: u32,
    start: u32,
    length: u32,
    kind: TokenKind,
}

/// Encode tokens for a whole document.
pub fn full_tokens(usages: &[Usage]) -> Vec<SemanticToken> {
    encode(expand(usages.iter()))
}

/// Encode tokens for the usages fully contained in `range`. A usage that
/// only partially overlaps the range is excluded whole, not clipped.
pub fn range_tokens(usages: &[Usage], range: LineRange) -> Vec<SemanticToken> {
    encode(expand(usages.iter().filter(|usage| range.contains(usage))))
}

/// Classify and expand usages into ordered absolute tokens.
fn expand<'a>(usages: impl Iterator<Item = &'a Usage>) -> Vec<AbsoluteToken> {
    let mut selected: Vec<&Usage> = usages.collect();
    // Delta encoding is only correct over (row, col)-sorted input.
    selected.sort_by_key(|usage| (usage.row, usage.col));

    let mut tokens = Vec::with_capacity(selected.len());
    for usage in selected {
        classify(usage, &mut tokens);
    }
    tokens
}

/// Turn one usage into zero, one, or two tokens. Tags are not mutually
/// exclusive, so the rules run in priority order and the first match
/// wins.
fn classify(usage: &Usage, out: &mut Vec<AbsoluteToken>) {
    if usage.has_tag(UsageTag::Macro) {
        out.push(span_token(usage, TokenKind::Macro));
    } else if usage.has_tag(UsageTag::Declared) || usage.has_tag(UsageTag::Referred) {
        out.push(span_token(usage, TokenKind::Function));
    } else if usage.has_tag(UsageTag::AliasReference) {
        alias_tokens(usage, out);
    }
    // No matching tag: the usage produces no token.
}

/// Token covering the usage's whole span, converted to 0-indexed
/// protocol coordinates. Tokenizable usages are single-line.
fn span_token(usage: &Usage, kind: TokenKind) -> AbsoluteToken {
    AbsoluteToken {
        line: usage.row - 1,
        start: usage.col - 1,
        length: usage.end_col - usage.col,
        kind,
    }
}

/// Split a qualified `alias/name` reference at the first separator:
/// the alias part highlights as a type, the name part as a function.
/// Without a separator the usage degrades to one function token.
fn alias_tokens(usage: &Usage, out: &mut Vec<AbsoluteToken>) {
    let Some(slash) = usage.raw_text.find('/') else {
        out.push(span_token(usage, TokenKind::Function));
        return;
    };
    let slash = slash as u32;
    out.push(AbsoluteToken {
        line: usage.row - 1,
        start: usage.col - 1,
        length: slash,
        kind: TokenKind::Type,
    });
    out.push(AbsoluteToken {
        line: usage.row - 1,
        start: usage.col + slash,
        length: usage.end_col - (usage.col + slash + 1),
        kind: TokenKind::Function,
    });
}

/// Delta-encode an ordered absolute token sequence into the wire form:
/// first token absolute; same line as the previous token, start becomes
/// a delta; new line, start stays absolute.
fn encode(tokens: Vec<AbsoluteToken>) -> Vec<SemanticToken> {
    let mut data = Vec::with_capacity(tokens.len());
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for token in tokens {
        // Zero-length spans (an alias part degenerated by a leading or
        // trailing separator) carry no highlight.
        if token.length == 0 {
            continue;
        }
        let delta_line = token.line - prev_line;
        let delta_start = if delta_line == 0 {
            token.start - prev_start
        } else {
            token.start
        };
        data.push(SemanticToken {
            delta_line,
            delta_start,
            length: token.length,
            token_type: token.kind as u32,
            token_modifiers_bitset: NO_MODIFIERS,
        });
        prev_line = token.line;
        prev_start = token.start;
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn usage(row: u32, col: u32, end_col: u32, tags: &[UsageTag]) -> Usage {
        Usage {
            row,
            col,
            end_row: row,
            end_col,
            tags: tags.to_vec(),
            raw_text: String::new(),
        }
    }

    /// Rebuild absolute `(line, start, length, type)` tuples by
    /// prefix-summing the deltas.
    fn decode(data: &[SemanticToken]) -> Vec<(u32, u32, u32, u32)> {
        let mut out = Vec::new();
        let mut line = 0u32;
        let mut start = 0u32;
        for token in data {
            line += token.delta_line;
            start = if token.delta_line == 0 {
                start + token.delta_start
            } else {
                token.delta_start
            };
            out.push((line, start, token.length, token.token_type));
        }
        out
    }

    #[test]
    fn legend_order_matches_type_indices() {
        assert_eq!(TOKEN_TYPES[TokenKind::Type as usize], SemanticTokenType::TYPE);
        assert_eq!(
            TOKEN_TYPES[TokenKind::Function as usize],
            SemanticTokenType::FUNCTION
        );
        assert_eq!(TOKEN_TYPES[TokenKind::Macro as usize], SemanticTokenType::MACRO);
    }

    #[test]
    fn single_usages_map_to_expected_types() {
        let usages = vec![
            usage(1, 1, 5, &[UsageTag::Macro]),
            usage(2, 1, 5, &[UsageTag::Declared]),
            usage(3, 1, 5, &[UsageTag::Referred]),
        ];
        let decoded = decode(&full_tokens(&usages));
        assert_eq!(
            decoded,
            vec![
                (0, 0, 4, TokenKind::Macro as u32),
                (1, 0, 4, TokenKind::Function as u32),
                (2, 0, 4, TokenKind::Function as u32),
            ]
        );
    }

    #[test]
    fn macro_tag_outranks_other_tags() {
        let usages = vec![usage(1, 1, 5, &[UsageTag::Declared, UsageTag::Macro])];
        let data = full_tokens(&usages);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].token_type, TokenKind::Macro as u32);
    }

    #[test]
    fn untagged_usage_produces_no_token() {
        let usages = vec![usage(1, 1, 5, &[])];
        assert!(full_tokens(&usages).is_empty());
    }

    #[test]
    fn alias_reference_splits_into_type_and_function() {
        let mut qualified = usage(1, 1, 11, &[UsageTag::AliasReference]);
        qualified.raw_text = "foo/barbaz".into();

        let decoded = decode(&full_tokens(&[qualified]));
        assert_eq!(
            decoded,
            vec![
                // `foo`: characters 1-3 of the source line.
                (0, 0, 3, TokenKind::Type as u32),
                // `barbaz`: characters 5-10.
                (0, 4, 6, TokenKind::Function as u32),
            ]
        );
    }

    #[test]
    fn alias_reference_with_leading_separator_drops_empty_alias_part() {
        let mut degenerate = usage(1, 1, 8, &[UsageTag::AliasReference]);
        degenerate.raw_text = "/barbaz".into();

        let decoded = decode(&full_tokens(&[degenerate]));
        // Only the name part survives; no zero-length type token.
        assert_eq!(decoded, vec![(0, 1, 6, TokenKind::Function as u32)]);
    }

    #[test]
    fn alias_reference_with_trailing_separator_drops_empty_name_part() {
        let mut degenerate = usage(1, 1, 5, &[UsageTag::AliasReference]);
        degenerate.raw_text = "foo/".into();

        let decoded = decode(&full_tokens(&[degenerate]));
        assert_eq!(decoded, vec![(0, 0, 3, TokenKind::Type as u32)]);
    }

    #[test]
    fn alias_reference_without_separator_degrades_to_function() {
        let mut unqualified = usage(1, 1, 7, &[UsageTag::AliasReference]);
        unqualified.raw_text = "barbaz".into();

        let data = full_tokens(&[unqualified]);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].token_type, TokenKind::Function as u32);
        assert_eq!(data[0].length, 6);
    }

    #[test]
    fn same_line_tokens_use_start_deltas() {
        let usages = vec![
            usage(1, 1, 4, &[UsageTag::Declared]),
            usage(1, 10, 14, &[UsageTag::Referred]),
        ];
        let data = full_tokens(&usages);
        assert_eq!(data[0].delta_line, 0);
        assert_eq!(data[0].delta_start, 0);
        assert_eq!(data[1].delta_line, 0);
        assert_eq!(data[1].delta_start, 9);
    }

    #[test]
    fn new_line_resets_start_to_absolute() {
        let usages = vec![
            usage(2, 8, 12, &[UsageTag::Declared]),
            usage(5, 3, 6, &[UsageTag::Referred]),
        ];
        let data = full_tokens(&usages);
        assert_eq!(data[0].delta_line, 1);
        assert_eq!(data[0].delta_start, 7);
        assert_eq!(data[1].delta_line, 3);
        // Absolute, not relative to the previous token's start.
        assert_eq!(data[1].delta_start, 2);
    }

    #[test]
    fn range_includes_usages_on_exact_bounds() {
        let usages = vec![
            usage(3, 1, 4, &[UsageTag::Declared]),
            usage(7, 1, 4, &[UsageTag::Referred]),
        ];
        let data = range_tokens(&usages, LineRange { row: 3, end_row: 7 });
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn range_excludes_partial_overlap_entirely() {
        // Starts inside the range, ends one line past it: excluded, not
        // clipped.
        let mut straddling = usage(7, 1, 4, &[UsageTag::Declared]);
        straddling.end_row = 8;
        let inside = usage(4, 1, 4, &[UsageTag::Referred]);

        let data = range_tokens(&[straddling, inside], LineRange { row: 3, end_row: 7 });
        let decoded = decode(&data);
        assert_eq!(decoded, vec![(3, 0, 3, TokenKind::Function as u32)]);
    }

    #[test]
    fn modifier_bitset_is_always_empty() {
        let usages = vec![
            usage(1, 1, 5, &[UsageTag::Macro]),
            usage(2, 1, 5, &[UsageTag::Declared]),
        ];
        assert!(full_tokens(&usages)
            .iter()
            .all(|token| token.token_modifiers_bitset == 0));
    }

    fn arb_tags() -> impl Strategy<Value = Vec<UsageTag>> {
        prop_oneof![
            Just(vec![UsageTag::Macro]),
            Just(vec![UsageTag::Declared]),
            Just(vec![UsageTag::Referred]),
            Just(Vec::new()),
        ]
    }

    /// Usages with distinct start positions, the analyzer's contract.
    fn arb_usages() -> impl Strategy<Value = Vec<Usage>> {
        prop::collection::hash_map((1u32..40, 1u32..60), (1u32..12, arb_tags()), 0..24).prop_map(
            |entries| {
                entries
                    .into_iter()
                    .map(|((row, col), (len, tags))| Usage {
                        row,
                        col,
                        end_row: row,
                        end_col: col + len,
                        tags,
                        raw_text: String::new(),
                    })
                    .collect()
            },
        )
    }

    proptest! {
        /// Input order must not matter: sorting is internal.
        #[test]
        fn encoding_is_permutation_invariant(mut usages in arb_usages()) {
            let forward = full_tokens(&usages);
            usages.reverse();
            prop_assert_eq!(full_tokens(&usages), forward);
        }

        /// Decoding the deltas reproduces each tagged usage's absolute
        /// 0-indexed position and length.
        #[test]
        fn deltas_round_trip_to_absolute_positions(usages in arb_usages()) {
            let decoded = decode(&full_tokens(&usages));

            let mut expected: Vec<(u32, u32, u32)> = usages
                .iter()
                .filter(|usage| !usage.tags.is_empty())
                .map(|usage| (usage.row - 1, usage.col - 1, usage.end_col - usage.col))
                .collect();
            expected.sort();

            let mut actual: Vec<(u32, u32, u32)> = decoded
                .iter()
                .map(|&(line, start, length, _)| (line, start, length))
                .collect();
            actual.sort();

            prop_assert_eq!(actual, expected);
        }
    }
}
