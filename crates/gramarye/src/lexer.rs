//! Dynamic lexer over a built token vocabulary.
//!
//! Tokens are tried in vocabulary order with anchored matching, first
//! match wins. A keyword defers to one of its `longer_alts` terminals
//! when that terminal matches strictly more input. Unmatched input is
//! coalesced into a single diagnostic per run of bad characters.

use rowan::{TextRange, TextSize};

use crate::diagnostics::Diagnostics;
use crate::tokens::{TokenGroup, TokenVocabulary};

/// One lexed token, pointing into the vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Vocabulary index.
    pub token: usize,
    pub range: TextRange,
    /// Hidden tokens go to the CST but not to the parser.
    pub hidden: bool,
}

pub fn tokenize(vocabulary: &TokenVocabulary, text: &str) -> (Vec<Token>, Diagnostics) {
    let mut tokens = Vec::new();
    let mut diagnostics = Diagnostics::new();
    let mut pos = 0usize;
    let mut garbage_start: Option<usize> = None;

    while pos < text.len() {
        match match_at(vocabulary, text, pos) {
            Some((index, len)) => {
                if let Some(start) = garbage_start.take() {
                    report_garbage(&mut diagnostics, text, start, pos);
                }
                let range = range_of(pos, pos + len);
                match vocabulary.get(index).group {
                    TokenGroup::Skipped => {}
                    TokenGroup::Hidden => tokens.push(Token {
                        token: index,
                        range,
                        hidden: true,
                    }),
                    TokenGroup::Default => tokens.push(Token {
                        token: index,
                        range,
                        hidden: false,
                    }),
                }
                pos += len;
            }
            None => {
                garbage_start.get_or_insert(pos);
                pos += text[pos..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }
    if let Some(start) = garbage_start {
        report_garbage(&mut diagnostics, text, start, pos);
    }

    (tokens, diagnostics)
}

fn match_at(vocabulary: &TokenVocabulary, text: &str, pos: usize) -> Option<(usize, usize)> {
    for (index, token) in vocabulary.tokens.iter().enumerate() {
        let Some(len) = token.match_len(text, pos) else {
            continue;
        };
        if len == 0 {
            continue;
        }
        // Maximal munch: a longer-matching alternative terminal beats
        // the keyword.
        let longer = token
            .longer_alts
            .iter()
            .filter_map(|&alt| {
                let alt_len = vocabulary.get(alt).match_len(text, pos)?;
                (alt_len > len).then_some((alt, alt_len))
            })
            .max_by_key(|&(_, alt_len)| alt_len);
        return Some(longer.unwrap_or((index, len)));
    }
    None
}

fn report_garbage(diagnostics: &mut Diagnostics, text: &str, start: usize, end: usize) {
    diagnostics.error(
        format!("unexpected characters: '{}'", &text[start..end]),
        range_of(start, end),
    );
}

fn range_of(start: usize, end: usize) -> TextRange {
    TextRange::new(TextSize::new(start as u32), TextSize::new(end as u32))
}
