//! Term tokenizer for raw field values.
//!
//! Syntax understood:
//! - whitespace separates terms: `alpha beta`
//! - double quotes group a phrase into one term: `"annual report"`
//! - a leading `-` negates a term: `-draft`, `-"first draft"`
//! - the bare word `OR` switches the remaining terms of the field to OR
//!
//! An unterminated quote is kept as a literal character.

use crate::query::term::{SearchTerm, TermSequence};

/// The boolean OR keyword.
pub const OR_KEYWORD: &str = "OR";
/// Prefix negating a term.
pub const NEGATION_PREFIX: char = '-';
/// Phrase delimiter.
pub const QUOTE: char = '"';

/// Tokenize one raw field value.
pub fn tokenize(text: &str) -> TermSequence {
    if !needs_scan(text) {
        return split_words(text);
    }
    scan(text)
}

fn needs_scan(text: &str) -> bool {
    text.contains(QUOTE) || text.contains(OR_KEYWORD) || text.contains(NEGATION_PREFIX)
}

/// Fast path: plain whitespace-separated words.
pub(crate) fn split_words(text: &str) -> TermSequence {
    text.split_whitespace().map(SearchTerm::new).collect()
}

/// Full character scan honouring quotes, negation and the OR keyword.
pub(crate) fn scan(text: &str) -> TermSequence {
    match scan_with(text, None) {
        Ok(terms) => terms,
        // Rescan treating the unmatched quote as an ordinary character.
        Err(open_quote_at) => scan_with(text, Some(open_quote_at)).unwrap_or_default(),
    }
}

#[derive(Default)]
struct Token {
    text: String,
    started: bool,
    quoted: bool,
    negated: bool,
}

impl Token {
    fn push(&mut self, c: char) {
        if !self.started && !self.quoted && c == NEGATION_PREFIX && !self.negated {
            self.negated = true;
        } else {
            self.text.push(c);
        }
        self.started = true;
    }

    fn finish(self) -> Option<SearchTerm> {
        if !self.started {
            return None;
        }
        if !self.quoted && !self.negated && self.text == OR_KEYWORD {
            return Some(SearchTerm::meta(self.text));
        }
        if self.negated {
            if self.text.is_empty() {
                // A lone prefix is a literal dash.
                return Some(SearchTerm::new(NEGATION_PREFIX.to_string()));
            }
            return Some(SearchTerm::negated(self.text));
        }
        if self.text.is_empty() {
            return None;
        }
        Some(SearchTerm::new(self.text))
    }
}

/// Scan `text`. Returns the byte offset of an unterminated quote as the error.
fn scan_with(text: &str, literal_quote_at: Option<usize>) -> Result<TermSequence, usize> {
    let mut terms = Vec::new();
    let mut token = Token::default();
    let mut open_quote: Option<usize> = None;

    for (offset, c) in text.char_indices() {
        if c == QUOTE && literal_quote_at != Some(offset) {
            if open_quote.is_some() {
                open_quote = None;
            } else {
                open_quote = Some(offset);
                token.quoted = true;
                token.started = true;
            }
            continue;
        }

        if open_quote.is_some() {
            token.text.push(c);
            continue;
        }

        if c.is_whitespace() {
            if let Some(term) = std::mem::take(&mut token).finish() {
                terms.push(term);
            }
            continue;
        }

        token.push(c);
    }

    if let Some(offset) = open_quote {
        return Err(offset);
    }
    if let Some(term) = token.finish() {
        terms.push(term);
    }
    Ok(TermSequence::new(terms))
}
