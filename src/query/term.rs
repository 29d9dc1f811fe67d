//! Search terms produced by the tokenizer.

use std::fmt;
use std::ops::Deref;

/// An atomic search token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTerm {
    text: String,
    negated: bool,
    is_meta: bool,
}

impl SearchTerm {
    /// Create a plain (non-negated, non-meta) term.
    pub fn new<S: Into<String>>(text: S) -> Self {
        SearchTerm {
            text: text.into(),
            negated: false,
            is_meta: false,
        }
    }

    /// Create a negated term.
    pub fn negated<S: Into<String>>(text: S) -> Self {
        SearchTerm {
            text: text.into(),
            negated: true,
            is_meta: false,
        }
    }

    /// Create a meta term (the boolean OR keyword).
    pub fn meta<S: Into<String>>(text: S) -> Self {
        SearchTerm {
            text: text.into(),
            negated: false,
            is_meta: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_meta(&self) -> bool {
        self.is_meta
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("-")?;
        }
        if self.text.chars().any(char::is_whitespace) {
            write!(f, "\"{}\"", self.text)
        } else {
            f.write_str(&self.text)
        }
    }
}

/// An ordered, immutable list of search terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TermSequence {
    terms: Vec<SearchTerm>,
}

impl TermSequence {
    pub fn new(terms: Vec<SearchTerm>) -> Self {
        TermSequence { terms }
    }

    /// True when the sequence has no non-meta term to match on.
    pub fn is_effectively_empty(&self) -> bool {
        self.terms.iter().all(SearchTerm::is_meta)
    }
}

impl Deref for TermSequence {
    type Target = [SearchTerm];

    fn deref(&self) -> &[SearchTerm] {
        &self.terms
    }
}

impl FromIterator<SearchTerm> for TermSequence {
    fn from_iter<I: IntoIterator<Item = SearchTerm>>(iter: I) -> Self {
        TermSequence::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TermSequence {
    type Item = &'a SearchTerm;
    type IntoIter = std::slice::Iter<'a, SearchTerm>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}
