//! Backend-neutral boolean predicates over indexed field values.

use std::fmt;

/// Access to the indexed values of one entity.
pub trait FieldValues {
    /// The indexed strings of a field. Empty when the field has no value.
    fn values(&self, field: &str) -> &[String];
}

/// A boolean predicate over the fields of one entity type.
///
/// Matching is case-insensitive. Related fields are addressed by their
/// logical path; expressing the traversal is up to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Some value of `field` contains `term` as a substring.
    Contains { field: String, term: String },
    /// Some element of the multi-valued `field` equals `term`.
    ArrayContains { field: String, term: String },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn contains<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        Predicate::Contains {
            field: field.into(),
            term: term.into(),
        }
    }

    pub fn array_contains<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        Predicate::ArrayContains {
            field: field.into(),
            term: term.into(),
        }
    }

    /// Invert this predicate. Double negation collapses.
    pub fn negate(self) -> Self {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Combine with AND, flattening nested conjunctions on the left.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut clauses) => {
                clauses.push(other);
                Predicate::And(clauses)
            }
            left => Predicate::And(vec![left, other]),
        }
    }

    /// Combine with OR, flattening nested disjunctions on the left.
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut clauses) => {
                clauses.push(other);
                Predicate::Or(clauses)
            }
            left => Predicate::Or(vec![left, other]),
        }
    }

    /// Combine many predicates with AND (`match_all`) or OR.
    pub fn combine(predicates: Vec<Predicate>, match_all: bool) -> Option<Predicate> {
        let mut iter = predicates.into_iter();
        let first = iter.next()?;
        Some(iter.fold(first, |acc, next| {
            if match_all { acc.and(next) } else { acc.or(next) }
        }))
    }

    /// Evaluate against the indexed values of one entity.
    pub fn matches(&self, doc: &dyn FieldValues) -> bool {
        match self {
            Predicate::Contains { field, term } => {
                let needle = term.to_lowercase();
                doc.values(field)
                    .iter()
                    .any(|value| value.to_lowercase().contains(&needle))
            }
            Predicate::ArrayContains { field, term } => doc
                .values(field)
                .iter()
                .any(|value| value.to_lowercase() == term.to_lowercase()),
            Predicate::Not(inner) => !inner.matches(doc),
            Predicate::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Predicate::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
        }
    }

    /// Field names referenced by this predicate, in first-use order.
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Contains { field, .. } | Predicate::ArrayContains { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Predicate::Not(inner) => inner.collect_fields(out),
            Predicate::And(clauses) | Predicate::Or(clauses) => {
                for clause in clauses {
                    clause.collect_fields(out);
                }
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Contains { field, term } => write!(f, "{field} ~ {term:?}"),
            Predicate::ArrayContains { field, term } => write!(f, "{field} ∋ {term:?}"),
            Predicate::Not(inner) => write!(f, "NOT ({inner})"),
            Predicate::And(clauses) => write_joined(f, clauses, " AND "),
            Predicate::Or(clauses) => write_joined(f, clauses, " OR "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, clauses: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{clause}")?;
    }
    f.write_str(")")
}

/// Result of composing one scope: a predicate, or the explicit marker that
/// no field produced one and the scope matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
    Predicate(Predicate),
    MatchNone,
}

impl ScopeFilter {
    pub fn predicate(&self) -> Option<&Predicate> {
        match self {
            ScopeFilter::Predicate(p) => Some(p),
            ScopeFilter::MatchNone => None,
        }
    }
}
