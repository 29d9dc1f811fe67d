//! Builds one predicate from one field and one term sequence.

use crate::query::predicate::Predicate;
use crate::query::term::TermSequence;
use crate::schema::{FieldDescriptor, ValueKind};

/// Builder of field-scoped predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldQueryBuilder {
    /// Whether the backend can test set membership natively. Without it,
    /// multi-valued fields fall back to substring matching.
    array_membership: bool,
}

impl FieldQueryBuilder {
    pub fn new(array_membership: bool) -> Self {
        FieldQueryBuilder { array_membership }
    }

    /// Build the predicate for `terms` against `field`.
    ///
    /// Terms are folded left to right with AND; the OR keyword switches the
    /// fold to OR for the remaining terms of this field only. Negated terms
    /// are inverted before they are combined. Only the field's term transform
    /// is applied here; value transforms belong to indexing.
    ///
    /// Returns `None` when the sequence holds no matchable term.
    pub fn build(
        &self,
        field: &FieldDescriptor,
        kind: ValueKind,
        terms: &TermSequence,
    ) -> Option<Predicate> {
        let mut use_or = false;
        let mut result: Option<Predicate> = None;

        for term in terms {
            if term.is_meta() {
                use_or = true;
                continue;
            }

            let text = match field.term_transform() {
                Some(transform) => transform.apply(term.text()),
                None => term.text().to_string(),
            };
            if text.is_empty() {
                continue;
            }

            let mut predicate = if kind.is_multi_valued() && self.array_membership {
                Predicate::array_contains(field.name(), text)
            } else {
                Predicate::contains(field.name(), text)
            };
            if term.is_negated() {
                predicate = predicate.negate();
            }

            result = Some(match result {
                None => predicate,
                Some(acc) if use_or => acc.or(predicate),
                Some(acc) => acc.and(predicate),
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tokenizer::tokenize;
    use crate::schema::TermTransform;

    fn field(name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name).unwrap()
    }

    #[test]
    fn test_terms_are_anded_by_default() {
        let builder = FieldQueryBuilder::default();
        let predicate = builder
            .build(&field("title"), ValueKind::Text, &tokenize("annual report"))
            .unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::contains("title", "annual"),
                Predicate::contains("title", "report"),
            ])
        );
    }

    #[test]
    fn test_or_keyword_switches_remaining_terms() {
        let builder = FieldQueryBuilder::default();
        let predicate = builder
            .build(&field("title"), ValueKind::Text, &tokenize("a b OR c d"))
            .unwrap();
        assert_eq!(
            predicate,
            Predicate::Or(vec![
                Predicate::And(vec![
                    Predicate::contains("title", "a"),
                    Predicate::contains("title", "b"),
                ]),
                Predicate::contains("title", "c"),
                Predicate::contains("title", "d"),
            ])
        );
    }

    #[test]
    fn test_negated_terms_are_inverted() {
        let builder = FieldQueryBuilder::default();
        let predicate = builder
            .build(&field("title"), ValueKind::Text, &tokenize("report -draft"))
            .unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::contains("title", "report"),
                Predicate::contains("title", "draft").negate(),
            ])
        );
    }

    #[test]
    fn test_multi_valued_fields_use_membership_when_supported() {
        let terms = tokenize("red");
        let native = FieldQueryBuilder::new(true)
            .build(&field("colors"), ValueKind::List, &terms)
            .unwrap();
        assert_eq!(native, Predicate::array_contains("colors", "red"));

        let fallback = FieldQueryBuilder::new(false)
            .build(&field("colors"), ValueKind::List, &terms)
            .unwrap();
        assert_eq!(fallback, Predicate::contains("colors", "red"));
    }

    #[test]
    fn test_term_transform_is_applied() {
        let uuid_field = field("uuid").with_term_transform(TermTransform::canonical_uuid());
        let predicate = FieldQueryBuilder::default()
            .build(
                &uuid_field,
                ValueKind::Text,
                &tokenize("67E5504410B1426F9247BB680E5FE0C8"),
            )
            .unwrap();
        assert_eq!(
            predicate,
            Predicate::contains("uuid", "67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
    }

    #[test]
    fn test_empty_sequences_build_nothing() {
        let builder = FieldQueryBuilder::default();
        assert!(builder.build(&field("title"), ValueKind::Text, &tokenize("")).is_none());
        assert!(builder.build(&field("title"), ValueKind::Text, &tokenize("OR")).is_none());
    }
}
