//! Query compilation: tokenizing raw values, building field predicates,
//! composing scopes and decoding the wire format into a scope tree.

pub mod field;
pub mod predicate;
pub mod scope;
pub mod term;
pub mod tokenizer;
pub mod wire;

pub use self::field::FieldQueryBuilder;
pub use self::predicate::{FieldValues, Predicate, ScopeFilter};
pub use self::scope::{ANY_FIELD, QueryMode, ScopeQuery, ScopeQueryComposer};
pub use self::term::{SearchTerm, TermSequence};
pub use self::tokenizer::tokenize;
pub use self::wire::{Combinator, Operator, QueryTree, WireQuery};
