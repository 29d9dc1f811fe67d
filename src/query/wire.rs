//! Flat, prefix-encoded query dictionaries.
//!
//! Wire keys:
//!
//! | key                        | meaning                                    |
//! |----------------------------|--------------------------------------------|
//! | `title`                    | field of the default scope `0`             |
//! | `q`                        | free-text value of the default scope       |
//! | `match_all`                | match-all flag of the default scope        |
//! | `__A__title`               | field of scope `A`                         |
//! | `__A__match_all`           | match-all flag of scope `A`                |
//! | `__op__A_B` = `and=R`      | operator `R` = `A AND B` (`or` for OR)     |
//! | `__result` = `R`           | scope or operator producing the result     |
//!
//! Scope identifiers never contain `_`. Entries are inspected once, in order;
//! a repeated key overwrites the earlier value.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeSearchError};
use crate::query::scope::ScopeQuery;

/// Marker opening and closing a scope identifier.
pub const SCOPE_MARKER: &str = "__";
/// Prefix of operator definitions.
pub const OPERATOR_PREFIX: &str = "__op__";
/// Key selecting the result scope.
pub const RESULT_KEY: &str = "__result";
/// Field key carrying a scope's match-all flag.
pub const MATCH_ALL_KEY: &str = "match_all";
/// Scope receiving unscoped entries.
pub const DEFAULT_SCOPE: &str = "0";

/// A flat string-keyed query as received from the API layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireQuery(Vec<(String, String)>);

impl WireQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append an entry.
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    /// Parse `key=value` arguments.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut query = WireQuery::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                ScopeSearchError::query(format!("Expected KEY=VALUE, got '{arg}'"))
            })?;
            query = query.with(key, value);
        }
        Ok(query)
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WireQuery {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        WireQuery(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Set combinator of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    And,
    Or,
}

impl FromStr for Combinator {
    type Err = ScopeSearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Combinator::And),
            "or" => Ok(Combinator::Or),
            other => Err(ScopeSearchError::configuration(format!(
                "Unknown operator combinator '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => f.write_str("and"),
            Combinator::Or => f.write_str("or"),
        }
    }
}

/// A named combination of scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operator {
    pub operands: Vec<String>,
    pub combinator: Combinator,
}

/// The decoded scope tree of one search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryTree {
    pub scopes: BTreeMap<String, ScopeQuery>,
    pub operators: BTreeMap<String, Operator>,
    pub result_scope: String,
}

impl QueryTree {
    /// Decode a wire query in a single pass.
    ///
    /// Scopes start with `match_all_default`. Malformed match-all values and
    /// keys with an empty scope identifier are dropped. Malformed operator
    /// definitions are configuration errors.
    pub fn decode(query: &WireQuery, match_all_default: bool) -> Result<QueryTree> {
        let mut tree = QueryTree {
            scopes: BTreeMap::new(),
            operators: BTreeMap::new(),
            result_scope: DEFAULT_SCOPE.to_string(),
        };

        for (key, value) in query.entries() {
            if key == RESULT_KEY {
                tree.result_scope = value.trim().to_string();
            } else if let Some(definition) = key.strip_prefix(OPERATOR_PREFIX) {
                let (alias, operator) = parse_operator(definition, value)?;
                tree.operators.insert(alias, operator);
            } else if let Some(rest) = key.strip_prefix(SCOPE_MARKER) {
                match rest.split_once(SCOPE_MARKER) {
                    Some((scope_id, field)) if is_scope_id(scope_id) && !field.is_empty() => {
                        tree.set(scope_id, field, value, match_all_default);
                    }
                    _ => log::warn!("dropping malformed scoped key '{key}'"),
                }
            } else {
                tree.set(DEFAULT_SCOPE, key, value, match_all_default);
            }
        }

        log::debug!(
            "decoded query: {} scopes, {} operators, result '{}'",
            tree.scopes.len(),
            tree.operators.len(),
            tree.result_scope
        );
        Ok(tree)
    }

    fn set(&mut self, scope_id: &str, field: &str, value: &str, match_all_default: bool) {
        let scope = self
            .scopes
            .entry(scope_id.to_string())
            .or_insert_with(|| ScopeQuery::new(match_all_default));

        if field == MATCH_ALL_KEY {
            match parse_flag(value) {
                Some(flag) => scope.match_all = flag,
                None => log::warn!("dropping malformed match_all value '{value}' of scope '{scope_id}'"),
            }
        } else {
            scope.fields.insert(field.to_string(), value.to_string());
        }
    }
}

fn is_scope_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('_')
}

fn parse_operator(definition: &str, value: &str) -> Result<(String, Operator)> {
    let operands: Vec<String> = definition.split('_').map(str::to_string).collect();
    if operands.len() < 2 || operands.iter().any(String::is_empty) {
        return Err(ScopeSearchError::configuration(format!(
            "Operator '{OPERATOR_PREFIX}{definition}' must name at least two scopes"
        )));
    }

    let (combinator, alias) = value.split_once('=').ok_or_else(|| {
        ScopeSearchError::configuration(format!(
            "Operator '{OPERATOR_PREFIX}{definition}' value must be 'and=<alias>' or 'or=<alias>'"
        ))
    })?;
    let alias = alias.trim();
    if alias.is_empty() {
        return Err(ScopeSearchError::configuration(format!(
            "Operator '{OPERATOR_PREFIX}{definition}' has an empty result alias"
        )));
    }

    Ok((
        alias.to_string(),
        Operator {
            operands,
            combinator: combinator.parse()?,
        },
    ))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
