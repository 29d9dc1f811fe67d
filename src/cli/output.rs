//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, ScopeSearchArgs};
use crate::error::Result;

/// Result structure for search operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchOutput {
    pub entity_type: String,
    pub actor: String,
    pub total: usize,
    pub duration_ms: u64,
    pub results: Vec<ResultRow>,
}

/// One search result.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultRow {
    pub id: u64,
    pub key: Option<String>,
    pub label: Option<String>,
}

/// Registry topology of a fixture.
#[derive(Debug, Serialize, Deserialize)]
pub struct DescribeOutput {
    pub entity_types: Vec<EntityTypeInfo>,
    pub junctions: Vec<JunctionInfo>,
}

/// One registered entity type.
#[derive(Debug, Serialize, Deserialize)]
pub struct EntityTypeInfo {
    pub name: String,
    pub permission: Option<String>,
    pub aliases: Vec<String>,
    pub documents: usize,
    pub fields: Vec<FieldInfo>,
}

/// One registered field.
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub label: String,
    pub free_text: bool,
    /// Entity type reached by a related field.
    pub related: Option<String>,
    pub reverse_path: Vec<String>,
}

/// One junction crossed by a registered field.
#[derive(Debug, Serialize, Deserialize)]
pub struct JunctionInfo {
    pub junction: String,
    pub owner: String,
    pub field: String,
    pub left: String,
    pub right: String,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &ScopeSearchArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &ScopeSearchArgs) -> Result<()> {
    if args.verbosity() > 1 {
        println!("{message}");
        println!();
    }

    // Convert to JSON value for easier manipulation
    let value = serde_json::to_value(result)?;
    if value.get("results").is_some() {
        output_search_human(&value);
    } else if value.get("entity_types").is_some() {
        output_describe_human(&value);
    } else {
        output_generic_human(&value);
    }
    Ok(())
}

fn output_search_human(value: &serde_json::Value) {
    let entity_type = value["entity_type"].as_str().unwrap_or_default();
    let actor = value["actor"].as_str().unwrap_or_default();
    println!("Search Results ({entity_type}, as {actor}):");
    println!("═══════════════");

    if let Some(rows) = value["results"].as_array() {
        for row in rows {
            let id = row["id"].as_u64().unwrap_or_default();
            let key = row["key"].as_str().unwrap_or("-");
            match row["label"].as_str() {
                Some(label) => println!("  #{id:<6} {key:<12} {label}"),
                None => println!("  #{id:<6} {key}"),
            }
        }
    }

    println!();
    println!("Total: {}", value["total"].as_u64().unwrap_or_default());
    println!("Search time: {}ms", value["duration_ms"].as_u64().unwrap_or_default());
}

fn output_describe_human(value: &serde_json::Value) {
    println!("Entity Types:");
    println!("═════════════");
    for entity_type in value["entity_types"].as_array().into_iter().flatten() {
        println!();
        println!(
            "{} ({} documents)",
            entity_type["name"].as_str().unwrap_or_default(),
            entity_type["documents"].as_u64().unwrap_or_default()
        );
        if let Some(permission) = entity_type["permission"].as_str() {
            println!("  permission: {permission}");
        }
        for alias in entity_type["aliases"].as_array().into_iter().flatten() {
            println!("  alias: {}", alias.as_str().unwrap_or_default());
        }
        for field in entity_type["fields"].as_array().into_iter().flatten() {
            let marker = if field["free_text"].as_bool().unwrap_or(false) { "*" } else { " " };
            let name = field["name"].as_str().unwrap_or_default();
            match field["related"].as_str() {
                Some(related) => {
                    let reverse: Vec<&str> = field["reverse_path"]
                        .as_array()
                        .into_iter()
                        .flatten()
                        .filter_map(|hop| hop.as_str())
                        .collect();
                    println!("  {marker} {name} -> {related} (back: {})", reverse.join("."));
                }
                None => println!("  {marker} {name}"),
            }
        }
    }

    let junctions = value["junctions"].as_array();
    if junctions.is_some_and(|j| !j.is_empty()) {
        println!();
        println!("Junctions:");
        println!("──────────");
        for junction in junctions.into_iter().flatten() {
            println!(
                "  {} ({} <-> {}) for {}.{}",
                junction["junction"].as_str().unwrap_or_default(),
                junction["left"].as_str().unwrap_or_default(),
                junction["right"].as_str().unwrap_or_default(),
                junction["owner"].as_str().unwrap_or_default(),
                junction["field"].as_str().unwrap_or_default()
            );
        }
    }
}

fn output_generic_human(value: &serde_json::Value) {
    if let Some(obj) = value.as_object() {
        for (key, value) in obj {
            println!("{key}: {value}");
        }
    } else {
        println!("{value}");
    }
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &ScopeSearchArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}
