//! Command implementations for the scopesearch CLI.

use std::time::Instant;

use crate::cli::args::*;
use crate::cli::fixture::{Fixture, LoadedFixture};
use crate::cli::output::*;
use crate::config::SearchConfig;
use crate::error::Result;
use crate::query::WireQuery;
use crate::schema::{EntityRef, EntityTypeName};
use crate::search::{Actor, SearchBackend};

/// Execute a CLI command.
pub fn execute_command(args: ScopeSearchArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => SearchConfig::from_file(path)?,
        None => SearchConfig::default(),
    };

    match &args.command {
        Command::Search(search_args) => run_search(search_args, &config, &args),
        Command::Describe(describe_args) => describe(describe_args, &config, &args),
    }
}

fn load_fixture(path: &std::path::Path, config: &SearchConfig) -> Result<LoadedFixture> {
    log::info!("loading fixture {}", path.display());
    Fixture::from_file(path)?.load(config)
}

/// Run a scoped query against a fixture.
fn run_search(args: &SearchArgs, config: &SearchConfig, cli_args: &ScopeSearchArgs) -> Result<()> {
    let loaded = load_fixture(&args.fixture, config)?;
    let entity_type = EntityTypeName::parse(&args.entity)?;
    let canonical = loaded.registry.get(&entity_type)?.name().clone();
    let query = WireQuery::from_args(&args.query)?;
    let actor = Actor::new(args.actor.as_str());

    let start = Instant::now();
    let results = loaded
        .engine
        .search(&query, &entity_type, &actor, args.match_all)?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let rows = results
        .ids()
        .iter()
        .map(|&id| {
            let entity = EntityRef::new(canonical.clone(), id);
            Ok(ResultRow {
                id,
                key: loaded.key_of(&entity).map(str::to_string),
                label: label_of(&loaded, &entity)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    output_result(
        "Search completed",
        &SearchOutput {
            entity_type: canonical.to_string(),
            actor: actor.to_string(),
            total: rows.len(),
            duration_ms,
            results: rows,
        },
        cli_args,
    )
}

/// The first indexed value of the entity's leading free-text field.
fn label_of(loaded: &LoadedFixture, entity: &EntityRef) -> Result<Option<String>> {
    let entity_type = loaded.registry.get(&entity.entity_type)?;
    let fields = entity_type.free_text_fields(
        &loaded.engine.config().priority_field_names,
        loaded.engine.config().free_text_field_limit,
    );
    let Some(field) = fields.first() else {
        return Ok(None);
    };
    Ok(loaded
        .backend
        .document(entity)?
        .and_then(|doc| doc.fields.get(field.name()).and_then(|v| v.first().cloned())))
}

/// Describe the registry and indexing topology of a fixture.
fn describe(args: &DescribeArgs, config: &SearchConfig, cli_args: &ScopeSearchArgs) -> Result<()> {
    let loaded = load_fixture(&args.fixture, config)?;
    let registry = &loaded.registry;

    let mut entity_types = Vec::new();
    for entity_type in registry.entity_types() {
        let free_text: Vec<&str> = entity_type
            .free_text_fields(&config.priority_field_names, config.free_text_field_limit)
            .into_iter()
            .map(|field| field.name())
            .collect();

        let mut fields = Vec::new();
        for field in entity_type.fields() {
            let related = registry.related_entity_type(entity_type.name(), field.name())?;
            fields.push(FieldInfo {
                name: field.name().to_string(),
                label: field.label().to_string(),
                free_text: free_text.contains(&field.name()),
                related: related.map(|name| name.to_string()),
                reverse_path: registry.reverse_path(entity_type.name(), field.name())?,
            });
        }

        entity_types.push(EntityTypeInfo {
            name: entity_type.name().to_string(),
            permission: entity_type.permission().map(|p| p.to_string()),
            aliases: entity_type.aliases().iter().map(|a| a.to_string()).collect(),
            documents: loaded.backend.len(entity_type.name()),
            fields,
        });
    }

    let junctions = registry
        .junction_bindings()?
        .into_iter()
        .map(|binding| JunctionInfo {
            junction: binding.junction,
            owner: binding.owner.to_string(),
            field: binding.field,
            left: binding.left.to_string(),
            right: binding.right.to_string(),
        })
        .collect();

    output_result(
        "Fixture described",
        &DescribeOutput {
            entity_types,
            junctions,
        },
        cli_args,
    )
}
