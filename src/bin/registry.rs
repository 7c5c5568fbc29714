//! Schema Registry CLI
//!
//! Lists record types, exports them as JSON Schema and checks JSON documents
//! against their write-time constraints.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use storefront_schemas::config::OutputFormat;
use storefront_schemas::{
    check_document, export_all, EntityKind, ReferenceGraph, SchemaError, SchemaRegistry,
    StorefrontConfig, Validator, WriteMode,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-registry")]
#[command(about = "Inspect and export storefront record schemas")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all record types
    List,

    /// Show the fields and constraints of a record type
    Show {
        entity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which record types a record type references and is referenced by
    Refs { entity: String },

    /// Export every record type as JSON Schema
    Export {
        /// Output directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Check a JSON document against a record type's write-time constraints
    Check { entity: String, file: PathBuf },

    /// Check a stored-shape JSON document against the exported JSON Schema
    SchemaCheck { entity: String, file: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn resolve(registry: &SchemaRegistry, name: &str) -> anyhow::Result<EntityKind> {
    match name.parse::<EntityKind>() {
        Ok(kind) => Ok(kind),
        Err(err) => {
            let suggestions: Vec<&str> = registry.search(name, 3).iter().map(|k| k.name()).collect();
            if suggestions.is_empty() {
                Err(err.into())
            } else {
                bail!("{} (did you mean: {}?)", err, suggestions.join(", "))
            }
        }
    }
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {:?}", path))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = StorefrontConfig::load_from(cli.config.as_deref())?;
    let registry = SchemaRegistry::global();

    match cli.command {
        Commands::List => {
            for schema in registry.iter() {
                println!(
                    "{:<16} {:<18} {:>2} fields{}",
                    schema.name,
                    schema.kind.collection_name(),
                    schema.fields.len(),
                    if schema.timestamps { ", timestamps" } else { "" }
                );
            }
            Ok(())
        }

        Commands::Show { entity, json } => {
            let kind = resolve(registry, &entity)?;
            let schema = registry.get(kind);
            if json {
                println!("{}", serde_json::to_string_pretty(schema)?);
                return Ok(());
            }

            println!("{} ({})", schema.name, kind.collection_name());
            for field in &schema.fields {
                let mut flags = Vec::new();
                if field.required {
                    flags.push("required".to_string());
                }
                if field.unique {
                    flags.push("unique".to_string());
                }
                if let Some(values) = &field.enum_values {
                    flags.push(format!("one of {}", values.join("|")));
                }
                if let Some(target) = field.reference {
                    flags.push(format!("-> {}", target));
                }
                if let Some(default) = &field.default {
                    flags.push(format!("default {}", default.resolve(chrono::Utc::now())));
                }
                println!("  {:<18} {:<12} {}", field.name, field.field_type.label(), flags.join(", "));
            }
            if schema.timestamps {
                println!("  createdAt / updatedAt maintained automatically");
            }
            Ok(())
        }

        Commands::Refs { entity } => {
            let kind = resolve(registry, &entity)?;
            let graph = ReferenceGraph::build(registry);

            println!("{} references:", kind);
            for link in graph.references_from(kind) {
                println!("  {}.{} -> {}{}", kind, link.field, link.kind, if link.many { " (many)" } else { "" });
            }
            println!("{} is referenced by:", kind);
            for link in graph.referenced_by(kind) {
                println!("  {}.{}{}", link.kind, link.field, if link.many { " (many)" } else { "" });
            }
            Ok(())
        }

        Commands::Export { output, compact } => {
            let dir = output.unwrap_or_else(|| config.export.output_dir.clone());
            let format = if compact { OutputFormat::Compact } else { config.export.output_format };
            let manifest = export_all(registry, &dir, format, config.export.include_manifest)?;

            println!("✅ Exported {} schemas to {:?}", manifest.entities.len(), dir);
            println!("   manifest checksum {}", manifest.manifest_checksum);
            Ok(())
        }

        Commands::Check { entity, file } => {
            let kind = resolve(registry, &entity)?;
            let document = match read_json(&file)? {
                serde_json::Value::Object(map) => map,
                _ => bail!("{:?} does not contain a JSON object", file),
            };

            let validator = Validator::new(registry.get(kind), config.store.unknown_fields);
            match validator.validate(&document, WriteMode::Create, chrono::Utc::now()) {
                Ok(record) => {
                    println!("✅ {} document is valid", kind);
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    Ok(())
                }
                Err(SchemaError::ConstraintViolation { violations, .. }) => {
                    println!("❌ {} document violates {} constraint(s):", kind, violations.len());
                    for violation in &violations {
                        println!("   └─ {}", violation);
                    }
                    std::process::exit(1);
                }
                Err(e) => Err(e.into()),
            }
        }

        Commands::SchemaCheck { entity, file } => {
            let kind = resolve(registry, &entity)?;
            let messages = check_document(kind, &read_json(&file)?)?;
            if messages.is_empty() {
                println!("✅ {} document matches its JSON Schema", kind);
                Ok(())
            } else {
                println!("❌ {} document does not match its JSON Schema:", kind);
                for message in &messages {
                    println!("   └─ {}", message);
                }
                std::process::exit(1);
            }
        }
    }
}
