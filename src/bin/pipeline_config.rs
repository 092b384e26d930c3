//! Pipeline Config CLI
//!
//! Validates package configuration documents, prints effective configuration
//! and field catalogs, and lints the schemas themselves.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pipeline_schemas::{
    build_catalog, declared_defaults, group_catalog, lint::lint_registry, resolve_effective,
    validate_document, DirectorySource, EngineConfig, SchemaLinter, SchemaRegistry, WarehouseId,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pipeline-config")]
#[command(about = "Validate and resolve data-pipeline package configuration")]
struct Cli {
    /// Directory of schema documents (<package>/<version>.json); defaults to the bundled set
    #[arg(short, long, global = true)]
    schemas: Option<PathBuf>,

    /// Engine configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available package versions and check that each one loads
    List,

    /// Validate a configuration document
    Validate {
        package: String,
        version: String,
        /// JSON configuration document
        document: PathBuf,
    },

    /// Print the effective configuration (declared defaults when no document is given)
    Effective {
        package: String,
        version: String,
        document: Option<PathBuf>,
    },

    /// Print the field catalog
    Catalog {
        package: String,
        version: String,
        /// Target warehouse for applicability flags
        #[arg(short, long)]
        warehouse: Option<String>,
        /// Group fields for presentation
        #[arg(long)]
        grouped: bool,
    },

    /// Lint schema documents (all available when no package is given)
    Lint {
        package: Option<String>,
        version: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match EngineConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli, config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command ran but found problems
fn run(cli: Cli, config: EngineConfig) -> Result<bool> {
    let registry = match &cli.schemas {
        Some(dir) => SchemaRegistry::new(DirectorySource::new(dir)),
        None => config.registry(),
    };

    match cli.command {
        Commands::List => {
            let keys = registry.available()?;
            if keys.is_empty() {
                println!("No package schemas available");
            }
            let mut loaded = true;
            for key in keys {
                match registry.get_key(&key) {
                    Ok(schema) => println!(
                        "✅ {} ({} fields, {})",
                        key,
                        schema.properties().len(),
                        schema.checksum.short()
                    ),
                    Err(e) => {
                        println!("❌ {} - {}", key, e);
                        loaded = false;
                    }
                }
            }
            Ok(loaded)
        }

        Commands::Validate {
            package,
            version,
            document,
        } => {
            let schema = registry.get(&package, &version)?;
            let document = read_document(&document)?;

            match validate_document(&schema, &document) {
                Ok(_) => {
                    println!("✅ {} - valid", schema.key);
                    Ok(true)
                }
                Err(errors) => {
                    println!("❌ {} - {} error(s)", schema.key, errors.len());
                    for error in &errors {
                        println!("   └─ {}", error);
                    }
                    Ok(false)
                }
            }
        }

        Commands::Effective {
            package,
            version,
            document,
        } => {
            let schema = registry.get(&package, &version)?;
            let effective = match document {
                None => declared_defaults(&schema),
                Some(path) => {
                    let document = read_document(&path)?;
                    match validate_document(&schema, &document) {
                        Ok(validated) => resolve_effective(&validated),
                        Err(errors) => {
                            eprintln!("❌ {} - {} error(s)", schema.key, errors.len());
                            for error in &errors {
                                eprintln!("   └─ {}", error);
                            }
                            return Ok(false);
                        }
                    }
                }
            };
            println!("{}", serde_json::to_string_pretty(&effective)?);
            Ok(true)
        }

        Commands::Catalog {
            package,
            version,
            warehouse,
            grouped,
        } => {
            let schema = registry.get(&package, &version)?;
            let target = warehouse.map(WarehouseId::new).or_else(|| config.default_warehouse());
            let catalog = build_catalog(&schema, target.as_ref());

            let rendered = if grouped {
                serde_json::to_string_pretty(&group_catalog(catalog))?
            } else {
                serde_json::to_string_pretty(&catalog)?
            };
            println!("{}", rendered);
            Ok(true)
        }

        Commands::Lint { package, version } => {
            let results = match (package, version) {
                (Some(package), Some(version)) => {
                    let schema = registry.get(&package, &version)?;
                    vec![SchemaLinter::new().lint(&schema)]
                }
                (Some(package), None) => {
                    let key = registry
                        .latest(&package)?
                        .with_context(|| format!("no versions available for {}", package))?;
                    let schema = registry.get_key(&key)?;
                    vec![SchemaLinter::new().lint(&schema)]
                }
                _ => lint_registry(&registry)?,
            };

            let mut clean = true;
            for result in &results {
                if result.is_clean() && !result.has_warnings() {
                    println!("✅ {}", result.key);
                    continue;
                }
                clean &= result.is_clean();
                let mark = if result.is_clean() { "⚠️ " } else { "❌" };
                println!(
                    "{} {} - {} error(s), {} warning(s)",
                    mark,
                    result.key,
                    result.errors.len(),
                    result.warnings.len()
                );
                for error in &result.errors {
                    println!("   └─ [{}] {}: {}", error.code, error.path, error.message);
                }
                for warning in &result.warnings {
                    println!("   └─ [{}] {}: {}", warning.code, warning.path, warning.message);
                }
            }
            Ok(clean)
        }
    }
}

fn read_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}
