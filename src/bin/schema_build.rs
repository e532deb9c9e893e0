//! Schema Build CLI
//!
//! Compiles configured schemas into generated GraphQL artifacts, clears
//! generated output, and inspects what the pipeline selects and produces.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use schema_compiler::{CompilerConfig, PersistReport, SchemaCompiler};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-build")]
#[command(about = "Compile class descriptors into generated GraphQL schemas")]
struct Cli {
    /// Configuration file (defaults to schema-compiler.toml lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and persist schemas
    Build {
        /// Schema to build (repeatable; all configured schemas when omitted)
        #[arg(short, long = "schema")]
        schemas: Vec<String>,
        /// Remove generated output and cache entries first
        #[arg(long)]
        clear: bool,
    },

    /// Remove a schema's generated output and cache entries
    Clear {
        #[arg(short, long)]
        schema: String,
    },

    /// Print one generated artifact
    Show {
        #[arg(short, long)]
        schema: String,
        /// Artifact (type) name
        artifact: String,
    },

    /// Print the classes each bulk-load block selects
    Classes {
        /// Schema to inspect (all configured schemas when omitted)
        #[arg(short, long)]
        schema: Option<String>,
    },
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

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_str().context("config path is not valid UTF-8"))
        .transpose()?;
    let config = CompilerConfig::load_from(config_path).context("failed to load configuration")?;
    let compiler = Arc::new(SchemaCompiler::new(config)?);

    match cli.command {
        Commands::Build { schemas, clear } => {
            let names: Vec<String> = if schemas.is_empty() {
                compiler.config().schema_names().map(str::to_string).collect()
            } else {
                schemas.clone()
            };
            if names.is_empty() {
                bail!("no schemas configured");
            }

            if clear {
                for name in &names {
                    compiler.clear(name)?;
                    println!("🧹 Cleared schema '{}'", name);
                }
            }

            let reports = if schemas.is_empty() {
                println!("🔨 Building {} schemas", names.len());
                compiler.build_all().context("failed to build schemas")?
            } else {
                let mut reports = Vec::new();
                for name in names {
                    println!("🔨 Building schema '{}'", name);
                    let report = compiler
                        .build(&name)
                        .with_context(|| format!("failed to build schema '{}'", name))?;
                    reports.push((name, report));
                }
                reports
            };

            for (name, report) in &reports {
                print_report(name, report);
            }
            Ok(())
        }

        Commands::Clear { schema } => {
            compiler.clear(&schema)?;
            println!("🧹 Cleared schema '{}'", schema);
            Ok(())
        }

        Commands::Show { schema, artifact } => {
            let runtime = compiler.runtime(&schema);
            let artifact = runtime
                .artifact(&artifact)
                .with_context(|| format!("failed to load '{}' from schema '{}'", artifact, schema))?;
            print!("{}", artifact.source);
            Ok(())
        }

        Commands::Classes { schema } => {
            let names: Vec<String> = match schema {
                Some(name) => vec![name],
                None => compiler.config().schema_names().map(str::to_string).collect(),
            };

            for name in &names {
                println!("📂 {}", name);
                let blocks = compiler.select_classes(name)?;
                if blocks.is_empty() {
                    println!("   (no bulk-load blocks)");
                }
                for (block, classes) in blocks {
                    println!("   {} ({} classes)", block, classes.len());
                    for class in classes.classes() {
                        println!("   └─ {}", class);
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_report(name: &str, report: &PersistReport) {
    println!("📦 {}", name);
    println!("   Directory: {}", report.directory.display());
    println!(
        "   ✅ {} written, {} unchanged, {} deleted",
        report.written.len(),
        report.unchanged.len(),
        report.deleted.len()
    );
    for name in &report.written {
        println!("   └─ wrote {}", name);
    }
    for name in &report.deleted {
        println!("   └─ deleted {}", name);
    }
}
