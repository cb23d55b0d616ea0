//! graphlift CLI - relational data to property graph
//!
//! Usage:
//!   graphlift extract [--db <file>] [--out <dir>] [--threshold <f>]
//!   graphlift materialize --ontology <file> [--snapshot <file>] [--clear] [--yes]
//!   graphlift stats [--snapshot <file>]
//!   graphlift dump [--snapshot <file>] [--out <file>]
//!
//! Examples:
//!   graphlift extract --db shop.db --out ./export
//!   graphlift materialize --ontology ./export/ontology_output.json --clear --yes
//!   graphlift dump --out graph.cypher

use clap::{Parser, Subcommand};
use graphlift::config::{ConnectionConfig, Settings};
use graphlift::graph::{export_cypher_dump, MemoryGraph};
use graphlift::materialize::summarize;
use graphlift::ontology::Ontology;
use graphlift::pipeline::{self, ExtractOptions, PipelineError};
use graphlift::report::ItemFailure;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphlift")]
#[command(about = "graphlift - Migrate a relational dataset into a property graph")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to $GRAPHLIFT_CONFIG, ./graphlift.toml, ~/.config/graphlift/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Introspect the catalog, export flat files, infer implicit relationships
    Extract {
        /// SQLite database file (overrides settings and environment)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output directory for flat files
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Schema extract file
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Overlap threshold for implicit relationships (0.0 - 1.0)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Skip implicit relationship inference
        #[arg(long)]
        no_inference: bool,
    },

    /// Load an ontology's flat files into the graph
    Materialize {
        /// Ontology mapping file
        #[arg(long)]
        ontology: PathBuf,

        /// Graph snapshot file
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Directory flat files resolve against (defaults to the ontology's directory)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Clear the graph before loading
        #[arg(long)]
        clear: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Print node and relationship counts
    Stats {
        /// Graph snapshot file
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Export the graph as a Cypher script
    Dump {
        /// Graph snapshot file
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let settings = match &cli.config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Extract {
            db,
            out,
            schema,
            threshold,
            no_inference,
        } => cmd_extract(settings, db, out, schema, threshold, no_inference).await,
        Commands::Materialize {
            ontology,
            snapshot,
            data_dir,
            clear,
            yes,
        } => cmd_materialize(settings, ontology, snapshot, data_dir, clear, yes).await,
        Commands::Stats { snapshot } => cmd_stats(&settings, snapshot).await,
        Commands::Dump { snapshot, out } => cmd_dump(&settings, snapshot, out),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            if e.is_connection_failure() {
                error!("catalog connection failed");
            }
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_extract(
    mut settings: Settings,
    db: Option<PathBuf>,
    out: Option<PathBuf>,
    schema: Option<PathBuf>,
    threshold: Option<f64>,
    no_inference: bool,
) -> Result<ExitCode, PipelineError> {
    if let Some(t) = threshold {
        settings.inference.engine.overlap_threshold = t;
        settings.inference.validate()?;
    }
    if no_inference {
        settings.inference.enabled = false;
    }

    let connection = match db {
        Some(path) => ConnectionConfig::sqlite(path),
        None => settings.catalog.connection()?,
    };
    let catalog = connection.open().await?;

    let mut options = ExtractOptions::from_settings(&settings);
    if let Some(dir) = out {
        options.output_dir = dir;
    }
    if let Some(file) = schema {
        options.schema_file = file;
    }

    let report = pipeline::extract(&catalog, &options).await?;

    println!("Schema extract: {}", report.schema_file.display());
    println!("  Tables:                 {}", report.extract.tables.len());
    println!("  Foreign keys:           {}", report.extract.foreign_keys.len());
    println!(
        "  Implicit relationships: {}",
        report.extract.implicit_relationships.len()
    );
    for rel in &report.extract.implicit_relationships {
        println!(
            "    {} ({:.1}% overlap, {} matches)",
            rel.likely_direction, rel.overlap_percentage, rel.match_count
        );
    }
    print_failures(report.failures());
    Ok(ExitCode::SUCCESS)
}

async fn cmd_materialize(
    settings: Settings,
    ontology_path: PathBuf,
    snapshot: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    clear: bool,
    yes: bool,
) -> Result<ExitCode, PipelineError> {
    let mut ontology = Ontology::load(&ontology_path)?;
    if let Some(dir) = data_dir {
        ontology = ontology.with_base_dir(dir);
    }
    println!(
        "Loaded ontology: {} nodes, {} edges",
        ontology.nodes.len(),
        ontology.edges.len()
    );

    let mut options = settings.graph.materialize_options();
    options.clear_before_load |= clear;
    if options.clear_before_load && !yes && !confirm("This will clear the existing graph and rebuild it.")? {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let snapshot = snapshot_path(&settings, snapshot)?;
    let graph = MemoryGraph::open(&snapshot)?;
    let report = pipeline::materialize(&graph, &ontology, options).await?;
    graph.save_snapshot(&snapshot)?;

    println!("{}", report);
    println!("Snapshot: {}", snapshot.display());
    Ok(ExitCode::SUCCESS)
}

async fn cmd_stats(settings: &Settings, snapshot: Option<PathBuf>) -> Result<ExitCode, PipelineError> {
    let graph = MemoryGraph::load_snapshot(snapshot_path(settings, snapshot)?)?;
    let summary = summarize(&graph).await?;

    println!("Nodes by label:");
    for (label, count) in &summary.labels {
        println!("  {}: {}", label, count);
    }
    println!("Relationships by type:");
    for (rel, count) in &summary.relationship_types {
        println!("  {}: {}", rel, count);
    }
    println!("Total nodes: {}", summary.nodes);
    println!("Total relationships: {}", summary.edges);
    Ok(ExitCode::SUCCESS)
}

fn cmd_dump(
    settings: &Settings,
    snapshot: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<ExitCode, PipelineError> {
    let graph = MemoryGraph::load_snapshot(snapshot_path(settings, snapshot)?)?;
    let snapshot = graph.snapshot();

    match out {
        Some(path) => {
            let file = File::create(&path)?;
            let mut writer = BufWriter::new(file);
            export_cypher_dump(&snapshot, &mut writer)?;
            writer.flush()?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            export_cypher_dump(&snapshot, &mut lock)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn snapshot_path(settings: &Settings, explicit: Option<PathBuf>) -> Result<PathBuf, PipelineError> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(settings.graph.snapshot_path()?),
    }
}

fn confirm(message: &str) -> Result<bool, PipelineError> {
    println!("{}", message);
    print!("Continue? (yes/no): ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "yes" | "y"))
}

fn print_failures<'a>(failures: impl Iterator<Item = &'a ItemFailure>) {
    let failures: Vec<_> = failures.collect();
    if failures.is_empty() {
        return;
    }
    println!("Skipped items ({}):", failures.len());
    for failure in failures {
        println!("  {}", failure);
    }
}
