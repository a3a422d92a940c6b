//! graphsync CLI: run syncs and inspect the graph.
//!
//! Usage:
//!   graphsync [--config FILE] [-v] sync <type:name> [--records FILE] [--delete-mode M] [--dry-run]
//!   graphsync status
//!   graphsync show <slug>
//!   graphsync sources

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use graphsync::graph::NodeId;
use graphsync::storage::{EdgeFilter, NodeFilter};
use graphsync::{
    Config, DeleteMode, FileGraphStore, GraphStore, IngestEngine, JsonFileConnector,
    ProvenanceStore, SourceIdentity, SqliteProvenanceStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "graphsync",
    version,
    about = "Provenance-tracked sync of external sources into a graph"
)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync one source into the graph
    Sync {
        /// Source key, `type:name`
        source: String,
        /// JSON array or JSON-lines file of records (overrides the config)
        #[arg(long)]
        records: Option<PathBuf>,
        /// none, soft or hard (overrides the config)
        #[arg(long)]
        delete_mode: Option<DeleteMode>,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Fetch at most this many records
        #[arg(long)]
        limit: Option<usize>,
        /// Only fetch records updated at or after this RFC 3339 instant
        #[arg(long, value_parser = parse_since)]
        since: Option<DateTime<Utc>>,
    },
    /// Show graph and provenance counts
    Status,
    /// Print a node and its edges as JSON
    Show {
        slug: String,
    },
    /// List configured sources
    Sources,
}

fn parse_since(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", raw, e))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config, String> {
    let config = match path {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    config.map_err(|e| e.to_string())
}

fn open_graph(config: &Config) -> Result<Arc<FileGraphStore>, String> {
    let store = FileGraphStore::open_with(&config.graph.path, config.graph.store_options())
        .map_err(|e| format!("Failed to open graph: {}", e))?;
    Ok(Arc::new(store))
}

fn open_provenance(config: &Config) -> Result<Arc<SqliteProvenanceStore>, String> {
    let store = if config.provenance.is_in_memory() {
        SqliteProvenanceStore::open_in_memory()
    } else {
        SqliteProvenanceStore::open(&config.provenance.path)
    };
    store
        .map(Arc::new)
        .map_err(|e| format!("Failed to open provenance store: {}", e))
}

struct SyncArgs {
    source: String,
    records: Option<PathBuf>,
    delete_mode: Option<DeleteMode>,
    dry_run: bool,
    limit: Option<usize>,
    since: Option<DateTime<Utc>>,
}

async fn cmd_sync(config: &Config, args: SyncArgs) -> Result<(), String> {
    let configured = config.source(&args.source);
    let mut options = match configured {
        Some(source) => source.ingest_options(),
        None => {
            let identity = SourceIdentity::parse_key(&args.source)
                .ok_or_else(|| format!("invalid source key '{}' (expected type:name)", args.source))?;
            graphsync::IngestOptions::new(identity)
        }
    };
    if let Some(mode) = args.delete_mode {
        options = options.with_delete_mode(mode);
    }
    options = options.dry_run(args.dry_run);
    options.limit = args.limit;
    options.since = args.since;

    let records = args
        .records
        .or_else(|| configured.and_then(|s| s.records.clone()))
        .ok_or_else(|| format!("no records file for source '{}'", args.source))?;

    let engine = IngestEngine::new(open_graph(config)?, open_provenance(config)?);
    let connector = JsonFileConnector::new(records);
    let result = engine
        .sync(&connector, &options)
        .await
        .map_err(|e| e.to_string())?;

    let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn cmd_status(config: &Config) -> Result<(), String> {
    let graph = open_graph(config)?;
    let provenance = open_provenance(config)?;

    let nodes = graph.list_nodes(&NodeFilter::new()).map_err(|e| e.to_string())?;
    let edges = graph.list_edges(&EdgeFilter::new()).map_err(|e| e.to_string())?;
    println!("Graph:  {}", graph.path().display());
    println!("Nodes:  {}", nodes.len());
    println!("Edges:  {}", edges.len());
    println!();

    let sources = provenance.list_sources().map_err(|e| e.to_string())?;
    if sources.is_empty() {
        println!("No sources synced yet.");
        return Ok(());
    }
    println!("{:<36}  {:<32}  {:>7}  {:>7}", "ID", "SOURCE", "TRACKED", "DELETED");
    println!("{}", "-".repeat(88));
    for (id, identity) in sources {
        let items = provenance
            .list_items_for_source(&id, true)
            .map_err(|e| e.to_string())?;
        let deleted = items.iter().filter(|i| i.is_deleted()).count();
        println!(
            "{:<36}  {:<32}  {:>7}  {:>7}",
            id.to_string(),
            identity.source_key(),
            items.len() - deleted,
            deleted
        );
    }
    Ok(())
}

fn cmd_show(config: &Config, slug: &str) -> Result<(), String> {
    let graph = open_graph(config)?;
    let node = graph
        .get_node_by_slug(slug)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("node '{}' not found", slug))?;

    let outgoing = edges_for(&graph, EdgeFilter::new().from_node(node.id.clone()))?;
    let incoming = edges_for(&graph, EdgeFilter::new().to_node(node.id.clone()))?;
    let view = serde_json::json!({
        "node": node,
        "outgoing": outgoing,
        "incoming": incoming,
    });
    let json = serde_json::to_string_pretty(&view).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn edges_for(graph: &FileGraphStore, filter: EdgeFilter) -> Result<Vec<serde_json::Value>, String> {
    let edges = graph.list_edges(&filter).map_err(|e| e.to_string())?;
    let slug_of = |id: &NodeId| -> Result<Option<String>, String> {
        Ok(graph.get_node(id).map_err(|e| e.to_string())?.map(|n| n.slug))
    };
    edges
        .into_iter()
        .map(|edge| -> Result<serde_json::Value, String> {
            Ok(serde_json::json!({
                "relationship": edge.relationship_type,
                "from": slug_of(&edge.from_node_id)?,
                "to": slug_of(&edge.to_node_id)?,
                "strength": edge.strength,
            }))
        })
        .collect()
}

fn cmd_sources(config: &Config) -> Result<(), String> {
    if config.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }
    println!("{:<32}  {:<6}  {}", "SOURCE", "DELETE", "RECORDS");
    println!("{}", "-".repeat(72));
    for source in &config.sources {
        let records = source
            .records
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<32}  {:<6}  {}", source.key(), source.delete_mode.to_string(), records);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match load_config(cli.config) {
        Ok(config) => match cli.command {
            Commands::Sync {
                source,
                records,
                delete_mode,
                dry_run,
                limit,
                since,
            } => {
                let args = SyncArgs {
                    source,
                    records,
                    delete_mode,
                    dry_run,
                    limit,
                    since,
                };
                cmd_sync(&config, args).await
            }
            Commands::Status => cmd_status(&config),
            Commands::Show { slug } => cmd_show(&config, &slug),
            Commands::Sources => cmd_sources(&config),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
