//! CLI binary for statesearch.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use statesearch::fanout::{FilterMap, FilterValue, SearchRequest};
use statesearch::{SearchServer, ServiceConfig, build_aggregator};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// statesearch: fan-out search across per-state document indexes.
#[derive(Parser)]
#[command(name = "statesearch", version, about)]
struct Cli {
    /// Path to TOML configuration file (default: ./statesearch.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,

    /// Search one state and print the JSON result.
    Query {
        /// Free-text query.
        query: String,
        /// State code (e.g. `ia`).
        state: String,
        /// Maximum results.
        #[arg(long)]
        top: Option<usize>,
        /// Filter as `field=value`; a JSON object value is a range
        /// (e.g. `page_number={"gte":3}`). Repeatable.
        #[arg(long = "filter", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
    },

    /// Search several states and print the merged JSON result.
    Multi {
        /// Free-text query.
        query: String,
        /// Comma-separated state codes (default: all configured).
        #[arg(long, value_delimiter = ',')]
        states: Vec<String>,
        /// Maximum merged results.
        #[arg(long)]
        top: Option<usize>,
    },

    /// List configured states.
    States,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so JSON output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("statesearch=info,statesearch_fanout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = cli
        .config
        .unwrap_or_else(ServiceConfig::default_config_path);
    let config = ServiceConfig::load(&path)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Query {
            query,
            state,
            top,
            filters,
        } => {
            let aggregator = build_aggregator(&config)?;
            let mut request = SearchRequest::new(query).with_filters(parse_filters(&filters)?);
            request.top = top;
            print_json(&aggregator.search_target(request, &state).await?)
        }
        Command::Multi { query, states, top } => {
            let aggregator = build_aggregator(&config)?;
            let mut request = SearchRequest::new(query).with_targets(states);
            request.top = top;
            print_json(&aggregator.aggregate(request).await?)
        }
        Command::States => {
            for target in &config.targets {
                println!("{:<4} {:<16} {}", target.code, target.name, target.index);
            }
            Ok(())
        }
    }
}

async fn serve(config: ServiceConfig) -> anyhow::Result<()> {
    let aggregator = Arc::new(build_aggregator(&config)?);
    info!(
        states = aggregator.universe().len(),
        top_k = aggregator.default_top(),
        "search targets loaded"
    );

    let mut server = SearchServer::start(aggregator, &config.server).await?;
    println!("statesearch v{} listening on http://{}", env!("CARGO_PKG_VERSION"), server.addr());

    tokio::select! {
        result = server.wait() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }
    server.shutdown();
    Ok(())
}

/// Parse repeated `field=value` arguments into an ordered filter map.
fn parse_filters(args: &[String]) -> anyhow::Result<FilterMap> {
    let mut filters = FilterMap::new();
    for arg in args {
        let Some((field, value)) = arg.split_once('=') else {
            anyhow::bail!("filter must be FIELD=VALUE, got '{arg}'");
        };
        let field = field.trim();
        if field.is_empty() {
            anyhow::bail!("filter field must not be empty in '{arg}'");
        }
        let value = if value.trim_start().starts_with('{') {
            let json: serde_json::Value = serde_json::from_str(value)
                .map_err(|e| anyhow::anyhow!("invalid range filter for '{field}': {e}"))?;
            FilterValue::from(json)
        } else {
            FilterValue::from(value)
        };
        filters.insert(field, value);
    }
    Ok(filters)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
