use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mediatree_config::{ConfigSource, Engine, MediaTreeConfig};
use mediatree_core::library::ValidateOptions;
use mediatree_core::query::ItemsRequest;
use mediatree_model::Entity;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mediatree", about = "Media library indexer and query tool")]
struct Cli {
    /// Config file (TOML or JSON). Defaults to $MEDIATREE_CONFIG_PATH,
    /// $MEDIATREE_CONFIG_JSON, then ./mediatree.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile libraries with the file system
    Scan {
        /// Only scan these libraries (by name); repeatable
        #[arg(long = "library")]
        libraries: Vec<String>,
        /// Only reconcile the library folders themselves
        #[arg(long)]
        shallow: bool,
    },
    /// Run an item query and print the page as JSON
    Query {
        #[arg(long)]
        parent_id: Option<String>,
        #[arg(long)]
        recursive: bool,
        #[arg(long, help = "Comma-separated item types, e.g. Movie,Episode")]
        include_item_types: Option<String>,
        #[arg(long)]
        exclude_item_types: Option<String>,
        #[arg(long, help = "Comma-separated filters, e.g. IsFolder,IsUnplayed")]
        filters: Option<String>,
        #[arg(long)]
        genres: Option<String>,
        #[arg(long)]
        years: Option<String>,
        #[arg(long)]
        name_starts_with: Option<String>,
        #[arg(long)]
        search_term: Option<String>,
        #[arg(long)]
        sort_by: Option<String>,
        #[arg(long)]
        sort_order: Option<String>,
        #[arg(long)]
        start_index: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Load and validate configuration without touching the store
    CheckConfig,
}

#[derive(Serialize)]
struct ItemSummary<'a> {
    id: String,
    name: &'a str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl<'a> From<&'a Entity> for ItemSummary<'a> {
    fn from(entity: &'a Entity) -> Self {
        Self {
            id: entity.id.to_string(),
            name: &entity.name,
            kind: entity.item_kind().as_str(),
            path: entity.path.as_ref().map(|p| p.display().to_string()),
        }
    }
}

#[derive(Serialize)]
struct QueryOutput<'a> {
    total_record_count: usize,
    items: Vec<ItemSummary<'a>>,
}

fn load_config(path: Option<PathBuf>) -> Result<(MediaTreeConfig, ConfigSource)> {
    match path {
        Some(path) => {
            let config = MediaTreeConfig::load_from_file(&path)?;
            Ok((config, ConfigSource::File(path)))
        }
        None => MediaTreeConfig::load_from_env(),
    }
}

/// Cancels `token` on Ctrl-C so an interrupted scan stops at the next
/// folder boundary.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current folder");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let (config, source) = load_config(cli.config)?;
    info!("Loaded configuration from {:?}", source);

    match cli.command {
        Command::CheckConfig => {
            let warnings = config.validate()?;
            for warning in &warnings {
                warn!("{}", warning);
            }
            println!(
                "configuration OK: {} libraries, {} warnings",
                config.libraries.len(),
                warnings.len()
            );
        }
        Command::Scan { libraries, shallow } => {
            let engine = Engine::build(&config).await?;
            let selected = engine.select_libraries(&libraries)?;
            let cancel = CancellationToken::new();
            cancel_on_ctrl_c(cancel.clone());
            let options = ValidateOptions {
                recursive: !shallow,
                ..ValidateOptions::default()
            };
            let summary = engine.scan(&selected, options, &cancel).await?;
            println!(
                "{} folders: {} created, {} updated, {} removed, {} offline, {} skipped",
                summary.folders_visited,
                summary.created,
                summary.updated,
                summary.removed,
                summary.retained_offline,
                summary.skipped_folders
            );
        }
        Command::Query {
            parent_id,
            recursive,
            include_item_types,
            exclude_item_types,
            filters,
            genres,
            years,
            name_starts_with,
            search_term,
            sort_by,
            sort_order,
            start_index,
            limit,
        } => {
            let request = ItemsRequest {
                parent_id,
                recursive: Some(recursive),
                include_item_types,
                exclude_item_types,
                filters,
                genres,
                years,
                name_starts_with,
                search_term,
                sort_by,
                sort_order,
                start_index,
                limit,
                ..ItemsRequest::default()
            };
            let parsed = request
                .parse(config.query.max_limit)
                .context("invalid query")?;

            let engine = Engine::build(&config).await?;
            if !engine.is_durable() {
                info!("No durable store configured; scanning before querying");
                engine
                    .scan(
                        &engine.roots().libraries.clone(),
                        ValidateOptions::recursive(),
                        &CancellationToken::new(),
                    )
                    .await?;
            }
            let page = engine
                .planner()
                .resolve(parsed.parent_id, &parsed.query, None)
                .await?;
            let output = QueryOutput {
                total_record_count: page.total_record_count,
                items: page.items.iter().map(ItemSummary::from).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
