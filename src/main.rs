use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};

use game_catalog::catalog::Catalog;
use game_catalog::cli::{self, import::ImportConfig};
use game_catalog::config::{CatalogConfig, StoreBackend};
use game_catalog::error::{CatalogError, ErrorKind, ErrorReport};
use game_catalog::stats::{Stats, DEFAULT_RANKING};
use game_catalog::store::{DocumentStore, StoreError};
use game_catalog::telemetry::{init_tracing, DEFAULT_FILTER};
use game_catalog::util::env;

#[derive(Parser, Debug)]
#[command(name = "game-catalog", version, about = "Personal video game library catalog")]
struct Cli {
    /// Storage backend (defaults to CATALOG_STORE, then sqlite)
    #[arg(long, value_enum, global = true)]
    store: Option<StoreBackend>,
    /// Optional override for the database URL
    #[arg(long, global = true)]
    db_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Manage library items
    Items {
        #[command(subcommand)]
        action: ItemCommand,
    },
    /// Manage reviews
    Reviews {
        #[command(subcommand)]
        action: ReviewCommand,
    },
    /// Aggregated reports
    Stats {
        #[command(subcommand)]
        report: StatsCommand,
    },
    /// Load raw documents (JSON array or NDJSON, either layout)
    Import {
        #[arg(long)]
        items: Option<PathBuf>,
        #[arg(long)]
        reviews: Option<PathBuf>,
    },
    /// Count stored documents per layout
    Audit,
    /// Check that the store answers
    Health,
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Criteria as key=value (e.g. -f category=RPG -f page=2 -f sortBy=title)
    #[arg(short = 'f', long = "filter", value_parser = cli::parse_filter)]
    filters: Vec<(String, String)>,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum ItemCommand {
    List(ListArgs),
    Get { id: String },
    /// Create from a JSON object in canonical field names
    Create { json: String },
    /// Apply a partial JSON object
    Update { id: String, json: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum ReviewCommand {
    List {
        #[command(flatten)]
        list: ListArgs,
        /// Attach item title and category
        #[arg(long, default_value_t = false)]
        enrich: bool,
    },
    Get {
        id: String,
        #[arg(long, default_value_t = false)]
        enrich: bool,
    },
    /// All reviews of one item, newest first
    ForItem {
        item_id: String,
        #[arg(long, default_value_t = false)]
        enrich: bool,
    },
    Create { json: String },
    Update { id: String, json: String },
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum StatsCommand {
    Totals,
    Categories,
    Platforms,
    Trend,
    TopHours {
        #[arg(short = 'n', long, default_value_t = DEFAULT_RANKING)]
        limit: usize,
    },
    TopRated {
        #[arg(short = 'n', long, default_value_t = DEFAULT_RANKING)]
        limit: usize,
    },
    /// Rating summary across all reviews
    Reviews,
    /// Rating summary for one item
    ItemReviews { item_id: String },
    Dashboard,
}

async fn run_items(catalog: &Catalog, action: ItemCommand) -> Result<()> {
    match action {
        ItemCommand::List(args) => cli::print_json(&catalog.list_items(&cli::criteria(args.filters)).await?),
        ItemCommand::Get { id } => cli::print_json(&catalog.get_item(&id).await?),
        ItemCommand::Create { json } => {
            let payload = cli::parse_payload(&json)?;
            cli::print_json(&catalog.create_item(&payload).await?)
        }
        ItemCommand::Update { id, json } => {
            let patch = cli::parse_payload(&json)?;
            cli::print_json(&catalog.update_item(&id, &patch).await?)
        }
        ItemCommand::Delete { id } => cli::print_json(&catalog.delete_item(&id).await?),
    }
}

async fn run_reviews(catalog: &Catalog, action: ReviewCommand) -> Result<()> {
    match action {
        ReviewCommand::List { list, enrich } => {
            cli::print_json(&catalog.list_reviews(&cli::criteria(list.filters), enrich).await?)
        }
        ReviewCommand::Get { id, enrich } => cli::print_json(&catalog.get_review(&id, enrich).await?),
        ReviewCommand::ForItem { item_id, enrich } => {
            cli::print_json(&catalog.reviews_for_item(&item_id, enrich).await?)
        }
        ReviewCommand::Create { json } => {
            let payload = cli::parse_payload(&json)?;
            cli::print_json(&catalog.create_review(&payload).await?)
        }
        ReviewCommand::Update { id, json } => {
            let patch = cli::parse_payload(&json)?;
            cli::print_json(&catalog.update_review(&id, &patch).await?)
        }
        ReviewCommand::Delete { id } => cli::print_json(&catalog.delete_review(&id).await?),
    }
}

async fn run_stats(stats: &Stats, report: StatsCommand) -> Result<()> {
    match report {
        StatsCommand::Totals => cli::print_json(&stats.item_totals().await?),
        StatsCommand::Categories => cli::print_json(&stats.by_category().await?),
        StatsCommand::Platforms => cli::print_json(&stats.by_platform().await?),
        StatsCommand::Trend => cli::print_json(&stats.monthly_trend().await?),
        StatsCommand::TopHours { limit } => cli::print_json(&stats.top_by_hours(limit).await?),
        StatsCommand::TopRated { limit } => cli::print_json(&stats.top_rated(limit).await?),
        StatsCommand::Reviews => cli::print_json(&stats.review_stats().await?),
        StatsCommand::ItemReviews { item_id } => {
            cli::print_json(&stats.review_stats_for_item(&item_id).await?)
        }
        StatsCommand::Dashboard => cli::print_json(&stats.dashboard().await?),
    }
}

async fn dispatch(command: Commands, config: &CatalogConfig, store: Arc<dyn DocumentStore>) -> Result<()> {
    let catalog = Catalog::new(store.clone());
    let stats = Stats::new(store.clone());
    match command {
        Commands::Items { action } => run_items(&catalog, action).await,
        Commands::Reviews { action } => run_reviews(&catalog, action).await,
        Commands::Stats { report } => run_stats(&stats, report).await,
        Commands::Import { items, reviews } => {
            let summaries = cli::import::run(store, ImportConfig { items, reviews }).await?;
            cli::print_json(&summaries)
        }
        Commands::Audit => cli::print_json(&stats.shape_audit().await?),
        Commands::Health => {
            catalog.health().await?;
            cli::print_json(&json!({ "status": "ok", "backend": format!("{:?}", config.backend) }))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = CatalogConfig::from_env()?.with_overrides(cli.store, cli.db_url);
    let store = config.open_store().await?;
    let outcome = dispatch(cli.command, &config, store.clone()).await;
    store.close().await;
    outcome
}

/// Classify a failure for the JSON error body on stderr.
fn failure_report(err: &anyhow::Error) -> ErrorReport {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CatalogError>() {
            return e.to_report();
        }
        if let Some(e) = cause.downcast_ref::<StoreError>() {
            let mut report = CatalogError::from(e.clone()).to_report();
            report.message = format!("{err:#}");
            return report;
        }
    }
    ErrorReport {
        kind: ErrorKind::Internal,
        message: format!("{err:#}"),
        fields: Vec::new(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env::init_env();
    let cli = Cli::parse();
    if let Err(e) = init_tracing(DEFAULT_FILTER) {
        eprintln!("{e:#}");
    }
    info!(command = ?cli.command, "starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let report = failure_report(&err);
            error!(kind = report.kind.as_str(), "{}", report.message);
            match serde_json::to_string_pretty(&report).context("encoding error report") {
                Ok(body) => eprintln!("{body}"),
                Err(e) => eprintln!("{e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
