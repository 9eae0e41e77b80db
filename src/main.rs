//! HyreLog CLI - log and query audit events from the terminal

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::{Map, Value};

use hyrelog::{
    Actor, ClientConfig, CompanyClient, Event, EventInput, FixSuggestion, HyreLogError,
    QueryOptions, QueryResponse, Target, WorkspaceClient,
};

#[derive(Parser)]
#[command(name = "hyrelog")]
#[command(about = "HyreLog - audit event logging and queries")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/hyrelog/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key (overrides HYRELOG_API_KEY and the config file)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log request and response details
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a single event with a workspace key
    Log(LogArgs),

    /// Query events (workspace key, or company key with --company/--global)
    Query(QueryArgs),

    /// Show data regions for a company key
    Regions,

    /// Show the resolved configuration
    Config,
}

#[derive(Args)]
struct LogArgs {
    /// Event action, e.g. user.created
    #[arg(short, long)]
    action: String,

    /// Event category, e.g. auth
    #[arg(short, long)]
    category: String,

    #[arg(long)]
    actor_id: Option<String>,

    #[arg(long)]
    actor_email: Option<String>,

    #[arg(long)]
    target_id: Option<String>,

    #[arg(long, requires = "target_id")]
    target_type: Option<String>,

    /// JSON object
    #[arg(long)]
    payload: Option<String>,

    /// JSON object
    #[arg(long)]
    metadata: Option<String>,

    #[arg(long)]
    project_id: Option<String>,
}

#[derive(Args)]
struct QueryArgs {
    /// Query all workspaces of the company
    #[arg(long)]
    company: bool,

    /// Query across every data region of the company
    #[arg(long, conflicts_with = "company")]
    global: bool,

    #[arg(long, default_value_t = hyrelog::types::DEFAULT_PAGE)]
    page: u32,

    #[arg(long, default_value_t = hyrelog::types::DEFAULT_LIMIT)]
    limit: u32,

    /// RFC 3339 lower bound
    #[arg(long)]
    from: Option<DateTime<Utc>>,

    /// RFC 3339 upper bound
    #[arg(long)]
    to: Option<DateTime<Utc>>,

    #[arg(long)]
    action: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    actor_id: Option<String>,

    #[arg(long)]
    actor_email: Option<String>,

    #[arg(long)]
    workspace_id: Option<String>,

    #[arg(long)]
    project_id: Option<String>,

    /// Print the raw response as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.debug { "hyrelog=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<HyreLogError>()
            .and_then(|err| err.fix_suggestion())
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Log(args) => log_event(config, args).await,
        Commands::Query(args) => query_events(config, args).await,
        Commands::Regions => show_regions(config).await,
        Commands::Config => {
            show_config(&config, cli.config.as_deref());
            Ok(())
        }
    }
}

/// File, then environment, then flags.
fn resolve_config(cli: &Cli) -> Result<ClientConfig, HyreLogError> {
    let path = cli.config.clone().unwrap_or_else(ClientConfig::config_path);
    let mut config = ClientConfig::load(&path)?.with_env()?;

    if let Some(key) = &cli.api_key {
        config.api_key = key.clone();
    }
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    if cli.debug {
        config.debug = true;
    }
    tracing::debug!(
        path = %path.display(),
        base_url = %config.base_url,
        key = %config.masked_key(),
        "Resolved configuration"
    );
    Ok(config)
}

async fn log_event(config: ClientConfig, args: LogArgs) -> anyhow::Result<()> {
    let mut event = EventInput::new(args.action, args.category);

    if args.actor_id.is_some() || args.actor_email.is_some() {
        event = event.with_actor(Actor {
            id: args.actor_id,
            email: args.actor_email,
            name: None,
        });
    }
    if let Some(id) = args.target_id {
        event = event.with_target(Target {
            id: Some(id),
            kind: args.target_type,
        });
    }
    if let Some(raw) = args.payload.as_deref() {
        event = event.with_payload(parse_object("--payload", raw)?);
    }
    if let Some(raw) = args.metadata.as_deref() {
        event = event.with_metadata(parse_object("--metadata", raw)?);
    }
    if let Some(project) = args.project_id {
        event = event.with_project_id(project);
    }

    let client = WorkspaceClient::new(config)?;
    let logged = client.log_event(event).await;
    client.close().await?;
    let logged = logged?;

    println!("{} Logged {}", "✓".green(), logged.action.cyan().bold());
    println!("  ID: {}", logged.id);
    println!("  Hash: {}", logged.hash);
    println!("  Created: {}", logged.created_at);
    Ok(())
}

async fn query_events(config: ClientConfig, args: QueryArgs) -> anyhow::Result<()> {
    let mut options = QueryOptions::new().page(args.page).limit(args.limit);
    if let Some(from) = args.from {
        options = options.from_date(from);
    }
    if let Some(to) = args.to {
        options = options.to_date(to);
    }
    options.action = args.action;
    options.category = args.category;
    options.actor_id = args.actor_id;
    options.actor_email = args.actor_email;
    options.workspace_id = args.workspace_id;
    options.project_id = args.project_id;

    let response = if args.company || args.global {
        let client = CompanyClient::new(config)?;
        let response = if args.global {
            client.query_global_events(options).await
        } else {
            client.query_events(options).await
        };
        client.close().await;
        response?
    } else {
        let client = WorkspaceClient::new(config)?;
        let response = client.query_events(options).await;
        client.close().await?;
        response?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

async fn show_regions(config: ClientConfig) -> anyhow::Result<()> {
    let client = CompanyClient::new(config)?;
    let regions = client.get_regions().await;
    client.close().await;
    println!("{}", serde_json::to_string_pretty(&Value::Object(regions?))?);
    Ok(())
}

fn show_config(config: &ClientConfig, path: Option<&std::path::Path>) {
    let path = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(ClientConfig::config_path);
    println!("{}", "HyreLog configuration".cyan().bold());
    println!("  File: {}", path.display());
    println!("  API key: {}", config.masked_key());
    println!("  Base URL: {}", config.base_url);
    println!("  Timeout: {}", format_duration(config.timeout));
    println!("  Debug: {}", config.debug);
    println!(
        "  Retry: {} retries, {} initial, {} max, x{}",
        config.retry.max_retries,
        format_duration(config.retry.initial_delay),
        format_duration(config.retry.max_delay),
        config.retry.multiplier
    );
    println!(
        "  Batch: max {} events, {} wait, auto flush {}",
        config.batch.max_size,
        format_duration(config.batch.max_wait),
        config.batch.auto_flush
    );
}

fn print_response(response: &QueryResponse) {
    let p = &response.pagination;
    println!(
        "{} page {}/{} ({} events total)",
        "→".cyan(),
        p.page,
        p.total_pages.max(1),
        p.total
    );
    if response.retention_applied == Some(true) {
        println!(
            "  {} retention applied from {}",
            "!".yellow(),
            response.retention_window_start.as_deref().unwrap_or("(unknown)")
        );
    }
    for event in &response.data {
        print_event(event);
    }
}

fn print_event(event: &Event) {
    let actor = event
        .actor
        .as_ref()
        .and_then(|a| a.email.as_deref().or(a.id.as_deref()))
        .unwrap_or("-");
    println!(
        "  {} {} [{}] {} {}",
        event.created_at.dimmed(),
        event.action.bold(),
        event.category,
        actor,
        event.id.dimmed()
    );
}

fn parse_object(flag: &str, raw: &str) -> anyhow::Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", flag))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} must be a JSON object", flag),
    }
}

fn format_duration(d: Duration) -> String {
    format!("{}s", d.as_secs_f64())
}
