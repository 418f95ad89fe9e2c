
use crate::agent::LlmOrchestrator;
use crate::agent::tools::register_pos_tools;
use crate::config::{Config, load_config};
use crate::dedup::IdempotencyFilter;
use crate::dialog::{DialogDeps, DialogEngine};
use crate::dispatch::Dispatcher;
use crate::gateway::GatewayState;
use crate::outbound::OutboundSender;
use crate::places::{GooglePlaces, PlacesProvider};
use crate::pos::{HttpPosService, PosService};
use crate::providers::{ProviderFactory, ProviderSource};
use crate::session::{SessionManager, SessionPolicy, SqliteSessionStore};
use crate::storage::Database;
use crate::tenants::{SqliteTenantStore, TenantConfig, TenantDirectory};
use crate::whatsapp::CloudApiClient;
use crate::workflow::{DealSubmissions, HttpWorkflowRunner};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often expired sessions and idempotency rows are purged.
const JANITOR_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// How long shutdown waits for in-flight turns.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "wahub")]
#[command(about = "Multi-tenant WhatsApp chatbot back-end", version)]
pub struct Cli {
    /// Config file (defaults to ~/.wahub/config.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook gateway
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
    /// Manage tenants
    Tenants {
        #[command(subcommand)]
        cmd: TenantCommands,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum TenantCommands {
    /// List configured tenants
    List,
    /// Import tenants from a JSON file (array or `{"tenants": [...]}`)
    Import { file: PathBuf },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Load, validate and summarize the configuration
    Check,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = load_config(config_path)?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            serve(config).await?;
        }
        Commands::Tenants { cmd } => {
            let config = load_config(config_path)?;
            tenants_command(&config, cmd).await?;
        }
        Commands::Config {
            cmd: ConfigCommands::Check,
        } => {
            config_check(config_path)?;
        }
    }

    Ok(())
}

fn open_database(config: &Config) -> Result<Arc<Database>> {
    let path = config.storage.resolve_db_path()?;
    debug!("opening database at {}", path.display());
    Ok(Arc::new(Database::open(&path)?))
}

fn setup_tenants(config: &Config, db: &Arc<Database>) -> Arc<TenantDirectory> {
    Arc::new(TenantDirectory::new(
        Arc::new(SqliteTenantStore::new(db.clone())),
        Duration::from_secs(config.tenant_cache.ttl_secs),
        config.tenant_cache.capacity,
    ))
}

fn setup_engine(config: &Config, submissions: &Arc<DealSubmissions>) -> Arc<DialogEngine> {
    let pos: Arc<dyn PosService> = Arc::new(HttpPosService::new(&config.services));
    let places: Arc<dyn PlacesProvider> = Arc::new(GooglePlaces::new(&config.services));
    let providers: Arc<dyn ProviderSource> = Arc::new(ProviderFactory::new(&config.agent));
    let tools = Arc::new(register_pos_tools(&pos, &config.agent));
    info!(
        "LLM orchestrator: {} tools, {} iterations, {}s budget",
        tools.tool_names().len(),
        config.agent.max_iterations,
        config.agent.loop_budget_secs
    );
    let orchestrator = Arc::new(LlmOrchestrator::new(
        providers.clone(),
        tools,
        config.agent.clone(),
    ));
    Arc::new(DialogEngine::new(DialogDeps {
        pos,
        places,
        orchestrator,
        providers,
        workflow: Arc::new(HttpWorkflowRunner::new()),
        submissions: Some(submissions.clone()),
        services: config.services.clone(),
        agent: config.agent.clone(),
    }))
}

fn setup_dispatcher(
    config: &Config,
    db: &Arc<Database>,
    engine: Arc<DialogEngine>,
) -> Arc<Dispatcher> {
    let durable = config.dedup.durable.then(|| db.clone());
    let dedup = Arc::new(IdempotencyFilter::new(&config.dedup, durable));
    let sessions = Arc::new(SessionManager::new(
        Arc::new(SqliteSessionStore::new(db.clone())),
        SessionPolicy::from_config(&config.session),
    ));
    let sender = Arc::new(OutboundSender::new(
        Arc::new(CloudApiClient::new(&config.transport)),
        &config.transport,
    ));
    Arc::new(Dispatcher::new(dedup, sessions, engine, sender))
}

/// Wire the production stack on top of `db`: tenant directory (seeded from
/// the config's tenant list), dialog engine, dispatcher and gateway state.
pub async fn build_gateway(
    config: &Config,
    db: &Arc<Database>,
) -> Result<(GatewayState, Arc<Dispatcher>)> {
    let tenants = setup_tenants(config, db);
    tenants
        .import(&config.tenants)
        .await
        .context("Failed to import tenants from config")?;

    let submissions = Arc::new(DealSubmissions::new(db.clone()));
    let engine = setup_engine(config, &submissions);
    let dispatcher = setup_dispatcher(config, db, engine);
    let state = GatewayState::new(
        config.gateway.clone(),
        tenants,
        dispatcher.clone(),
        submissions,
    );
    Ok((state, dispatcher))
}

async fn serve(config: Config) -> Result<()> {
    info!("Loading configuration...");
    let db = open_database(&config)?;
    let (state, dispatcher) = build_gateway(&config, &db).await?;
    let server = crate::gateway::start(state.clone()).await?;
    let janitor = dispatcher.spawn_janitor(JANITOR_INTERVAL);

    println!(
        "Starting wahub gateway on {}:{}",
        config.gateway.host, config.gateway.port
    );
    if config.gateway.allow_unsigned {
        warn!("unsigned webhooks are accepted; do not run like this in production");
    }
    info!("All services started, gateway is running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
        _ = server => {}
    }

    janitor.abort();
    state.drain(SHUTDOWN_GRACE).await;
    Ok(())
}

async fn tenants_command(config: &Config, cmd: TenantCommands) -> Result<()> {
    let db = open_database(config)?;
    let tenants = setup_tenants(config, &db);
    match cmd {
        TenantCommands::List => {
            let list = tenants.list().await?;
            if list.is_empty() {
                println!("No tenants configured.");
                return Ok(());
            }
            println!(
                "{:<20} {:<13} {:<20} {:<24} Owner",
                "Tenant", "Kind", "Phone number id", "Name"
            );
            for t in &list {
                println!(
                    "{:<20} {:<13} {:<20} {:<24} {}",
                    t.tenant_id,
                    t.kind.to_string(),
                    t.whatsapp.phone_number_id,
                    t.display_name(),
                    t.owner_contact.as_deref().unwrap_or("-")
                );
            }
        }
        TenantCommands::Import { file } => {
            let parsed = read_tenant_file(&file)?;
            let count = tenants.import(&parsed).await?;
            println!("✓ Imported {} tenant(s) from {}", count, file.display());
        }
    }
    Ok(())
}

fn read_tenant_file(path: &Path) -> Result<Vec<TenantConfig>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_tenant_list(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Accepts a bare array, `{"tenants": [...]}` or a single tenant object.
fn parse_tenant_list(content: &str) -> Result<Vec<TenantConfig>> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let list = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        serde_json::Value::Object(mut map) if map.contains_key("tenants") => {
            serde_json::from_value(map.remove("tenants").unwrap_or_default())?
        }
        obj @ serde_json::Value::Object(_) => vec![serde_json::from_value(obj)?],
        _ => bail!("expected a tenant object or a list of tenants"),
    };
    Ok(list)
}

fn config_check(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("✓ Configuration is valid");
    for line in summarize(&config) {
        println!("  {}", line);
    }
    Ok(())
}

fn summarize(config: &Config) -> Vec<String> {
    let mut lines = vec![
        format!("gateway: {}:{}", config.gateway.host, config.gateway.port),
        format!(
            "session: ttl {}h, {} user / {} assistant turns",
            config.session.ttl_hours,
            config.session.max_user_turns,
            config.session.max_assistant_turns
        ),
        format!(
            "dedup: {}h window{}",
            config.dedup.window_hours,
            if config.dedup.durable { ", durable" } else { "" }
        ),
        format!(
            "agent: {} iterations, {}s budget",
            config.agent.max_iterations, config.agent.loop_budget_secs
        ),
        format!("transport: {}", config.transport.api_version),
    ];
    if config.gateway.test_webhook.enabled {
        lines.push("test webhook: ENABLED".to_string());
    }
    if config.gateway.allow_unsigned {
        lines.push("unsigned webhooks: ACCEPTED".to_string());
    }
    if config.services.pos_base_url.is_empty() {
        lines.push("warning: services.posBaseUrl is not set".to_string());
    }
    if config.services.workflow_webhook_url.is_empty() {
        lines.push("warning: services.workflowWebhookUrl is not set".to_string());
    }
    lines.push(format!("tenants in config: {}", config.tenants.len()));
    lines
}
