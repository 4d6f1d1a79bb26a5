//! ecoledger-node: marketplace backend for EcoLedger renewable energy
//! certificates

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use ecoledger_node::api::{self, AppState};
use ecoledger_node::auth::resolver::MirrorNodeResolver;
use ecoledger_node::auth::store::MemoryAuthStore;
use ecoledger_node::auth::AuthController;
use ecoledger_node::config::Config;
use ecoledger_node::ledger::token::TokenLedger;
use ecoledger_node::recs::store::RecStore;
use ecoledger_node::recs::RecService;

#[derive(Parser)]
#[command(name = "ecoledger-node")]
#[command(about = "Marketplace backend for EcoLedger renewable energy certificates")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ecoledger-node.toml")]
    config: String,

    /// Data directory
    #[arg(short, long, env = "ECOLEDGER_DATA_DIR")]
    data_dir: Option<String>,

    /// HTTP port (overrides config file)
    #[arg(long, env = "ECOLEDGER_HTTP_PORT")]
    http_port: Option<u16>,

    /// Ledger operator account id
    #[arg(long, env = "LEDGER_OPERATOR_ID")]
    operator_id: Option<String>,

    /// Ledger operator private key
    #[arg(long, env = "LEDGER_OPERATOR_KEY")]
    operator_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ecoledger_node=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting ecoledger-node");
    info!("Config file: {}", cli.config);

    // Load or create default config
    let mut config: Config = if std::path::Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&content)?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    // Apply CLI overrides
    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = PathBuf::from(data_dir);
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(operator_id) = cli.operator_id {
        config.ledger.operator_id = Some(operator_id);
    }
    if let Some(operator_key) = cli.operator_key {
        config.ledger.operator_key = Some(operator_key);
    }

    info!("Data dir: {}", config.node.data_dir.display());
    info!("Ledger network: {}", config.ledger.network);

    // Token ledger gateway; unconfigured until operator credentials exist
    let operator = config.ledger.operator();
    match &operator {
        Some(id) => info!("Ledger operator: {}", id),
        None => info!("Ledger operator not configured, on-ledger operations will fail"),
    }
    let token_ledger: Arc<TokenLedger> = Arc::new(TokenLedger::new(operator));

    // Wallet login controller
    let auth_store = Arc::new(MemoryAuthStore::new(
        Duration::from_secs(config.auth.nonce_ttl_secs),
        Duration::from_secs(config.auth.session_ttl_secs),
    ));
    let mirror_url = config
        .auth
        .mirror_url
        .clone()
        .unwrap_or_else(|| config.ledger.mirror_base_url());
    let resolver = Arc::new(MirrorNodeResolver::new(mirror_url));
    let auth = Arc::new(AuthController::new(auth_store, resolver));

    // REC lifecycle controller over the local store
    let rec_store = RecStore::open(&config.node.data_dir)?;
    let rec_service = Arc::new(RecService::new(rec_store, token_ledger.clone()));
    rec_service.seed_if_empty().await?;

    let state = AppState {
        auth,
        recs: rec_service,
        ledger: token_ledger,
        network: config.ledger.network.clone(),
    };
    let app = api::create_router(state);

    // Bind to HTTP port
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.http_port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
