use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use orchestrator::web::start_web_server;
use orchestrator::{ConfigManager, Database, HttpAutomationAgent, Orchestrator, WebhookNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with reduced verbosity
    let env_filter = EnvFilter::from_default_env()
        .add_directive("orchestrator=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting browser automation orchestrator");

    // Load configuration
    let config_manager = ConfigManager::new(ConfigManager::config_dir_from_env()).await?;
    let config = config_manager.get_current_config();
    info!("Configuration loaded, listening on {}:{}", config.host, config.port);

    // Initialize database
    let database = Arc::new(Database::new(&config.database_path).await?);
    info!("Database initialized");

    let agent = Arc::new(HttpAutomationAgent::new(&config.agent)?);
    let notifier = Arc::new(WebhookNotifier::new(&config.notifications)?);

    let orchestrator = Orchestrator::start(config.clone(), database, agent, notifier).await?;
    info!("Orchestrator started");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    let server_result = start_web_server(orchestrator.state().clone(), shutdown).await;
    orchestrator.shutdown().await;

    if let Err(e) = &server_result {
        error!("Web server failed: {}", e);
    }
    server_result
}
