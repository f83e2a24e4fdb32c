//! Whoop club bot entry point: logging, configuration, database,
//! Telegram dispatcher, HTTP API and the background sweeper.

use anyhow::Result;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whoop_club_bot::bot::handlers::{BotHandler, RegistrationState};
use whoop_club_bot::config::Config;
use whoop_club_bot::database::connection::DatabaseManager;
use whoop_club_bot::services::gateway::GatewayClient;
use whoop_club_bot::services::sweeper::Sweeper;
use whoop_club_bot::services::webhook::ApiService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whoop_club_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Arc::new(Config::from_env()?);

    info!("Starting Whoop Club Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded - Database: {}, HTTP Port: {}",
        config.database_url, config.http_port
    );

    let db_manager = DatabaseManager::new(&config.database_url).await?;
    db_manager.run_migrations().await?;
    let db = Arc::new(db_manager);
    info!("Database initialized successfully");

    let bot = Bot::new(&config.telegram_bot_token);
    let gateway = GatewayClient::from_config(&config).map(Arc::new);
    if gateway.is_none() {
        info!("Payment gateway not configured, manual payments only");
    }
    let handler = BotHandler::new(db.clone(), config.clone(), gateway);

    let mut sweeper = Sweeper::new(bot.clone(), db.clone(), config.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create sweeper: {e}"))?;
    sweeper
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start sweeper: {e}"))?;

    let api_service = ApiService::new(db.clone(), config.webhook_secret.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {e}", config.http_port))?;
    info!("HTTP API starting on port {}", config.http_port);

    let bot_task = tokio::spawn(async move {
        let storage: Arc<InMemStorage<RegistrationState>> = InMemStorage::new();
        Dispatcher::builder(bot, handler.schema())
            .dependencies(dptree::deps![storage])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    });

    let api_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, api_service.router).await {
            tracing::error!("HTTP API error: {e}");
        }
    });

    tokio::select! {
        result = bot_task => {
            if let Err(e) = result {
                tracing::error!("Bot task error: {e}");
            }
        }
        result = api_task => {
            if let Err(e) = result {
                tracing::error!("API task error: {e}");
            }
        }
    }

    if let Err(e) = sweeper.stop().await {
        tracing::warn!("Error stopping sweeper: {e}");
    }

    info!("Application stopped");
    Ok(())
}
