//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiParaphraseAdapter},
    config::Config,
    error::ApiError,
    web::{app_router, AppState, Ports},
};
use async_openai::{config::OpenAIConfig, Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Paraphraser ---
    let openai_config = OpenAIConfig::new()
        .with_api_base(config.paraphrase_api_base.clone())
        .with_api_key(config.paraphrase_api_key.clone());
    let paraphraser = Arc::new(OpenAiParaphraseAdapter::new(
        Client::with_config(openai_config),
        config.paraphrase_model.clone(),
    )?);
    info!(
        model = %config.paraphrase_model,
        base = %config.paraphrase_api_base,
        timeout_secs = config.paraphrase_timeout.as_secs(),
        "Paraphraser configured"
    );

    // --- 4. Build the Shared AppState ---
    let ports = Ports {
        catalog: db_adapter.clone(),
        interactions: db_adapter.clone(),
        translations: db_adapter.clone(),
        paraphraser,
        users: db_adapter.clone(),
        history: db_adapter.clone(),
        care_team: db_adapter,
    };
    let app_state = Arc::new(AppState::new(config.clone(), ports));

    // --- 5. Create the Web Router ---
    let app = app_router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
