//! Main Entrypoint for the Tutor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the syllabus document from disk.
//! 3. Initializing the chat session and the model client.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tutor_api::{
    config::{Config, Provider},
    router::create_router,
    state::{AppState, Tutor},
};
use tutor_core::{
    ChatOrchestrator, DocumentStorage, FileStorage, SyllabusStore, TutorSession,
    llm_client::{LLMClient, OfflineClient, OpenAICompatibleClient},
};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// Builds the chat client for the configured provider.
fn build_llm_client(config: &Config) -> anyhow::Result<Arc<dyn LLMClient>> {
    match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .as_ref()
                .context("OPENAI_API_KEY must be set for 'openai' provider")?;
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(org_id) = &config.openai_org_id {
                openai_config = openai_config.with_org_id(org_id);
            }
            if let Some(api_base) = &config.openai_api_base {
                openai_config = openai_config.with_api_base(api_base);
            }
            Ok(Arc::new(OpenAICompatibleClient::new(openai_config)))
        }
        Provider::Offline => {
            info!("Using offline provider; replies are generated locally.");
            Ok(Arc::new(OfflineClient))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load the Syllabus ---
    let storage: Box<dyn DocumentStorage> = Box::new(FileStorage::new(&config.syllabus_path));
    let store = SyllabusStore::load(storage).with_context(|| {
        format!(
            "Failed to load syllabus from {}",
            config.syllabus_path.display()
        )
    })?;

    // --- 4. Initialize the Session and Shared Services ---
    let mut session = TutorSession::init_session(config.system_prompt.clone());
    session.select_model(config.default_model);

    let llm_client = build_llm_client(&config)?;
    let mut orchestrator = ChatOrchestrator::new(llm_client, config.pricing);
    if let Some(timeout) = config.provider_timeout {
        orchestrator = orchestrator.with_timeout(timeout);
    }

    let bind_address = config.bind_address;
    info!(
        provider = ?config.provider,
        model = %config.default_model,
        provider_timeout = ?config.provider_timeout,
        syllabus = %config.syllabus_path.display(),
        bind_address = %bind_address,
        "Service configured. Starting server..."
    );
    let app_state = AppState::new(Tutor::new(store, session), orchestrator, config);

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    let listener = tokio::net::TcpListener::bind(bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
