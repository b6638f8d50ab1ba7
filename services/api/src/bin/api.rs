//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, GeminiCompletionAdapter, OpenAiCompletionAdapter, ReqwestFetcher},
    config::Config,
    error::ApiError,
    web::{
        generate_quiz_handler, list_attempts_handler, rest::ApiDoc, state::AppState,
        submit_attempt_handler, upload_quiz_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::post,
    Router,
};
use quiz_forge_core::{AttemptService, ProviderKind, ProviderRegistry, QuizPipeline, TextCompletionService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds every completion provider that has credentials and registers it.
fn build_providers(config: &Config) -> Result<ProviderRegistry, ApiError> {
    let mut available: Vec<(ProviderKind, Arc<dyn TextCompletionService>)> = Vec::new();

    if let Some(api_key) = &config.openai_api_key {
        let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
        available.push((
            ProviderKind::OpenAi,
            Arc::new(OpenAiCompletionAdapter::new(
                client,
                config.openai_model.clone(),
                config.openai_fast_model.clone(),
            )),
        ));
    }

    if let Some(api_key) = &config.gemini_api_key {
        available.push((
            ProviderKind::Gemini,
            Arc::new(GeminiCompletionAdapter::new(
                reqwest::Client::builder().build()?,
                config.gemini_api_base.clone(),
                api_key.clone(),
                config.gemini_model.clone(),
                config.gemini_fast_model.clone(),
            )),
        ));
    }

    let default_provider = available
        .iter()
        .find(|(kind, _)| *kind == config.llm_provider)
        .map(|(_, provider)| provider.clone())
        .ok_or_else(|| {
            ApiError::Internal(format!("No credentials for the {} provider", config.llm_provider))
        })?;

    let mut registry = ProviderRegistry::new(config.llm_provider, default_provider);
    for (kind, provider) in available {
        if kind != config.llm_provider {
            registry.register(kind, provider);
        }
    }
    Ok(registry)
}

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
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let providers = build_providers(&config)?;
    info!(default_provider = %providers.default_kind(), "Completion providers ready");
    let fetcher = Arc::new(ReqwestFetcher::new()?);

    // --- 4. Build the Shared AppState ---
    let pipeline = Arc::new(QuizPipeline::new(
        db_adapter.clone(),
        fetcher,
        providers,
        config.pipeline.clone(),
    ));
    let attempts = Arc::new(AttemptService::new(db_adapter));
    let app_state = Arc::new(AppState {
        pipeline,
        attempts,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-user-id")]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/quizzes/generate", post(generate_quiz_handler))
        .route("/quizzes/generate/upload", post(upload_quiz_handler))
        .route(
            "/attempts",
            post(submit_attempt_handler).get(list_attempts_handler),
        )
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

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
