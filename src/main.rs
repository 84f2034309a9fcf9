use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drawbattle::{
    api,
    config::ServerConfig,
    judge::JudgeConfig,
    state::{AppState, PromptDeck},
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drawbattle=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting drawbattle...");

    let config = ServerConfig::from_env();
    let judge = JudgeConfig::from_env().build_judge();
    let prompts = PromptDeck::load(&config.prompts_path);

    let state = Arc::new(
        AppState::new()
            .with_judge(judge)
            .with_prompts(prompts)
            .with_grace_period(config.grace_period)
            .with_judge_deadline(config.judge_deadline),
    );

    let app = api::router(state, &config.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
