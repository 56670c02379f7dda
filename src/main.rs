use future_you::config::AppConfig;
use future_you::generation::{SessionDeps, SessionRegistry};
use future_you::imagegen::{ImageClient, create_provider};
use future_you::server::{AppState, app_routes};
use future_you::storage::create_store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("  export GEMINI_API_KEY=...");
            std::process::exit(1);
        }
    };

    eprintln!("FutureYou v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.image.model);
    eprintln!("   Year: {}", config.generation.calendar_year);
    eprintln!(
        "   Batch width: {}, retries: {}",
        config.generation.batch_width, config.retry.max_retries
    );
    eprintln!("   API: http://0.0.0.0:{}/api/calendars", config.server.port);
    eprintln!("   WS: ws://0.0.0.0:{}/ws/calendars/{{id}}", config.server.port);

    // ── Image generation ──────────────────────────────────────────────────
    let provider = create_provider(&config.image);
    let client = ImageClient::new(provider, config.retry.clone());

    // ── Storage ───────────────────────────────────────────────────────────
    let store = create_store(&config.storage);

    // ── Sessions ──────────────────────────────────────────────────────────
    let registry = SessionRegistry::new(SessionDeps {
        client: client.clone(),
        store: store.clone(),
        config: config.generation.clone(),
        namespace: config.storage.namespace.clone(),
    });

    let app = app_routes(AppState {
        registry,
        client,
        store,
        namespace: config.storage.namespace.clone(),
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port)).await?;
    tracing::info!(port = config.server.port, "FutureYou server started");
    axum::serve(listener, app).await?;

    Ok(())
}
