use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use forum_core::config::{config, AppConfig};
use forum_core::csrf;
use forum_core::database::migrations::configured_runner;
use forum_core::database::DatabaseManager;
use forum_core::router::Router;
use forum_core::server::{self, AppState, ErrorBoundary, NotFoundPage, SessionCookie, TemplateRenderer};
use forum_core::session::{spawn_gc, PgSessionStore, SessionHandler, SessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, APP_ENV, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config();
    tracing::info!("Starting forum-core in {:?} mode", config.environment);

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    // Nothing durable is trusted until the schema is current
    let report = configured_runner(pool.clone(), config)?
        .run()
        .await
        .context("migrations failed, refusing to start")?;
    if !report.applied.is_empty() {
        tracing::info!("Applied migrations: {}", report.applied.join(", "));
    }

    let store: Arc<dyn SessionHandler> = Arc::new(PgSessionStore::with_table(pool.clone(), &config.session.table)?);
    let gc = spawn_gc(
        Arc::clone(&store),
        config.session.max_lifetime_secs,
        Duration::from_secs(config.session.gc_interval_secs),
    );

    let state = build_state(config, store)?.with_pool(pool);
    let app = server::app(state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("forum-core listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    gc.abort();
    tracing::info!("forum-core stopped");
    Ok(())
}

fn build_state(config: &AppConfig, store: Arc<dyn SessionHandler>) -> anyhow::Result<AppState> {
    let mut renderer = TemplateRenderer::new();
    if let Some(dir) = config.server.templates_dir.as_deref().filter(|d| d.is_dir()) {
        let loaded = renderer.load_directory(dir)?;
        tracing::info!("Loaded {} template(s) from {}", loaded, dir.display());
    }
    let boundary = ErrorBoundary::new(Arc::new(renderer), config.environment.shows_diagnostics());

    let mut router = Router::new().not_found(NotFoundPage::new(boundary.clone()));
    if let Some(root) = &config.server.static_root {
        router = router.static_root(root.clone());
    }
    router.get("/csrf-token", csrf::issue_token)?;

    Ok(AppState::new(router, SessionManager::new(store), boundary)
        .with_cookie(SessionCookie::from_config(&config.session)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
