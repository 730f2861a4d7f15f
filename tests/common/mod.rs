#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::task::JoinHandle;

use forum_core::router::Router;
use forum_core::server::{self, AppState, ErrorBoundary, NotFoundPage, SessionCookie, TemplateRenderer};
use forum_core::session::{MemorySessionStore, SessionManager};

pub const COOKIE_NAME: &str = "forum_session";

/// The axum app served in-process on a free port, backed by an in-memory
/// session store
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub store: MemorySessionStore,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Serves `router` with the default not-found page attached
    pub async fn spawn(router: Router) -> Result<Self> {
        Self::spawn_with(router, true).await
    }

    pub async fn spawn_with(router: Router, not_found_page: bool) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let boundary = ErrorBoundary::new(Arc::new(TemplateRenderer::new()), false);
        let router = if not_found_page {
            router.not_found(NotFoundPage::new(boundary.clone()))
        } else {
            router
        };

        let store = MemorySessionStore::new();
        let state = AppState::new(router, SessionManager::new(Arc::new(store.clone())), boundary)
            .with_cookie(SessionCookie::new(COOKIE_NAME));

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let app = server::app(state);
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            store,
            handle,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Client that does not follow redirects, so 303s can be asserted
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build client")
}

/// `name=value` pair of the session cookie set by `resp`, if any
pub fn session_cookie(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{}=", COOKIE_NAME)))
        .map(str::to_string)
}

/// Full `Set-Cookie` value for the session cookie
pub fn session_set_cookie(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", COOKIE_NAME)))
        .map(str::to_string)
}

/// Pool for `DATABASE_URL`, or `None` so the caller can skip
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    match PgPoolOptions::new().max_connections(5).connect(&url).await {
        Ok(pool) => Some(pool),
        Err(e) => {
            eprintln!("skipping: cannot connect to DATABASE_URL: {e}");
            None
        }
    }
}

/// Table name unique to this test run
pub fn unique_table(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

pub async fn table_exists(pool: &PgPool, table: &str) -> bool {
    sqlx::query_scalar::<_, bool>("SELECT to_regclass($1::text) IS NOT NULL")
        .bind(table)
        .fetch_one(pool)
        .await
        .unwrap_or(false)
}

pub async fn drop_tables(pool: &PgPool, tables: &[&str]) {
    for table in tables {
        let _ = sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table))
            .execute(pool)
            .await;
    }
}
