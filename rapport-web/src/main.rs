use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use rapport_core::ValidationPolicy;
use rapport_data::{ConvexReportStore, MemoryReportStore, ReportStore};
use rapport_web::config::load_config;
use rapport_web::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;

    let policy = match config.validation_policy.as_deref() {
        Some(raw) => raw.parse::<ValidationPolicy>()?,
        None => ValidationPolicy::default(),
    };

    let store: Arc<dyn ReportStore> = match config.convex_url.as_deref() {
        Some(url) => {
            info!(url = %url, "connecting to Convex backend");
            Arc::new(ConvexReportStore::connect(url).await?)
        }
        None => {
            info!("no convex_url configured, using in-memory store");
            Arc::new(MemoryReportStore::new())
        }
    };

    let state = AppState::new(store, policy);

    // Load initial data, then mirror the realtime feed
    state.reload().await;
    let _sync = rapport_web::start_report_sync(state.clone());

    // Check for a built frontend in frontend/dist
    let static_dir = std::env::current_dir()?.join("frontend").join("dist");
    let app = if static_dir.exists() {
        info!("serving static files from {}", static_dir.display());
        rapport_web::build_router_with_static(state, static_dir.to_str().unwrap())
    } else {
        info!("no frontend build found, serving API only");
        rapport_web::build_router(state)
    };

    let addr: SocketAddr = match config.bind_addr.as_deref() {
        Some(raw) => raw.parse()?,
        None => SocketAddr::from(([127, 0, 0, 1], 3200)),
    };
    info!("rapport-web listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
