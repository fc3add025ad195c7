pub mod api;
pub mod config;
pub mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use rapport_data::{ReportQuery, StoreEvent};

use crate::state::AppState;

/// Build the Axum router with all routes
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Build the router with static file serving for production builds
pub fn build_router_with_static(state: Arc<AppState>, static_dir: &str) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws", get(ws::ws_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(api::health))
        .route("/reports", get(api::list_reports).post(api::create_report))
        .route("/reports/batch-validate", post(api::batch_validate_reports))
        .route(
            "/reports/{id}",
            get(api::get_report)
                .put(api::update_report)
                .delete(api::delete_report),
        )
        .route("/reports/{id}/validate", post(api::validate_report_handler))
        .route(
            "/reports/{id}/unvalidate",
            post(api::unvalidate_report_handler),
        )
        .route("/reports/{id}/email", get(api::report_email_link))
        .route("/stats", get(api::get_stats))
        .route("/export", get(api::export_data))
        .route("/clients", get(api::list_clients).post(api::create_client))
        .route("/clients/{id}", axum::routing::delete(api::delete_client))
        .route(
            "/software",
            get(api::list_software).post(api::create_software),
        )
        .route(
            "/software/{id}",
            axum::routing::delete(api::delete_software),
        )
}

/// Start the background task that mirrors the store's realtime report feed
/// into the shared state. Every snapshot replaces the cache wholesale;
/// feed errors are logged and the subscription is re-established.
pub fn start_report_sync(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mut sub = match state.store().subscribe_reports(ReportQuery::default()).await {
                Ok(sub) => sub,
                Err(e) => {
                    warn!(error = %e, "report subscription failed, retrying");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            while let Some(event) = sub.next_event().await {
                match event {
                    StoreEvent::Snapshot(reports) => state.replace_reports(reports).await,
                    StoreEvent::Error(msg) => {
                        warn!(error = %msg, "report subscription error");
                    }
                }
            }

            info!("report feed ended, resubscribing");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rapport_core::ValidationPolicy;
    use rapport_data::{MemoryReportStore, ReportInput, ReportStore};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        AppState::new(
            Arc::new(MemoryReportStore::new()),
            ValidationPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_reports_endpoint() {
        let state = test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/reports")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_nonexistent_report_endpoint() {
        let state = test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/reports/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let state = test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["total"], 0);
        assert_eq!(json["top_types"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_export_unknown_format_is_400() {
        let state = test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/export?format=xlsx")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_report_sync_mirrors_store_changes() {
        let store = Arc::new(MemoryReportStore::new());
        let state = AppState::new(store.clone(), ValidationPolicy::default());
        let sync = start_report_sync(state.clone());

        store
            .create_report(ReportInput {
                agent_uid: "u-1".into(),
                agent_name: "Alice".into(),
                client_name: "Acme".into(),
                software: "ERP".into(),
                site: "Abidjan".into(),
                object: "Install".into(),
                date: "2026-08-03".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        // Wait for the pump to deliver the snapshot
        let mut rx = state.subscribe();
        let deadline = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if state.get_reports().await.len() == 1 {
                    break;
                }
                let _ = rx.recv().await;
            }
        })
        .await;
        assert!(deadline.is_ok(), "sync pump never delivered the snapshot");

        sync.abort();
    }

    #[tokio::test]
    async fn test_health_response_body() {
        let state = test_state();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }
}
