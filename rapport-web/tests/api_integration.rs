use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use rapport_core::ValidationPolicy;
use rapport_data::MemoryReportStore;
use rapport_web::state::AppState;

/// Start the server on a random port and return the address
async fn start_test_server(policy: ValidationPolicy) -> SocketAddr {
    let state = AppState::new(Arc::new(MemoryReportStore::new()), policy);
    state.reload().await;
    let app = rapport_web::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn report_body(client: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "agent_uid": "u-1",
        "agent_name": "Alice",
        "client_name": client,
        "software": "ERP",
        "site": "Abidjan",
        "object": "Installation serveur",
        "date": "2026-08-03",
        "status": status,
        "duration_unit": "heures",
        "hour_count": 2.5,
    })
}

fn manager_actor() -> serde_json::Value {
    serde_json::json!({ "actor": { "uid": "m-1", "name": "Marie", "role": "responsable" } })
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = start_test_server(ValidationPolicy::default()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/api/health", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_reports_returns_empty_array() {
    let addr = start_test_server(ValidationPolicy::default()).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/api/reports", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.is_array());
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_then_fetch_report() {
    let addr = start_test_server(ValidationPolicy::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/api/reports", addr))
        .json(&report_body("Acme", "En cours"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: serde_json::Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let response = client
        .get(format!("http://{}/api/reports/{}", addr, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["client_name"], "Acme");
    assert_eq!(report["status"], "En cours");
    assert_eq!(report["day_count"], serde_json::Value::Null);
    assert!(report["duration"].as_str().unwrap().contains("2.5"));
    assert_eq!(report["can_edit"], true);
}

#[tokio::test]
async fn test_create_report_missing_field_returns_400() {
    let addr = start_test_server(ValidationPolicy::default()).await;
    let client = reqwest::Client::new();

    let mut body = report_body("Acme", "En cours");
    body["site"] = serde_json::json!("");
    let response = client
        .post(format!("http://{}/api/reports", addr))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let error: serde_json::Value = response.json().await.unwrap();
    assert!(error["error"].as_str().unwrap().contains("site"));
}

#[tokio::test]
async fn test_validate_locks_report_under_default_policy() {
    let addr = start_test_server(ValidationPolicy::LockOnValidate).await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("http://{}/api/reports", addr))
        .json(&report_body("Acme", "Terminé"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let response = client
        .post(format!("http://{}/api/reports/{}/validate", addr, id))
        .json(&manager_actor())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let validated: serde_json::Value = response.json().await.unwrap();
    assert_eq!(validated["is_validated"], true);
    assert_eq!(validated["can_edit"], false);
    assert_eq!(validated["validated_by"], "m-1");

    // Unvalidate restores editability and clears the audit fields
    let response = client
        .post(format!("http://{}/api/reports/{}/unvalidate", addr, id))
        .json(&manager_actor())
        .send()
        .await
        .unwrap();
    let reverted: serde_json::Value = response.json().await.unwrap();
    assert_eq!(reverted["is_validated"], false);
    assert_eq!(reverted["can_edit"], true);
    assert_eq!(reverted["validated_by"], serde_json::Value::Null);
    assert_eq!(reverted["validated_at"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_validate_keeps_editability_under_keep_editable_policy() {
    let addr = start_test_server(ValidationPolicy::KeepEditable).await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("http://{}/api/reports", addr))
        .json(&report_body("Acme", "Terminé"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let validated: serde_json::Value = client
        .post(format!("http://{}/api/reports/{}/validate", addr, id))
        .json(&manager_actor())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(validated["is_validated"], true);
    assert_eq!(validated["can_edit"], true);
}

#[tokio::test]
async fn test_validate_in_progress_report_returns_400() {
    let addr = start_test_server(ValidationPolicy::default()).await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("http://{}/api/reports", addr))
        .json(&report_body("Acme", "En cours"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let response = client
        .post(format!("http://{}/api/reports/{}/validate", addr, id))
        .json(&manager_actor())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_filtered_listing_is_case_insensitive() {
    let addr = start_test_server(ValidationPolicy::default()).await;
    let client = reqwest::Client::new();

    for name in ["Acme Corp", "ACME Industries", "Beta SARL"] {
        client
            .post(format!("http://{}/api/reports", addr))
            .json(&report_body(name, "Terminé"))
            .send()
            .await
            .unwrap();
    }

    let response = client
        .get(format!("http://{}/api/reports?client=acme", addr))
        .send()
        .await
        .unwrap();
    let reports: serde_json::Value = response.json().await.unwrap();
    assert_eq!(reports.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stats_endpoint_counts_pending() {
    let addr = start_test_server(ValidationPolicy::default()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{}/api/reports", addr))
        .json(&report_body("Acme", "En cours"))
        .send()
        .await
        .unwrap();
    client
        .post(format!("http://{}/api/reports", addr))
        .json(&report_body("Beta", "Terminé"))
        .send()
        .await
        .unwrap();

    let stats: serde_json::Value = client
        .get(format!("http://{}/api/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["pending_count"], 1);
    assert_eq!(stats["weekly"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_csv_export_downloads_with_filename() {
    let addr = start_test_server(ValidationPolicy::default()).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{}/api/reports", addr))
        .json(&report_body("Acme", "Terminé"))
        .send()
        .await
        .unwrap();

    let response = client
        .get(format!("http://{}/api/export?format=csv", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let disposition = response
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"export_reports_"));

    let body = response.text().await.unwrap();
    let mut lines = body.lines();
    assert!(lines.next().unwrap().starts_with("id,date,agent_name"));
    assert!(lines.next().unwrap().contains("Acme"));
}

#[tokio::test]
async fn test_agent_forbidden_from_batch_validate() {
    let addr = start_test_server(ValidationPolicy::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{}/api/reports/batch-validate", addr))
        .json(&serde_json::json!({
            "actor": { "uid": "u-1", "name": "Alice", "role": "agent" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_batch_validate_over_http() {
    let addr = start_test_server(ValidationPolicy::default()).await;
    let client = reqwest::Client::new();

    for status in ["Terminé", "Terminé", "En cours"] {
        client
            .post(format!("http://{}/api/reports", addr))
            .json(&report_body("Acme", status))
            .send()
            .await
            .unwrap();
    }

    let outcome: serde_json::Value = client
        .post(format!("http://{}/api/reports/batch-validate", addr))
        .json(&manager_actor())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["validated"], 2);
    assert_eq!(outcome["skipped"], 1);
    assert_eq!(outcome["failed"], 0);
}
