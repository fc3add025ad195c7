use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use rapport_core::{
    aggregate, batch_validate, export_reports, filter_reports, report_email, top_n,
    unvalidate_report, validate_report, ExportFormat, FilterCriteria, MailtoLink,
    RoleCapabilities, Stats,
};
use rapport_data::types::check_duration_fields;
use rapport_data::{
    ClientRecord, DataError, ReportInput, ReportPatch, ReportQuery, ReportRecord, ReportStore,
    Role, SoftwareRecord,
};

use crate::state::AppState;

/// How many entries each "top" breakdown shows before collapsing the rest
/// into "Autres".
const TOP_N: usize = 5;

/// Error wrapper translating the data-layer taxonomy into HTTP responses.
#[derive(Debug)]
pub struct ApiError(DataError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DataError::Validation(_) | DataError::MissingField(_) => StatusCode::BAD_REQUEST,
            DataError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            DataError::NotFound { .. } => StatusCode::NOT_FOUND,
            DataError::EditForbidden(_) | DataError::ResourceInUse { .. } => StatusCode::CONFLICT,
            DataError::Auth(_) => StatusCode::UNAUTHORIZED,
            DataError::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Who is performing a mutating action. The UI passes the signed-in user
/// along with each request; capabilities derive from the role.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorInfo {
    pub uid: String,
    pub name: String,
    pub role: Role,
}

impl ActorInfo {
    fn capabilities(&self) -> RoleCapabilities {
        RoleCapabilities::for_role(self.role)
    }
}

fn require(allowed: bool, action: &str) -> Result<(), ApiError> {
    if allowed {
        Ok(())
    } else {
        Err(DataError::PermissionDenied(format!("{} requires a manager role", action)).into())
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// --- Reports ---

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: String,
}

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(criteria): Query<FilterCriteria>,
) -> Json<Vec<ReportRecord>> {
    let reports = state.get_reports().await;
    Json(filter_reports(&reports, &criteria))
}

pub async fn create_report(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ReportInput>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state.store().create_report(input).await?;
    state.reload().await;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReportRecord>, ApiError> {
    Ok(Json(state.store().get_report(&id).await?))
}

#[derive(Deserialize)]
pub struct UpdateReportRequest {
    pub actor: ActorInfo,
    #[serde(flatten)]
    pub patch: ReportPatch,
}

pub async fn update_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateReportRequest>,
) -> Result<StatusCode, ApiError> {
    let report = state.store().get_report(&id).await?;

    // Validation-state changes go through the dedicated endpoints.
    let mut patch = body.patch;
    patch.validation = None;

    if body.actor.role.is_manager() {
        // Managers may edit locked reports; content checks still apply.
        let mut preview = report.clone();
        patch.apply(&mut preview);
        check_duration_fields(preview.duration_unit, preview.hour_count, preview.day_count)?;
    } else {
        if body.actor.uid != report.agent_uid {
            return Err(
                DataError::PermissionDenied("agents can only edit their own reports".to_string())
                    .into(),
            );
        }
        rapport_core::edit_report(&report, &patch)?;
    }

    state.store().update_report(&id, patch).await?;
    state.reload().await;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct ActorRequest {
    pub actor: ActorInfo,
}

pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<StatusCode, ApiError> {
    require(
        body.actor.capabilities().can_delete_reports,
        "deleting a report",
    )?;
    state.store().delete_report(&id).await?;
    state.reload().await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn validate_report_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<ReportRecord>, ApiError> {
    require(body.actor.capabilities().can_validate, "validating a report")?;

    let report = state.store().get_report(&id).await?;
    let patch = validate_report(
        &report,
        &body.actor.uid,
        &body.actor.name,
        Utc::now(),
        state.policy(),
    )?;
    state.store().update_report(&id, patch).await?;
    state.reload().await;

    Ok(Json(state.store().get_report(&id).await?))
}

pub async fn unvalidate_report_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<ReportRecord>, ApiError> {
    require(
        body.actor.capabilities().can_validate,
        "unvalidating a report",
    )?;

    let report = state.store().get_report(&id).await?;
    let patch = unvalidate_report(&report);
    state.store().update_report(&id, patch).await?;
    state.reload().await;

    Ok(Json(state.store().get_report(&id).await?))
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub validated: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Validate every eligible draft. Best effort: per-report failures are
/// counted, not rolled back.
pub async fn batch_validate_reports(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    require(body.actor.capabilities().can_validate, "batch validation")?;

    let reports = state.store().list_reports(&ReportQuery::default()).await?;
    let outcome = batch_validate(
        state.store(),
        &reports,
        &body.actor.uid,
        &body.actor.name,
        Utc::now(),
        state.policy(),
    )
    .await;
    state.reload().await;

    Ok(Json(BatchResponse {
        validated: outcome.validated,
        failed: outcome.failed,
        skipped: outcome.skipped,
    }))
}

// --- Statistics ---

#[derive(Debug, Serialize)]
pub struct TopEntry {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: Stats,
    pub top_agents: Vec<TopEntry>,
    pub top_clients: Vec<TopEntry>,
    pub top_software: Vec<TopEntry>,
    pub top_types: Vec<TopEntry>,
}

fn top_entries(counts: &std::collections::BTreeMap<String, u64>) -> Vec<TopEntry> {
    top_n(counts, TOP_N)
        .into_iter()
        .map(|(name, count)| TopEntry { name, count })
        .collect()
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(criteria): Query<FilterCriteria>,
) -> Json<StatsResponse> {
    let reports = state.get_reports().await;
    let visible = filter_reports(&reports, &criteria);
    let stats = aggregate(&visible, Utc::now());

    let response = StatsResponse {
        top_agents: top_entries(&stats.by_agent),
        top_clients: top_entries(&stats.by_client),
        top_software: top_entries(&stats.by_software),
        top_types: top_entries(&stats.by_type),
        stats,
    };
    Json(response)
}

// --- Export ---

#[derive(Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

pub async fn export_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = params.format.as_deref().unwrap_or("json").parse()?;
    let reports = state.get_reports().await;
    let file = export_reports(&reports, format, Utc::now().date_naive())?;

    let headers = [
        (header::CONTENT_TYPE, file.mime_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file.filename),
        ),
    ];
    Ok((StatusCode::OK, headers, file.content).into_response())
}

// --- Email ---

#[derive(Deserialize)]
pub struct EmailParams {
    pub sender: Option<String>,
}

pub async fn report_email_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<EmailParams>,
) -> Result<Json<MailtoLink>, ApiError> {
    let report = state.store().get_report(&id).await?;
    let sender = params.sender.as_deref().unwrap_or("Responsable IT");
    Ok(Json(report_email(&report, sender)))
}

// --- Clients ---

pub async fn list_clients(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ClientRecord>>, ApiError> {
    Ok(Json(state.store().list_clients().await?))
}

#[derive(Deserialize)]
pub struct CreateClientRequest {
    pub actor: ActorInfo,
    pub name: String,
}

pub async fn create_client(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    require(
        body.actor.capabilities().can_edit_resources,
        "managing clients",
    )?;
    let id = state
        .store()
        .add_client(&body.name, &body.actor.uid)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Refuses (409) while any report still references the client by name.
pub async fn delete_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<StatusCode, ApiError> {
    require(
        body.actor.capabilities().can_edit_resources,
        "managing clients",
    )?;
    state.store().delete_client_checked(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Software ---

pub async fn list_software(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SoftwareRecord>>, ApiError> {
    Ok(Json(state.store().list_software().await?))
}

#[derive(Deserialize)]
pub struct CreateSoftwareRequest {
    pub actor: ActorInfo,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_software(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSoftwareRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    require(
        body.actor.capabilities().can_edit_resources,
        "managing software",
    )?;
    let id = state
        .store()
        .add_software(&body.name, &body.actor.uid, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn delete_software(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ActorRequest>,
) -> Result<StatusCode, ApiError> {
    require(
        body.actor.capabilities().can_edit_resources,
        "managing software",
    )?;
    state.store().delete_software_checked(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
