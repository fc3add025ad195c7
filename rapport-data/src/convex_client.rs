use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use convex::{ConvexClient, FunctionResult, QuerySubscription, Value};
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};

use crate::error::{AuthError, DataError, Result};
use crate::store::{ReportPatch, ReportQuery, ReportStore, ReportSubscription, StoreEvent};
use crate::types::*;

/// Typed wrapper around the Convex Rust SDK client.
///
/// All methods map to Convex functions over the `users`, `clients`,
/// `software` and `reports` collections. Timestamps (`createdAt` /
/// `updatedAt`) are stamped server-side by the mutations.
pub struct RapportConvexClient {
    client: ConvexClient,
}

/// Classify a backend error message into the typed taxonomy.
fn convex_error(msg: impl Into<String>) -> DataError {
    let msg = msg.into();
    let lower = msg.to_lowercase();
    if lower.starts_with("auth/") {
        return DataError::Auth(AuthError::from_code(&msg));
    }
    if lower.contains("permission") || lower.contains("unauthorized") {
        DataError::PermissionDenied(msg)
    } else {
        DataError::Backend(msg)
    }
}

/// Backend "not found" messages become typed NotFound for the entity the
/// call was about.
fn remap_not_found(err: DataError, what: &'static str, id: &str) -> DataError {
    match err {
        DataError::Backend(msg) if msg.to_lowercase().contains("not found") => {
            DataError::not_found(what, id)
        }
        other => other,
    }
}

// --- Arg-building helpers ---

fn report_input_to_args(input: &ReportInput) -> BTreeMap<String, Value> {
    let mut args = BTreeMap::new();
    args.insert("agentUid".into(), Value::from(input.agent_uid.as_str()));
    args.insert("agentName".into(), Value::from(input.agent_name.as_str()));
    if let Some(ref cid) = input.client_id {
        args.insert("clientId".into(), Value::from(cid.as_str()));
    }
    args.insert(
        "clientName".into(),
        Value::from(input.client_name.as_str()),
    );
    if let Some(ref sid) = input.software_id {
        args.insert("softwareId".into(), Value::from(sid.as_str()));
    }
    args.insert("software".into(), Value::from(input.software.as_str()));
    args.insert("site".into(), Value::from(input.site.as_str()));
    args.insert("date".into(), Value::from(input.date.as_str()));
    args.insert("object".into(), Value::from(input.object.as_str()));
    args.insert(
        "interlocutor".into(),
        Value::from(input.interlocutor.as_deref().unwrap_or("Non spécifié")),
    );
    args.insert(
        "contact".into(),
        Value::from(input.contact.as_deref().unwrap_or("Non spécifié")),
    );
    args.insert(
        "type".into(),
        Value::from(
            input
                .intervention_type
                .as_deref()
                .unwrap_or("Non spécifié"),
        ),
    );
    args.insert(
        "technicalDetails".into(),
        Value::from(input.technical_details.as_deref().unwrap_or("")),
    );
    args.insert("duration".into(), Value::from(input.duration_display()));
    match input.duration_unit {
        Some(unit) => args.insert("durationUnit".into(), Value::from(unit.to_string())),
        None => args.insert("durationUnit".into(), Value::Null),
    };
    match input.hour_count {
        Some(h) => args.insert("hourCount".into(), Value::from(h)),
        None => args.insert("hourCount".into(), Value::Null),
    };
    match input.day_count {
        Some(d) => args.insert("dayCount".into(), Value::from(d)),
        None => args.insert("dayCount".into(), Value::Null),
    };
    args.insert(
        "status".into(),
        Value::from(input.status.unwrap_or(ReportStatus::InProgress).as_str()),
    );
    // Lifecycle defaults for a fresh report
    args.insert("isValidated".into(), Value::from(false));
    args.insert("canEdit".into(), Value::from(true));
    args.insert("validatedBy".into(), Value::Null);
    args.insert("validatedByName".into(), Value::Null);
    args.insert("validatedAt".into(), Value::Null);
    args
}

fn opt_str_value(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::from(s.as_str()),
        None => Value::Null,
    }
}

fn report_patch_to_args(id: &str, patch: &ReportPatch) -> BTreeMap<String, Value> {
    let mut args = BTreeMap::new();
    args.insert("reportId".into(), Value::from(id));
    if let Some(ref v) = patch.client_id {
        args.insert("clientId".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.client_name {
        args.insert("clientName".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.software_id {
        args.insert("softwareId".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.software {
        args.insert("software".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.site {
        args.insert("site".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.interlocutor {
        args.insert("interlocutor".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.contact {
        args.insert("contact".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.intervention_type {
        args.insert("type".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.object {
        args.insert("object".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.technical_details {
        args.insert("technicalDetails".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.date {
        args.insert("date".into(), Value::from(v.as_str()));
    }
    if let Some(ref v) = patch.duration {
        args.insert("duration".into(), Value::from(v.as_str()));
    }
    if let Some(unit) = patch.duration_unit {
        args.insert("durationUnit".into(), Value::from(unit.to_string()));
    }
    if let Some(h) = patch.hour_count {
        args.insert("hourCount".into(), Value::from(h));
    }
    if let Some(d) = patch.day_count {
        args.insert("dayCount".into(), Value::from(d));
    }
    if let Some(status) = patch.status {
        args.insert("status".into(), Value::from(status.as_str()));
    }
    if let Some(ref v) = patch.validation {
        args.insert("isValidated".into(), Value::from(v.is_validated));
        args.insert("validatedBy".into(), opt_str_value(&v.validated_by));
        args.insert(
            "validatedByName".into(),
            opt_str_value(&v.validated_by_name),
        );
        args.insert("validatedAt".into(), opt_str_value(&v.validated_at));
        args.insert("canEdit".into(), Value::from(v.can_edit));
    }
    args
}

fn report_query_to_args(query: &ReportQuery) -> BTreeMap<String, Value> {
    let mut args = BTreeMap::new();
    if let Some(ref uid) = query.agent_uid {
        args.insert("agentUid".into(), Value::from(uid.as_str()));
    }
    if let Some(ref name) = query.agent_name {
        args.insert("agentName".into(), Value::from(name.as_str()));
    }
    if let Some(ref client) = query.client_name {
        args.insert("clientName".into(), Value::from(client.as_str()));
    }
    if let Some(ref software) = query.software {
        args.insert("software".into(), Value::from(software.as_str()));
    }
    if let Some(status) = query.status {
        args.insert("status".into(), Value::from(status.as_str()));
    }
    if let Some(validated) = query.is_validated {
        args.insert("isValidated".into(), Value::from(validated));
    }
    if let Some(ref start) = query.date_start {
        args.insert("dateStart".into(), Value::from(start.as_str()));
    }
    if let Some(ref end) = query.date_end {
        args.insert("dateEnd".into(), Value::from(end.as_str()));
    }
    if let Some(limit) = query.limit {
        // Convex v.number() validates as float64; send an f64 literal.
        args.insert("limit".into(), Value::from(limit as f64));
    }
    args
}

// --- Query result extraction helpers ---

fn value_as_str(map: &BTreeMap<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn value_as_opt_str(map: &BTreeMap<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn value_as_opt_f64(map: &BTreeMap<String, Value>, key: &str) -> Option<f64> {
    match map.get(key) {
        Some(Value::Float64(f)) => Some(*f),
        Some(Value::Int64(n)) => Some(*n as f64),
        _ => None,
    }
}

fn value_as_f64(map: &BTreeMap<String, Value>, key: &str) -> f64 {
    value_as_opt_f64(map, key).unwrap_or(0.0)
}

fn value_as_bool(map: &BTreeMap<String, Value>, key: &str, default: bool) -> bool {
    match map.get(key) {
        Some(Value::Boolean(b)) => *b,
        _ => default,
    }
}

fn value_as_id(map: &BTreeMap<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Canonicalize a stored report document. This is the single place where
/// legacy field spellings (`type` / `interventionType` / `typeIntervention`)
/// and free-form status strings are normalized.
fn extract_report_from_obj(obj: &BTreeMap<String, Value>) -> ReportRecord {
    let intervention_type = value_as_opt_str(obj, "type")
        .or_else(|| value_as_opt_str(obj, "interventionType"))
        .or_else(|| value_as_opt_str(obj, "typeIntervention"))
        .unwrap_or_else(|| "Non spécifié".to_string());

    ReportRecord {
        id: value_as_id(obj, "_id"),
        agent_uid: value_as_str(obj, "agentUid"),
        agent_name: value_as_str(obj, "agentName"),
        client_id: value_as_opt_str(obj, "clientId"),
        client_name: value_as_str(obj, "clientName"),
        software_id: value_as_opt_str(obj, "softwareId"),
        software: value_as_str(obj, "software"),
        site: value_as_str(obj, "site"),
        interlocutor: value_as_str(obj, "interlocutor"),
        contact: value_as_str(obj, "contact"),
        intervention_type,
        object: value_as_str(obj, "object"),
        technical_details: value_as_str(obj, "technicalDetails"),
        date: value_as_str(obj, "date"),
        duration: value_as_str(obj, "duration"),
        duration_unit: value_as_opt_str(obj, "durationUnit").and_then(|s| s.parse().ok()),
        hour_count: value_as_opt_f64(obj, "hourCount"),
        day_count: value_as_opt_f64(obj, "dayCount"),
        status: ReportStatus::normalize(&value_as_str(obj, "status")),
        is_validated: value_as_bool(obj, "isValidated", false),
        validated_by: value_as_opt_str(obj, "validatedBy"),
        validated_by_name: value_as_opt_str(obj, "validatedByName"),
        validated_at: value_as_opt_str(obj, "validatedAt"),
        can_edit: value_as_bool(obj, "canEdit", true),
        created_at: value_as_str(obj, "createdAt"),
        updated_at: value_as_str(obj, "updatedAt"),
    }
}

fn extract_client_from_obj(obj: &BTreeMap<String, Value>) -> ClientRecord {
    let contact = match obj.get("contactInfo") {
        Some(Value::Object(info)) => ContactInfo {
            address: value_as_str(info, "address"),
            phone: value_as_str(info, "phone"),
            email: value_as_str(info, "email"),
            contact_person: value_as_str(info, "contactPerson"),
        },
        _ => ContactInfo::default(),
    };
    ClientRecord {
        id: value_as_id(obj, "_id"),
        name: value_as_str(obj, "name"),
        created_by: value_as_str(obj, "createdBy"),
        is_active: value_as_bool(obj, "isActive", true),
        contact,
        notes: value_as_str(obj, "notes"),
        created_at: value_as_str(obj, "createdAt"),
        updated_at: value_as_str(obj, "updatedAt"),
    }
}

fn extract_software_from_obj(obj: &BTreeMap<String, Value>) -> SoftwareRecord {
    SoftwareRecord {
        id: value_as_id(obj, "_id"),
        name: value_as_str(obj, "name"),
        description: value_as_str(obj, "description"),
        version: value_as_str(obj, "version"),
        category: value_as_str(obj, "category"),
        vendor: value_as_str(obj, "vendor"),
        is_active: value_as_bool(obj, "isActive", true),
        created_by: value_as_str(obj, "createdBy"),
        created_at: value_as_str(obj, "createdAt"),
        updated_at: value_as_str(obj, "updatedAt"),
    }
}

fn extract_user_from_obj(obj: &BTreeMap<String, Value>) -> UserRecord {
    let stats = match obj.get("stats") {
        Some(Value::Object(s)) => UserStats {
            total_reports: value_as_f64(s, "totalReports") as u32,
            validated_reports: value_as_f64(s, "validatedReports") as u32,
            pending_reports: value_as_f64(s, "pendingReports") as u32,
            total_hours: value_as_f64(s, "totalHours"),
        },
        _ => UserStats::default(),
    };
    UserRecord {
        uid: value_as_id(obj, "_id"),
        email: value_as_str(obj, "email"),
        full_name: value_as_str(obj, "fullName"),
        role: value_as_str(obj, "role").parse().unwrap_or(Role::Agent),
        is_active: value_as_bool(obj, "isActive", true),
        stats,
        last_login: value_as_opt_str(obj, "lastLogin"),
        created_at: value_as_str(obj, "createdAt"),
        updated_at: value_as_str(obj, "updatedAt"),
    }
}

/// Extract a string ID from a Convex FunctionResult.
fn extract_id(result: FunctionResult) -> Result<String> {
    match result {
        FunctionResult::Value(Value::String(id)) => Ok(id),
        FunctionResult::Value(other) => Err(DataError::Backend(format!(
            "expected string ID, got: {:?}",
            other
        ))),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

/// Extract unit result (for mutations that don't return a meaningful value).
fn extract_unit(result: FunctionResult) -> Result<()> {
    match result {
        FunctionResult::Value(_) => Ok(()),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

fn reports_from_value(value: &Value) -> Result<Vec<ReportRecord>> {
    match value {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|v| match v {
                Value::Object(obj) => Some(extract_report_from_obj(obj)),
                _ => None,
            })
            .collect()),
        Value::Null => Ok(vec![]),
        other => Err(DataError::Backend(format!(
            "expected array for report list, got: {:?}",
            other
        ))),
    }
}

fn extract_report_list(result: FunctionResult) -> Result<Vec<ReportRecord>> {
    match result {
        FunctionResult::Value(value) => reports_from_value(&value),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

fn extract_optional_report(result: FunctionResult) -> Result<Option<ReportRecord>> {
    match result {
        FunctionResult::Value(Value::Null) => Ok(None),
        FunctionResult::Value(Value::Object(obj)) => Ok(Some(extract_report_from_obj(&obj))),
        FunctionResult::Value(other) => Err(DataError::Backend(format!(
            "expected object or null for report, got: {:?}",
            other
        ))),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

fn extract_client_list(result: FunctionResult) -> Result<Vec<ClientRecord>> {
    match result {
        FunctionResult::Value(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|v| match v {
                Value::Object(obj) => Some(extract_client_from_obj(obj)),
                _ => None,
            })
            .collect()),
        FunctionResult::Value(Value::Null) => Ok(vec![]),
        FunctionResult::Value(other) => Err(DataError::Backend(format!(
            "expected array for client list, got: {:?}",
            other
        ))),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

fn extract_optional_client(result: FunctionResult) -> Result<Option<ClientRecord>> {
    match result {
        FunctionResult::Value(Value::Null) => Ok(None),
        FunctionResult::Value(Value::Object(obj)) => Ok(Some(extract_client_from_obj(&obj))),
        FunctionResult::Value(other) => Err(DataError::Backend(format!(
            "expected object or null for client, got: {:?}",
            other
        ))),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

fn extract_software_list(result: FunctionResult) -> Result<Vec<SoftwareRecord>> {
    match result {
        FunctionResult::Value(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|v| match v {
                Value::Object(obj) => Some(extract_software_from_obj(obj)),
                _ => None,
            })
            .collect()),
        FunctionResult::Value(Value::Null) => Ok(vec![]),
        FunctionResult::Value(other) => Err(DataError::Backend(format!(
            "expected array for software list, got: {:?}",
            other
        ))),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

fn extract_optional_software(result: FunctionResult) -> Result<Option<SoftwareRecord>> {
    match result {
        FunctionResult::Value(Value::Null) => Ok(None),
        FunctionResult::Value(Value::Object(obj)) => Ok(Some(extract_software_from_obj(&obj))),
        FunctionResult::Value(other) => Err(DataError::Backend(format!(
            "expected object or null for software, got: {:?}",
            other
        ))),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

fn extract_user_list(result: FunctionResult) -> Result<Vec<UserRecord>> {
    match result {
        FunctionResult::Value(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|v| match v {
                Value::Object(obj) => Some(extract_user_from_obj(obj)),
                _ => None,
            })
            .collect()),
        FunctionResult::Value(Value::Null) => Ok(vec![]),
        FunctionResult::Value(other) => Err(DataError::Backend(format!(
            "expected array for user list, got: {:?}",
            other
        ))),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

fn extract_optional_user(result: FunctionResult) -> Result<Option<UserRecord>> {
    match result {
        FunctionResult::Value(Value::Null) => Ok(None),
        FunctionResult::Value(Value::Object(obj)) => Ok(Some(extract_user_from_obj(&obj))),
        FunctionResult::Value(other) => Err(DataError::Backend(format!(
            "expected object or null for user, got: {:?}",
            other
        ))),
        FunctionResult::ErrorMessage(msg) => Err(convex_error(msg)),
        FunctionResult::ConvexError(err) => Err(convex_error(format!("{:?}", err))),
    }
}

impl RapportConvexClient {
    /// Connect to a Convex deployment.
    pub async fn new(deployment_url: &str) -> Result<Self> {
        let client = ConvexClient::new(deployment_url)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        Ok(Self { client })
    }

    // --- Reports ---

    /// Persist a new report with lifecycle defaults. Returns the new id.
    pub async fn create_report(&mut self, input: &ReportInput) -> Result<String> {
        let args = report_input_to_args(input);
        let result = self
            .client
            .mutation("reports:createReport", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_id(result)
    }

    pub async fn get_report(&mut self, report_id: &str) -> Result<Option<ReportRecord>> {
        let mut args = BTreeMap::new();
        args.insert("reportId".into(), Value::from(report_id));
        let result = self
            .client
            .query("reports:getReport", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_optional_report(result)
    }

    pub async fn update_report(&mut self, report_id: &str, patch: &ReportPatch) -> Result<()> {
        let args = report_patch_to_args(report_id, patch);
        let result = self
            .client
            .mutation("reports:updateReport", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_unit(result).map_err(|e| remap_not_found(e, "report", report_id))
    }

    pub async fn delete_report(&mut self, report_id: &str) -> Result<()> {
        let mut args = BTreeMap::new();
        args.insert("reportId".into(), Value::from(report_id));
        let result = self
            .client
            .mutation("reports:deleteReport", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_unit(result).map_err(|e| remap_not_found(e, "report", report_id))
    }

    /// List reports matching the query, ordered `createdAt` descending.
    pub async fn list_reports(&mut self, query: &ReportQuery) -> Result<Vec<ReportRecord>> {
        let args = report_query_to_args(query);
        let result = self
            .client
            .query("reports:listReports", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_report_list(result)
    }

    /// Subscribe to the matching report set. Returns the raw
    /// QuerySubscription; each item carries the full current set.
    pub async fn subscribe_reports(&mut self, query: &ReportQuery) -> Result<QuerySubscription> {
        let args = report_query_to_args(query);
        self.client
            .subscribe("reports:listReports", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))
    }

    // --- Clients ---

    pub async fn list_clients(&mut self) -> Result<Vec<ClientRecord>> {
        let result = self
            .client
            .query("clients:listClients", BTreeMap::new())
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_client_list(result)
    }

    pub async fn get_client(&mut self, client_id: &str) -> Result<Option<ClientRecord>> {
        let mut args = BTreeMap::new();
        args.insert("clientId".into(), Value::from(client_id));
        let result = self
            .client
            .query("clients:getClient", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_optional_client(result)
    }

    pub async fn get_client_by_name(&mut self, name: &str) -> Result<Option<ClientRecord>> {
        let mut args = BTreeMap::new();
        args.insert("name".into(), Value::from(name));
        let result = self
            .client
            .query("clients:getByName", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_optional_client(result)
    }

    /// Create a client. The mutation rejects duplicate names.
    pub async fn add_client(&mut self, name: &str, created_by: &str) -> Result<String> {
        let mut args = BTreeMap::new();
        args.insert("name".into(), Value::from(name));
        args.insert("createdBy".into(), Value::from(created_by));
        let result = self
            .client
            .mutation("clients:addClient", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_id(result).map_err(|e| match e {
            DataError::Backend(msg) if msg.to_lowercase().contains("exist") => {
                DataError::Validation(msg)
            }
            other => other,
        })
    }

    pub async fn delete_client(&mut self, client_id: &str) -> Result<()> {
        let mut args = BTreeMap::new();
        args.insert("clientId".into(), Value::from(client_id));
        let result = self
            .client
            .mutation("clients:deleteClient", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_unit(result).map_err(|e| remap_not_found(e, "client", client_id))
    }

    // --- Software ---

    pub async fn list_software(&mut self) -> Result<Vec<SoftwareRecord>> {
        let result = self
            .client
            .query("software:listSoftware", BTreeMap::new())
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_software_list(result)
    }

    pub async fn get_software(&mut self, software_id: &str) -> Result<Option<SoftwareRecord>> {
        let mut args = BTreeMap::new();
        args.insert("softwareId".into(), Value::from(software_id));
        let result = self
            .client
            .query("software:getSoftware", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_optional_software(result)
    }

    pub async fn get_software_by_name(&mut self, name: &str) -> Result<Option<SoftwareRecord>> {
        let mut args = BTreeMap::new();
        args.insert("name".into(), Value::from(name));
        let result = self
            .client
            .query("software:getByName", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_optional_software(result)
    }

    pub async fn add_software(
        &mut self,
        name: &str,
        created_by: &str,
        description: &str,
    ) -> Result<String> {
        let mut args = BTreeMap::new();
        args.insert("name".into(), Value::from(name));
        args.insert("createdBy".into(), Value::from(created_by));
        args.insert("description".into(), Value::from(description));
        let result = self
            .client
            .mutation("software:addSoftware", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_id(result).map_err(|e| match e {
            DataError::Backend(msg) if msg.to_lowercase().contains("exist") => {
                DataError::Validation(msg)
            }
            other => other,
        })
    }

    pub async fn delete_software(&mut self, software_id: &str) -> Result<()> {
        let mut args = BTreeMap::new();
        args.insert("softwareId".into(), Value::from(software_id));
        let result = self
            .client
            .mutation("software:deleteSoftware", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_unit(result).map_err(|e| remap_not_found(e, "software", software_id))
    }

    // --- Users ---

    pub async fn get_user(&mut self, uid: &str) -> Result<Option<UserRecord>> {
        let mut args = BTreeMap::new();
        args.insert("uid".into(), Value::from(uid));
        let result = self
            .client
            .query("users:getUser", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_optional_user(result)
    }

    pub async fn list_agents(&mut self, include_inactive: bool) -> Result<Vec<UserRecord>> {
        let mut args = BTreeMap::new();
        args.insert("includeInactive".into(), Value::from(include_inactive));
        let result = self
            .client
            .query("users:listAgents", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_user_list(result)
    }

    pub async fn list_managers(&mut self) -> Result<Vec<UserRecord>> {
        let result = self
            .client
            .query("users:listManagers", BTreeMap::new())
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_user_list(result)
    }

    pub async fn update_user_stats(&mut self, uid: &str, stats: &UserStats) -> Result<()> {
        let mut args = BTreeMap::new();
        args.insert("uid".into(), Value::from(uid));
        args.insert(
            "totalReports".into(),
            Value::from(stats.total_reports as f64),
        );
        args.insert(
            "validatedReports".into(),
            Value::from(stats.validated_reports as f64),
        );
        args.insert(
            "pendingReports".into(),
            Value::from(stats.pending_reports as f64),
        );
        args.insert("totalHours".into(), Value::from(stats.total_hours));
        let result = self
            .client
            .mutation("users:updateStats", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_unit(result).map_err(|e| remap_not_found(e, "user", uid))
    }

    // --- Auth functions ---

    /// Sign in with email/password. The mutation reports failures as
    /// `auth/...` codes which map to [`AuthError`].
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<UserRecord> {
        let mut args = BTreeMap::new();
        args.insert("email".into(), Value::from(email));
        args.insert("password".into(), Value::from(password));
        let result = self
            .client
            .mutation("auth:signIn", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_optional_user(result)?
            .ok_or(DataError::Auth(AuthError::InvalidCredentials))
    }

    pub async fn sign_out(&mut self, uid: &str) -> Result<()> {
        let mut args = BTreeMap::new();
        args.insert("uid".into(), Value::from(uid));
        let result = self
            .client
            .mutation("auth:signOut", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_unit(result)
    }

    /// Ask the auth backend to dispatch a password-reset email.
    pub async fn send_password_reset(&mut self, email: &str) -> Result<()> {
        let mut args = BTreeMap::new();
        args.insert("email".into(), Value::from(email));
        let result = self
            .client
            .mutation("auth:sendPasswordReset", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_unit(result)
    }

    /// Register a new account plus its user document. Returns the uid.
    pub async fn register(&mut self, user: &NewUser) -> Result<String> {
        let mut args = BTreeMap::new();
        args.insert("email".into(), Value::from(user.email.as_str()));
        args.insert("password".into(), Value::from(user.password.as_str()));
        args.insert("fullName".into(), Value::from(user.full_name.as_str()));
        args.insert("role".into(), Value::from(user.role.to_string()));
        let result = self
            .client
            .mutation("auth:register", args)
            .await
            .map_err(|e| DataError::Backend(e.to_string()))?;
        extract_id(result)
    }
}

/// [`ReportStore`] over a shared [`RapportConvexClient`].
#[derive(Clone)]
pub struct ConvexReportStore {
    client: Arc<Mutex<RapportConvexClient>>,
}

impl ConvexReportStore {
    pub async fn connect(deployment_url: &str) -> Result<Self> {
        let client = RapportConvexClient::new(deployment_url).await?;
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
        })
    }

    pub fn client(&self) -> Arc<Mutex<RapportConvexClient>> {
        self.client.clone()
    }
}

#[async_trait]
impl ReportStore for ConvexReportStore {
    async fn create_report(&self, input: ReportInput) -> Result<String> {
        input.validate()?;
        self.client.lock().await.create_report(&input).await
    }

    async fn get_report(&self, id: &str) -> Result<ReportRecord> {
        self.client
            .lock()
            .await
            .get_report(id)
            .await?
            .ok_or_else(|| DataError::not_found("report", id))
    }

    async fn update_report(&self, id: &str, patch: ReportPatch) -> Result<()> {
        self.client.lock().await.update_report(id, &patch).await
    }

    async fn delete_report(&self, id: &str) -> Result<()> {
        self.client.lock().await.delete_report(id).await
    }

    async fn list_reports(&self, query: &ReportQuery) -> Result<Vec<ReportRecord>> {
        self.client.lock().await.list_reports(query).await
    }

    async fn subscribe_reports(&self, query: ReportQuery) -> Result<ReportSubscription> {
        let mut sub = {
            let mut client = self.client.lock().await;
            client.subscribe_reports(&query).await?
        };

        let (tx, rx) = mpsc::channel(16);
        let pump = tokio::spawn(async move {
            while let Some(result) = sub.next().await {
                let event = match result {
                    FunctionResult::Value(value) => match reports_from_value(&value) {
                        Ok(reports) => StoreEvent::Snapshot(reports),
                        Err(e) => StoreEvent::Error(e.to_string()),
                    },
                    FunctionResult::ErrorMessage(msg) => StoreEvent::Error(msg),
                    FunctionResult::ConvexError(err) => StoreEvent::Error(format!("{:?}", err)),
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(ReportSubscription::new(rx, pump))
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        self.client.lock().await.list_clients().await
    }

    async fn get_client(&self, id: &str) -> Result<ClientRecord> {
        self.client
            .lock()
            .await
            .get_client(id)
            .await?
            .ok_or_else(|| DataError::not_found("client", id))
    }

    async fn get_client_by_name(&self, name: &str) -> Result<Option<ClientRecord>> {
        self.client.lock().await.get_client_by_name(name).await
    }

    async fn add_client(&self, name: &str, created_by: &str) -> Result<String> {
        self.client.lock().await.add_client(name, created_by).await
    }

    async fn delete_client(&self, id: &str) -> Result<()> {
        self.client.lock().await.delete_client(id).await
    }

    async fn list_software(&self) -> Result<Vec<SoftwareRecord>> {
        self.client.lock().await.list_software().await
    }

    async fn get_software(&self, id: &str) -> Result<SoftwareRecord> {
        self.client
            .lock()
            .await
            .get_software(id)
            .await?
            .ok_or_else(|| DataError::not_found("software", id))
    }

    async fn get_software_by_name(&self, name: &str) -> Result<Option<SoftwareRecord>> {
        self.client.lock().await.get_software_by_name(name).await
    }

    async fn add_software(
        &self,
        name: &str,
        created_by: &str,
        description: &str,
    ) -> Result<String> {
        self.client
            .lock()
            .await
            .add_software(name, created_by, description)
            .await
    }

    async fn delete_software(&self, id: &str) -> Result<()> {
        self.client.lock().await.delete_software(id).await
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord> {
        self.client
            .lock()
            .await
            .get_user(uid)
            .await?
            .ok_or_else(|| DataError::not_found("user", uid))
    }

    async fn list_agents(&self, include_inactive: bool) -> Result<Vec<UserRecord>> {
        self.client.lock().await.list_agents(include_inactive).await
    }

    async fn list_managers(&self) -> Result<Vec<UserRecord>> {
        self.client.lock().await.list_managers().await
    }

    async fn update_user_stats(&self, uid: &str, stats: UserStats) -> Result<()> {
        self.client.lock().await.update_user_stats(uid, &stats).await
    }

    async fn check_connection(&self) -> Result<()> {
        // Cheapest read the backend serves.
        self.client.lock().await.list_managers().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ValidationFields;

    fn obj(entries: Vec<(&str, Value)>) -> BTreeMap<String, Value> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn report_extraction_normalizes_legacy_type_fields() {
        let doc = obj(vec![
            ("_id", Value::from("r-1")),
            ("agentUid", Value::from("u-1")),
            ("agentName", Value::from("Alice")),
            ("clientName", Value::from("Acme")),
            ("software", Value::from("ERP")),
            ("site", Value::from("Abidjan")),
            ("date", Value::from("2026-08-03")),
            ("object", Value::from("Install")),
            ("interventionType", Value::from("Sur site")),
            ("status", Value::from("En Cours")),
        ]);
        let report = extract_report_from_obj(&doc);
        assert_eq!(report.intervention_type, "Sur site");
        assert_eq!(report.status, ReportStatus::InProgress);
        // Absent lifecycle flags take their defaults
        assert!(!report.is_validated);
        assert!(report.can_edit);
    }

    #[test]
    fn report_extraction_prefers_canonical_type_key() {
        let doc = obj(vec![
            ("_id", Value::from("r-1")),
            ("type", Value::from("En ligne")),
            ("typeIntervention", Value::from("Sur site")),
        ]);
        let report = extract_report_from_obj(&doc);
        assert_eq!(report.intervention_type, "En ligne");
    }

    #[test]
    fn report_extraction_defaults_missing_type() {
        let doc = obj(vec![("_id", Value::from("r-1"))]);
        let report = extract_report_from_obj(&doc);
        assert_eq!(report.intervention_type, "Non spécifié");
    }

    #[test]
    fn input_args_carry_lifecycle_defaults() {
        let input = ReportInput {
            agent_uid: "u-1".into(),
            agent_name: "Alice".into(),
            client_name: "Acme".into(),
            software: "ERP".into(),
            site: "Abidjan".into(),
            object: "Install".into(),
            date: "2026-08-03".into(),
            duration_unit: Some(DurationUnit::Hours),
            hour_count: Some(2.5),
            ..Default::default()
        };
        let args = report_input_to_args(&input);
        assert_eq!(args.get("isValidated"), Some(&Value::from(false)));
        assert_eq!(args.get("canEdit"), Some(&Value::from(true)));
        assert_eq!(args.get("validatedBy"), Some(&Value::Null));
        assert_eq!(args.get("hourCount"), Some(&Value::from(2.5)));
        assert_eq!(args.get("dayCount"), Some(&Value::Null));
        assert_eq!(args.get("status"), Some(&Value::from("En cours")));
        assert_eq!(args.get("durationUnit"), Some(&Value::from("heures")));
    }

    #[test]
    fn patch_args_clear_validation_fields_with_null() {
        let patch = ReportPatch {
            validation: Some(ValidationFields {
                is_validated: false,
                validated_by: None,
                validated_by_name: None,
                validated_at: None,
                can_edit: true,
            }),
            ..Default::default()
        };
        let args = report_patch_to_args("r-1", &patch);
        assert_eq!(args.get("reportId"), Some(&Value::from("r-1")));
        assert_eq!(args.get("isValidated"), Some(&Value::from(false)));
        assert_eq!(args.get("validatedBy"), Some(&Value::Null));
        assert_eq!(args.get("canEdit"), Some(&Value::from(true)));
        // Untouched content fields stay out of the update
        assert!(!args.contains_key("object"));
    }

    #[test]
    fn query_args_skip_absent_criteria() {
        let query = ReportQuery {
            client_name: Some("Acme".into()),
            limit: Some(5),
            ..Default::default()
        };
        let args = report_query_to_args(&query);
        assert_eq!(args.get("clientName"), Some(&Value::from("Acme")));
        assert_eq!(args.get("limit"), Some(&Value::from(5.0)));
        assert!(!args.contains_key("agentUid"));
        assert!(!args.contains_key("dateStart"));
    }

    #[test]
    fn convex_error_classification() {
        assert!(matches!(
            convex_error("permission denied by rules"),
            DataError::PermissionDenied(_)
        ));
        assert!(matches!(
            convex_error("auth/wrong-password"),
            DataError::Auth(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            convex_error("deployment unreachable"),
            DataError::Backend(_)
        ));
        assert!(matches!(
            remap_not_found(
                DataError::Backend("report not found".into()),
                "report",
                "r-9"
            ),
            DataError::NotFound { .. }
        ));
    }
}
