use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{DataError, Result};
use crate::types::{
    ClientRecord, DurationUnit, ReportInput, ReportRecord, ReportStatus, SoftwareRecord,
    UserRecord, UserStats,
};

/// Equality/range predicates for the `reports` collection.
///
/// All criteria are AND-combined; an absent criterion matches everything.
/// Results are ordered by `created_at` descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportQuery {
    pub agent_uid: Option<String>,
    pub agent_name: Option<String>,
    pub client_name: Option<String>,
    pub software: Option<String>,
    pub status: Option<ReportStatus>,
    pub is_validated: Option<bool>,
    /// Inclusive lower bound on the report date (lexicographic ISO compare).
    pub date_start: Option<String>,
    /// Inclusive upper bound on the report date.
    pub date_end: Option<String>,
    pub limit: Option<usize>,
}

impl ReportQuery {
    pub fn matches(&self, report: &ReportRecord) -> bool {
        if let Some(ref uid) = self.agent_uid {
            if &report.agent_uid != uid {
                return false;
            }
        }
        if let Some(ref name) = self.agent_name {
            if &report.agent_name != name {
                return false;
            }
        }
        if let Some(ref client) = self.client_name {
            if &report.client_name != client {
                return false;
            }
        }
        if let Some(ref software) = self.software {
            if &report.software != software {
                return false;
            }
        }
        if let Some(status) = self.status {
            if report.status != status {
                return false;
            }
        }
        if let Some(validated) = self.is_validated {
            if report.is_validated != validated {
                return false;
            }
        }
        if let Some(ref start) = self.date_start {
            if report.date.as_str() < start.as_str() {
                return false;
            }
        }
        if let Some(ref end) = self.date_end {
            if report.date.as_str() > end.as_str() {
                return false;
            }
        }
        true
    }
}

/// The validation field group. It changes as a unit: a partial update
/// either leaves validation state alone or replaces all five fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFields {
    pub is_validated: bool,
    pub validated_by: Option<String>,
    pub validated_by_name: Option<String>,
    pub validated_at: Option<String>,
    pub can_edit: bool,
}

/// Partial update for a report. `agent_uid` is deliberately absent:
/// ownership never changes after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportPatch {
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub software_id: Option<String>,
    pub software: Option<String>,
    pub site: Option<String>,
    pub interlocutor: Option<String>,
    pub contact: Option<String>,
    pub intervention_type: Option<String>,
    pub object: Option<String>,
    pub technical_details: Option<String>,
    pub date: Option<String>,
    pub duration: Option<String>,
    pub duration_unit: Option<DurationUnit>,
    pub hour_count: Option<f64>,
    pub day_count: Option<f64>,
    pub status: Option<ReportStatus>,
    pub validation: Option<ValidationFields>,
}

impl ReportPatch {
    pub fn is_empty(&self) -> bool {
        self.client_id.is_none()
            && self.client_name.is_none()
            && self.software_id.is_none()
            && self.software.is_none()
            && self.site.is_none()
            && self.interlocutor.is_none()
            && self.contact.is_none()
            && self.intervention_type.is_none()
            && self.object.is_none()
            && self.technical_details.is_none()
            && self.date.is_none()
            && self.duration.is_none()
            && self.duration_unit.is_none()
            && self.hour_count.is_none()
            && self.day_count.is_none()
            && self.status.is_none()
            && self.validation.is_none()
    }

    /// Apply the patch to a record in place. Does not touch `updated_at`;
    /// timestamp stamping belongs to the store.
    pub fn apply(&self, report: &mut ReportRecord) {
        if let Some(ref v) = self.client_id {
            report.client_id = Some(v.clone());
        }
        if let Some(ref v) = self.client_name {
            report.client_name = v.clone();
        }
        if let Some(ref v) = self.software_id {
            report.software_id = Some(v.clone());
        }
        if let Some(ref v) = self.software {
            report.software = v.clone();
        }
        if let Some(ref v) = self.site {
            report.site = v.clone();
        }
        if let Some(ref v) = self.interlocutor {
            report.interlocutor = v.clone();
        }
        if let Some(ref v) = self.contact {
            report.contact = v.clone();
        }
        if let Some(ref v) = self.intervention_type {
            report.intervention_type = v.clone();
        }
        if let Some(ref v) = self.object {
            report.object = v.clone();
        }
        if let Some(ref v) = self.technical_details {
            report.technical_details = v.clone();
        }
        if let Some(ref v) = self.date {
            report.date = v.clone();
        }
        if let Some(ref v) = self.duration {
            report.duration = v.clone();
        }
        if let Some(v) = self.duration_unit {
            report.duration_unit = Some(v);
        }
        if let Some(v) = self.hour_count {
            report.hour_count = Some(v);
        }
        if let Some(v) = self.day_count {
            report.day_count = Some(v);
        }
        if let Some(v) = self.status {
            report.status = v;
        }
        if let Some(ref v) = self.validation {
            report.is_validated = v.is_validated;
            report.validated_by = v.validated_by.clone();
            report.validated_by_name = v.validated_by_name.clone();
            report.validated_at = v.validated_at.clone();
            report.can_edit = v.can_edit;
        }
    }
}

/// Event delivered to a report subscription.
///
/// Every snapshot is the full current matching set; consumers replace
/// their in-memory view wholesale. Transport errors arrive as events on
/// the same channel rather than tearing the subscription down.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Snapshot(Vec<ReportRecord>),
    Error(String),
}

/// A live subscription to the report collection.
///
/// Dropping the handle (or calling [`cancel`](Self::cancel), which is
/// idempotent) detaches from the underlying change feed.
pub struct ReportSubscription {
    rx: mpsc::Receiver<StoreEvent>,
    pump: Option<JoinHandle<()>>,
}

impl ReportSubscription {
    pub fn new(rx: mpsc::Receiver<StoreEvent>, pump: JoinHandle<()>) -> Self {
        Self {
            rx,
            pump: Some(pump),
        }
    }

    /// Wait for the next snapshot or error. Returns `None` once cancelled
    /// or after the feed ends.
    pub async fn next_event(&mut self) -> Option<StoreEvent> {
        self.rx.recv().await
    }

    /// Stop receiving events. Constant-time; safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.rx.close();
    }
}

impl Drop for ReportSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// CRUD + query + subscribe operations over the hosted collections
/// (`reports`, `clients`, `software`, `users`).
///
/// Implementations: [`crate::ConvexReportStore`] (hosted backend) and
/// [`crate::MemoryReportStore`] (tests and local runs). Mutations are
/// last-write-wins; nothing here is transactional.
#[async_trait]
pub trait ReportStore: Send + Sync {
    // --- Reports ---

    /// Validate and persist a new report. Returns the assigned id.
    async fn create_report(&self, input: ReportInput) -> Result<String>;

    async fn get_report(&self, id: &str) -> Result<ReportRecord>;

    /// Apply a partial update. Always bumps `updated_at`.
    async fn update_report(&self, id: &str, patch: ReportPatch) -> Result<()>;

    /// Irreversible.
    async fn delete_report(&self, id: &str) -> Result<()>;

    async fn list_reports(&self, query: &ReportQuery) -> Result<Vec<ReportRecord>>;

    /// Subscribe to the matching set. The first event is the current
    /// snapshot; every subsequent change to the collection delivers a
    /// fresh full snapshot.
    async fn subscribe_reports(&self, query: ReportQuery) -> Result<ReportSubscription>;

    // --- Clients ---

    async fn list_clients(&self) -> Result<Vec<ClientRecord>>;
    async fn get_client(&self, id: &str) -> Result<ClientRecord>;
    async fn get_client_by_name(&self, name: &str) -> Result<Option<ClientRecord>>;
    /// Rejects duplicate names.
    async fn add_client(&self, name: &str, created_by: &str) -> Result<String>;
    async fn delete_client(&self, id: &str) -> Result<()>;

    // --- Software ---

    async fn list_software(&self) -> Result<Vec<SoftwareRecord>>;
    async fn get_software(&self, id: &str) -> Result<SoftwareRecord>;
    async fn get_software_by_name(&self, name: &str) -> Result<Option<SoftwareRecord>>;
    async fn add_software(&self, name: &str, created_by: &str, description: &str)
        -> Result<String>;
    async fn delete_software(&self, id: &str) -> Result<()>;

    // --- Users ---

    async fn get_user(&self, uid: &str) -> Result<UserRecord>;
    async fn list_agents(&self, include_inactive: bool) -> Result<Vec<UserRecord>>;
    async fn list_managers(&self) -> Result<Vec<UserRecord>>;
    async fn update_user_stats(&self, uid: &str, stats: UserStats) -> Result<()>;

    /// Cheap reachability probe against the backend.
    async fn check_connection(&self) -> Result<()>;

    // --- Reference checks ---

    /// Delete a client unless a report still references it by name.
    ///
    /// The scan is advisory only: a report created between the check and
    /// the delete slips through. The backing store offers no transaction
    /// to close that window.
    async fn delete_client_checked(&self, id: &str) -> Result<()> {
        let client = self.get_client(id).await?;
        let q = ReportQuery {
            client_name: Some(client.name.clone()),
            limit: Some(1),
            ..Default::default()
        };
        if !self.list_reports(&q).await?.is_empty() {
            return Err(DataError::ResourceInUse {
                what: "client",
                name: client.name,
            });
        }
        self.delete_client(id).await
    }

    /// Delete a software entry unless a report still references it by
    /// name. Same advisory caveat as [`delete_client_checked`](Self::delete_client_checked).
    async fn delete_software_checked(&self, id: &str) -> Result<()> {
        let software = self.get_software(id).await?;
        let q = ReportQuery {
            software: Some(software.name.clone()),
            limit: Some(1),
            ..Default::default()
        };
        if !self.list_reports(&q).await?.is_empty() {
            return Err(DataError::ResourceInUse {
                what: "software",
                name: software.name,
            });
        }
        self.delete_software(id).await
    }
}
