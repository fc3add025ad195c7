//! In-memory report store.
//!
//! Keeps every collection in a `BTreeMap` behind an `RwLock`. Nothing is
//! persistent; use it for tests and for local runs without a configured
//! backend. Subscriptions receive the same full-snapshot feed the hosted
//! backend delivers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::error::{DataError, Result};
use crate::store::{ReportPatch, ReportQuery, ReportStore, ReportSubscription, StoreEvent};
use crate::types::{
    ClientRecord, ContactInfo, ReportInput, ReportRecord, SoftwareRecord, UserRecord, UserStats,
};

#[derive(Default)]
struct Collections {
    reports: BTreeMap<String, ReportRecord>,
    clients: BTreeMap<String, ClientRecord>,
    software: BTreeMap<String, SoftwareRecord>,
    users: BTreeMap<String, UserRecord>,
}

/// Thread-safe in-memory backend implementing [`ReportStore`].
#[derive(Clone)]
pub struct MemoryReportStore {
    inner: Arc<RwLock<Collections>>,
    changed: broadcast::Sender<()>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        let (changed, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(RwLock::new(Collections::default())),
            changed,
        }
    }

    /// Insert or replace a user record (registration is otherwise the auth
    /// adapter's job; this seeds local runs and tests).
    pub async fn upsert_user(&self, user: UserRecord) {
        self.inner.write().await.users.insert(user.uid.clone(), user);
    }

    fn notify(&self) {
        let _ = self.changed.send(());
    }

    fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter, order (`created_at` descending) and limit a report set.
fn select_reports(reports: &BTreeMap<String, ReportRecord>, query: &ReportQuery) -> Vec<ReportRecord> {
    let mut matched: Vec<ReportRecord> = reports
        .values()
        .filter(|r| query.matches(r))
        .cloned()
        .collect();
    matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }
    matched
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create_report(&self, input: ReportInput) -> Result<String> {
        input.validate()?;
        let id = Self::new_id();
        let record = input.into_record(id.clone(), Self::now());
        self.inner.write().await.reports.insert(id.clone(), record);
        self.notify();
        Ok(id)
    }

    async fn get_report(&self, id: &str) -> Result<ReportRecord> {
        self.inner
            .read()
            .await
            .reports
            .get(id)
            .cloned()
            .ok_or_else(|| DataError::not_found("report", id))
    }

    async fn update_report(&self, id: &str, patch: ReportPatch) -> Result<()> {
        let mut inner = self.inner.write().await;
        let report = inner
            .reports
            .get_mut(id)
            .ok_or_else(|| DataError::not_found("report", id))?;
        patch.apply(report);
        report.updated_at = Self::now();
        drop(inner);
        self.notify();
        Ok(())
    }

    async fn delete_report(&self, id: &str) -> Result<()> {
        let removed = self.inner.write().await.reports.remove(id);
        if removed.is_none() {
            return Err(DataError::not_found("report", id));
        }
        self.notify();
        Ok(())
    }

    async fn list_reports(&self, query: &ReportQuery) -> Result<Vec<ReportRecord>> {
        Ok(select_reports(&self.inner.read().await.reports, query))
    }

    async fn subscribe_reports(&self, query: ReportQuery) -> Result<ReportSubscription> {
        let (tx, rx) = mpsc::channel(16);
        let inner = self.inner.clone();
        let mut changed = self.changed.subscribe();

        let pump = tokio::spawn(async move {
            // Current matching set first, then a fresh snapshot per change.
            let snapshot = select_reports(&inner.read().await.reports, &query);
            if tx.send(StoreEvent::Snapshot(snapshot)).await.is_err() {
                return;
            }
            loop {
                match changed.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let snapshot = select_reports(&inner.read().await.reports, &query);
                        if tx.send(StoreEvent::Snapshot(snapshot)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(ReportSubscription::new(rx, pump))
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        let mut clients: Vec<ClientRecord> =
            self.inner.read().await.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }

    async fn get_client(&self, id: &str) -> Result<ClientRecord> {
        self.inner
            .read()
            .await
            .clients
            .get(id)
            .cloned()
            .ok_or_else(|| DataError::not_found("client", id))
    }

    async fn get_client_by_name(&self, name: &str) -> Result<Option<ClientRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .clients
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn add_client(&self, name: &str, created_by: &str) -> Result<String> {
        if name.trim().is_empty() {
            return Err(DataError::MissingField("name".to_string()));
        }
        let mut inner = self.inner.write().await;
        if inner.clients.values().any(|c| c.name == name) {
            return Err(DataError::Validation(format!(
                "client '{}' already exists",
                name
            )));
        }
        let id = Self::new_id();
        let now = Self::now();
        inner.clients.insert(
            id.clone(),
            ClientRecord {
                id: id.clone(),
                name: name.to_string(),
                created_by: created_by.to_string(),
                is_active: true,
                contact: ContactInfo::default(),
                notes: String::new(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn delete_client(&self, id: &str) -> Result<()> {
        if self.inner.write().await.clients.remove(id).is_none() {
            return Err(DataError::not_found("client", id));
        }
        Ok(())
    }

    async fn list_software(&self) -> Result<Vec<SoftwareRecord>> {
        let mut software: Vec<SoftwareRecord> =
            self.inner.read().await.software.values().cloned().collect();
        software.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(software)
    }

    async fn get_software(&self, id: &str) -> Result<SoftwareRecord> {
        self.inner
            .read()
            .await
            .software
            .get(id)
            .cloned()
            .ok_or_else(|| DataError::not_found("software", id))
    }

    async fn get_software_by_name(&self, name: &str) -> Result<Option<SoftwareRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .software
            .values()
            .find(|s| s.name == name)
            .cloned())
    }

    async fn add_software(
        &self,
        name: &str,
        created_by: &str,
        description: &str,
    ) -> Result<String> {
        if name.trim().is_empty() {
            return Err(DataError::MissingField("name".to_string()));
        }
        let mut inner = self.inner.write().await;
        if inner.software.values().any(|s| s.name == name) {
            return Err(DataError::Validation(format!(
                "software '{}' already exists",
                name
            )));
        }
        let id = Self::new_id();
        let now = Self::now();
        inner.software.insert(
            id.clone(),
            SoftwareRecord {
                id: id.clone(),
                name: name.to_string(),
                description: description.to_string(),
                version: "1.0".to_string(),
                category: "Général".to_string(),
                vendor: String::new(),
                is_active: true,
                created_by: created_by.to_string(),
                created_at: now.clone(),
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn delete_software(&self, id: &str) -> Result<()> {
        if self.inner.write().await.software.remove(id).is_none() {
            return Err(DataError::not_found("software", id));
        }
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord> {
        self.inner
            .read()
            .await
            .users
            .get(uid)
            .cloned()
            .ok_or_else(|| DataError::not_found("user", uid))
    }

    async fn list_agents(&self, include_inactive: bool) -> Result<Vec<UserRecord>> {
        let mut agents: Vec<UserRecord> = self
            .inner
            .read()
            .await
            .users
            .values()
            .filter(|u| !u.role.is_manager() && (include_inactive || u.is_active))
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(agents)
    }

    async fn list_managers(&self) -> Result<Vec<UserRecord>> {
        let mut managers: Vec<UserRecord> = self
            .inner
            .read()
            .await
            .users
            .values()
            .filter(|u| u.role.is_manager() && u.is_active)
            .cloned()
            .collect();
        managers.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(managers)
    }

    async fn update_user_stats(&self, uid: &str, stats: UserStats) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(uid)
            .ok_or_else(|| DataError::not_found("user", uid))?;
        user.stats = stats;
        user.updated_at = Self::now();
        Ok(())
    }

    async fn check_connection(&self) -> Result<()> {
        Ok(())
    }
}
