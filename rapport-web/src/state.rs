use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use rapport_core::ValidationPolicy;
use rapport_data::{ReportQuery, ReportRecord, ReportStore};

/// Shared application state accessible by all handlers.
///
/// The report cache is a full snapshot of the collection: every refresh
/// (from a mutation or from the realtime subscription) replaces it
/// wholesale. The store and policy are injected at construction; there is
/// no ambient global state.
pub struct AppState {
    store: Arc<dyn ReportStore>,
    reports: RwLock<Vec<ReportRecord>>,
    update_tx: broadcast::Sender<()>,
    policy: ValidationPolicy,
}

impl AppState {
    pub fn new(store: Arc<dyn ReportStore>, policy: ValidationPolicy) -> Arc<Self> {
        let (update_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            store,
            reports: RwLock::new(Vec::new()),
            update_tx,
            policy,
        })
    }

    pub fn store(&self) -> &dyn ReportStore {
        self.store.as_ref()
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Get a snapshot of the cached report set.
    pub async fn get_reports(&self) -> Vec<ReportRecord> {
        self.reports.read().await.clone()
    }

    /// Replace the cached set wholesale and notify subscribers.
    pub async fn replace_reports(&self, reports: Vec<ReportRecord>) {
        *self.reports.write().await = reports;
        let _ = self.update_tx.send(());
    }

    /// Re-query the store and refresh the cache.
    pub async fn reload(&self) {
        match self.store.list_reports(&ReportQuery::default()).await {
            Ok(reports) => self.replace_reports(reports).await,
            Err(e) => tracing::warn!(error = %e, "report reload failed"),
        }
    }

    /// Subscribe to update notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.update_tx.subscribe()
    }
}
