//! Shared data layer for Rapport intervention reporting
//!
//! This crate provides the canonical record types, the error taxonomy,
//! and the report store: a typed client over the hosted Convex backend
//! plus an in-memory backend for tests and local runs. Used by both
//! rapport-core (lifecycle/aggregation logic) and rapport-web (dashboard).

pub mod auth;
pub mod convex_client;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use auth::AuthClient;
pub use convex_client::{ConvexReportStore, RapportConvexClient};
pub use error::{AuthError, DataError, Result};
pub use memory::MemoryReportStore;
pub use store::{
    ReportPatch, ReportQuery, ReportStore, ReportSubscription, StoreEvent, ValidationFields,
};
pub use types::{
    ClientRecord, ContactInfo, DurationUnit, NewUser, ReportInput, ReportRecord, ReportStatus,
    Role, SoftwareRecord, UserRecord, UserStats,
};
