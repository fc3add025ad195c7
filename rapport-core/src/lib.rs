//! Report Lifecycle & Aggregation Service
//!
//! The one shared implementation of the domain logic both dashboards need:
//! the validation state machine, the in-memory filter engine, the
//! statistics aggregator, data export, and the mail-compose link builder.
//! Everything here is pure or store-parameterized; no ambient state.

pub mod capabilities;
pub mod export;
pub mod filter;
pub mod lifecycle;
pub mod mail;
pub mod stats;

pub use capabilities::RoleCapabilities;
pub use export::{export_reports, ExportFile, ExportFormat};
pub use filter::{filter_reports, FilterCriteria};
pub use lifecycle::{
    batch_validate, edit_report, ensure_editable, unvalidate_report, validate_report,
    BatchOutcome, ValidationPolicy,
};
pub use mail::{report_email, MailtoLink};
pub use stats::{aggregate, percentage, top_n, Stats};
