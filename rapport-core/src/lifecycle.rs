//! Validation state machine.
//!
//! A report moves between two lifecycle states: draft (`is_validated =
//! false`, editable) and validated. Transitions are expressed as
//! [`ReportPatch`]es so the same logic drives both store backends.

use chrono::{DateTime, Utc};
use tracing::warn;

use rapport_data::types::check_duration_fields;
use rapport_data::{
    DataError, ReportPatch, ReportRecord, ReportStatus, ReportStore, Result, ValidationFields,
};

/// Whether validating a report locks it against further agent edits.
///
/// The two historical dashboards disagreed on this, so it is a deployment
/// choice rather than a hard rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Validation freezes the report (`can_edit = false`).
    #[default]
    LockOnValidate,
    /// Validation marks the report reviewed but leaves it editable.
    KeepEditable,
}

impl std::str::FromStr for ValidationPolicy {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lock" | "lock_on_validate" => Ok(ValidationPolicy::LockOnValidate),
            "keep" | "keep_editable" => Ok(ValidationPolicy::KeepEditable),
            other => Err(DataError::Validation(format!(
                "unknown validation policy: {}",
                other
            ))),
        }
    }
}

/// Validate a report. Only completed drafts are eligible.
pub fn validate_report(
    report: &ReportRecord,
    manager_uid: &str,
    manager_name: &str,
    now: DateTime<Utc>,
    policy: ValidationPolicy,
) -> Result<ReportPatch> {
    if report.is_validated {
        return Err(DataError::Validation(format!(
            "report '{}' is already validated",
            report.id
        )));
    }
    if report.status != ReportStatus::Done {
        return Err(DataError::Validation(format!(
            "only completed reports can be validated (status: {})",
            report.status
        )));
    }
    Ok(ReportPatch {
        validation: Some(ValidationFields {
            is_validated: true,
            validated_by: Some(manager_uid.to_string()),
            validated_by_name: Some(manager_name.to_string()),
            validated_at: Some(now.to_rfc3339()),
            can_edit: matches!(policy, ValidationPolicy::KeepEditable),
        }),
        ..Default::default()
    })
}

/// Revert a report to draft: clears the validation fields and restores
/// editability. Safe to apply regardless of current state.
pub fn unvalidate_report(_report: &ReportRecord) -> ReportPatch {
    ReportPatch {
        validation: Some(ValidationFields {
            is_validated: false,
            validated_by: None,
            validated_by_name: None,
            validated_at: None,
            can_edit: true,
        }),
        ..Default::default()
    }
}

/// Reject mutations on a locked report.
pub fn ensure_editable(report: &ReportRecord) -> Result<()> {
    if report.can_edit {
        Ok(())
    } else {
        Err(DataError::EditForbidden(report.id.clone()))
    }
}

/// Check that a content edit is allowed and leaves the record consistent.
/// Validation-state changes go through [`validate_report`] /
/// [`unvalidate_report`], never through a content edit.
pub fn edit_report(report: &ReportRecord, patch: &ReportPatch) -> Result<()> {
    ensure_editable(report)?;
    if patch.validation.is_some() {
        return Err(DataError::Validation(
            "validation state cannot be changed through an edit".to_string(),
        ));
    }
    let mut preview = report.clone();
    patch.apply(&mut preview);
    check_duration_fields(preview.duration_unit, preview.hour_count, preview.day_count)
}

/// Outcome of a best-effort batch validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub validated: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// Validate every eligible draft in `reports`. Per-item failures are
/// logged and counted without aborting the batch; prior successes stand.
pub async fn batch_validate(
    store: &dyn ReportStore,
    reports: &[ReportRecord],
    manager_uid: &str,
    manager_name: &str,
    now: DateTime<Utc>,
    policy: ValidationPolicy,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for report in reports {
        if report.is_validated || report.status != ReportStatus::Done {
            outcome.skipped += 1;
            continue;
        }
        let patch = match validate_report(report, manager_uid, manager_name, now, policy) {
            Ok(patch) => patch,
            Err(e) => {
                warn!(report = %report.id, error = %e, "batch validation skipped report");
                outcome.skipped += 1;
                continue;
            }
        };
        match store.update_report(&report.id, patch).await {
            Ok(()) => outcome.validated += 1,
            Err(e) => {
                warn!(report = %report.id, error = %e, "batch validation failed");
                outcome.failed += 1;
            }
        }
    }

    outcome
}
