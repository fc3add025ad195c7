//! In-memory filter engine for the dashboard's visible report set.

use serde::{Deserialize, Serialize};

use rapport_data::ReportRecord;

/// Display filters. All criteria are AND-combined; an absent (or empty)
/// criterion matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Case-insensitive substring of the agent name.
    pub agent: Option<String>,
    /// Case-insensitive substring of the client name.
    pub client: Option<String>,
    /// Case-insensitive substring matched against each intervention-type tag.
    pub kind: Option<String>,
    /// Inclusive ISO-date lower bound (lexicographic).
    pub date_start: Option<String>,
    /// Inclusive ISO-date upper bound.
    pub date_end: Option<String>,
}

fn active(criterion: &Option<String>) -> Option<&str> {
    criterion.as_deref().filter(|s| !s.trim().is_empty())
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        active(&self.agent).is_none()
            && active(&self.client).is_none()
            && active(&self.kind).is_none()
            && active(&self.date_start).is_none()
            && active(&self.date_end).is_none()
    }

    pub fn matches(&self, report: &ReportRecord) -> bool {
        if let Some(agent) = active(&self.agent) {
            if !report
                .agent_name
                .to_lowercase()
                .contains(&agent.to_lowercase())
            {
                return false;
            }
        }
        if let Some(client) = active(&self.client) {
            if !report
                .client_name
                .to_lowercase()
                .contains(&client.to_lowercase())
            {
                return false;
            }
        }
        if let Some(kind) = active(&self.kind) {
            let needle = kind.to_lowercase();
            if !report
                .type_tags()
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        if let Some(start) = active(&self.date_start) {
            if report.date.as_str() < start {
                return false;
            }
        }
        if let Some(end) = active(&self.date_end) {
            if report.date.as_str() > end {
                return false;
            }
        }
        true
    }
}

/// Filter a report set. Pure: input order is preserved, the input is never
/// mutated, and the same input always yields the same output.
pub fn filter_reports(reports: &[ReportRecord], criteria: &FilterCriteria) -> Vec<ReportRecord> {
    reports
        .iter()
        .filter(|r| criteria.matches(r))
        .cloned()
        .collect()
}
