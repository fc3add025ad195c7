use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Responsable,
    Admin,
}

impl Role {
    /// Managers review, validate and administer; agents only author reports.
    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Responsable | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Agent => write!(f, "agent"),
            Role::Responsable => write!(f, "responsable"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = DataError;

    /// Accepts the historical manager spellings found in stored documents.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "agent" => Ok(Role::Agent),
            "responsable" | "manager" | "responsableit" | "superviseur" => Ok(Role::Responsable),
            "admin" => Ok(Role::Admin),
            other => Err(DataError::Validation(format!("unknown role: {}", other))),
        }
    }
}

/// Report lifecycle status. Wire values are the French strings the
/// collection has always stored; free-form input is normalized at the
/// adapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum ReportStatus {
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "En attente")]
    Pending,
    #[serde(rename = "Terminé")]
    Done,
    #[serde(rename = "Annulé")]
    Cancelled,
}

impl ReportStatus {
    /// Normalize a free-form status string. Stored documents disagree on
    /// casing ("En cours" vs "En Cours"); unknown or empty values fall back
    /// to Done, matching the historical display default.
    pub fn normalize(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "en cours" | "in progress" => ReportStatus::InProgress,
            "en attente" | "pending" => ReportStatus::Pending,
            "annulé" | "annule" | "cancelled" => ReportStatus::Cancelled,
            _ => ReportStatus::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::InProgress => "En cours",
            ReportStatus::Pending => "En attente",
            ReportStatus::Done => "Terminé",
            ReportStatus::Cancelled => "Annulé",
        }
    }
}

impl From<String> for ReportStatus {
    fn from(s: String) -> Self {
        ReportStatus::normalize(&s)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Duration unit for a report. Exactly one of `hour_count` / `day_count`
/// is set on a record, matching this unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationUnit {
    #[serde(rename = "heures")]
    Hours,
    #[serde(rename = "jours")]
    Days,
}

impl std::fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationUnit::Hours => write!(f, "heures"),
            DurationUnit::Days => write!(f, "jours"),
        }
    }
}

impl std::str::FromStr for DurationUnit {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "heure" | "heures" | "hour" | "hours" => Ok(DurationUnit::Hours),
            "jour" | "jours" | "day" | "days" => Ok(DurationUnit::Days),
            other => Err(DataError::Validation(format!(
                "unknown duration unit: {}",
                other
            ))),
        }
    }
}

/// Check the duration-field invariant: the count matching the unit is set
/// and positive, the other count is absent, and both are absent when the
/// unit is absent.
pub fn check_duration_fields(
    unit: Option<DurationUnit>,
    hour_count: Option<f64>,
    day_count: Option<f64>,
) -> Result<()> {
    match unit {
        Some(DurationUnit::Hours) => match (hour_count, day_count) {
            (Some(h), None) if h > 0.0 => Ok(()),
            _ => Err(DataError::Validation(
                "duration in hours requires a positive hour count and no day count".to_string(),
            )),
        },
        Some(DurationUnit::Days) => match (hour_count, day_count) {
            (None, Some(d)) if d > 0.0 => Ok(()),
            _ => Err(DataError::Validation(
                "duration in days requires a positive day count and no hour count".to_string(),
            )),
        },
        None => match (hour_count, day_count) {
            (None, None) => Ok(()),
            _ => Err(DataError::Validation(
                "duration counts require a duration unit".to_string(),
            )),
        },
    }
}

/// Canonical report record as read from the `reports` collection.
///
/// Field-name normalization (`type` / `interventionType` / legacy status
/// spellings) happens once in the store adapter; consumers only ever see
/// this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    pub agent_uid: String,
    pub agent_name: String,
    pub client_id: Option<String>,
    pub client_name: String,
    pub software_id: Option<String>,
    pub software: String,
    pub site: String,
    pub interlocutor: String,
    pub contact: String,
    pub intervention_type: String,
    pub object: String,
    pub technical_details: String,
    /// Intervention date, ISO `YYYY-MM-DD`. Compared lexicographically.
    pub date: String,
    pub duration: String,
    pub duration_unit: Option<DurationUnit>,
    pub hour_count: Option<f64>,
    pub day_count: Option<f64>,
    pub status: ReportStatus,
    pub is_validated: bool,
    pub validated_by: Option<String>,
    pub validated_by_name: Option<String>,
    pub validated_at: Option<String>,
    pub can_edit: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ReportRecord {
    /// Split the comma-joined intervention type into individual tags.
    pub fn type_tags(&self) -> Vec<&str> {
        self.intervention_type
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Creation payload for a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportInput {
    pub agent_uid: String,
    pub agent_name: String,
    pub client_id: Option<String>,
    pub client_name: String,
    pub software_id: Option<String>,
    pub software: String,
    pub site: String,
    pub interlocutor: Option<String>,
    pub contact: Option<String>,
    pub intervention_type: Option<String>,
    pub object: String,
    pub technical_details: Option<String>,
    pub date: String,
    pub duration: Option<String>,
    pub duration_unit: Option<DurationUnit>,
    pub hour_count: Option<f64>,
    pub day_count: Option<f64>,
    pub status: Option<ReportStatus>,
}

impl ReportInput {
    /// Check required fields and the duration invariant.
    pub fn validate(&self) -> Result<()> {
        let required: [(&str, &str); 7] = [
            ("agent_uid", self.agent_uid.as_str()),
            ("agent_name", self.agent_name.as_str()),
            ("client_name", self.client_name.as_str()),
            ("date", self.date.as_str()),
            ("site", self.site.as_str()),
            ("software", self.software.as_str()),
            ("object", self.object.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(DataError::MissingField(name.to_string()));
            }
        }
        check_duration_fields(self.duration_unit, self.hour_count, self.day_count)
    }

    /// Duration display text: the provided string, a rendering of the
    /// unit/count pair, or the historical "Non spécifié" placeholder.
    pub fn duration_display(&self) -> String {
        if let Some(ref d) = self.duration {
            if !d.trim().is_empty() {
                return d.clone();
            }
        }
        match (self.duration_unit, self.hour_count, self.day_count) {
            (Some(DurationUnit::Hours), Some(h), _) => format!("{} heures", h),
            (Some(DurationUnit::Days), _, Some(d)) => format!("{} jours", d),
            _ => "Non spécifié".to_string(),
        }
    }

    /// Build the persisted record with lifecycle defaults applied.
    /// `created_at` is the server-assigned timestamp (both audit fields
    /// start equal).
    pub fn into_record(self, id: String, created_at: String) -> ReportRecord {
        let duration = self.duration_display();
        ReportRecord {
            id,
            agent_uid: self.agent_uid,
            agent_name: self.agent_name,
            client_id: self.client_id,
            client_name: self.client_name,
            software_id: self.software_id,
            software: self.software,
            site: self.site,
            interlocutor: non_empty_or(self.interlocutor, "Non spécifié"),
            contact: non_empty_or(self.contact, "Non spécifié"),
            intervention_type: non_empty_or(self.intervention_type, "Non spécifié"),
            object: self.object,
            technical_details: self.technical_details.unwrap_or_default(),
            date: self.date,
            duration,
            duration_unit: self.duration_unit,
            hour_count: self.hour_count,
            day_count: self.day_count,
            status: self.status.unwrap_or(ReportStatus::InProgress),
            is_validated: false,
            validated_by: None,
            validated_by_name: None,
            validated_at: None,
            can_edit: true,
            updated_at: created_at.clone(),
            created_at,
        }
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => default.to_string(),
    }
}

/// Contact metadata attached to a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub contact_person: String,
}

/// Client reference entity. Reports reference clients by denormalized
/// name, not by id; the store enforces no referential integrity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub created_by: String,
    pub is_active: bool,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Software reference entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftwareRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub vendor: String,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Denormalized per-user counters. Best effort only; not transactionally
/// consistent with report mutations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    pub total_reports: u32,
    pub validated_reports: u32,
    pub pending_reports: u32,
    pub total_hours: f64,
}

/// User record from the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(default)]
    pub stats: UserStats,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Registration payload for the auth adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}
