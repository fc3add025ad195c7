//! Mail-compose deep links for sharing a single report.
//!
//! No email is sent server-side; the link opens the user's own mail
//! client pre-filled with the report summary.

use serde::Serialize;

use rapport_data::ReportRecord;

#[derive(Debug, Clone, Serialize)]
pub struct MailtoLink {
    pub subject: String,
    pub body: String,
    pub href: String,
}

/// Build the pre-filled compose link for a report. A validated report is
/// announced as "Validé" regardless of its workflow status.
pub fn report_email(report: &ReportRecord, sender_name: &str) -> MailtoLink {
    let subject = format!(
        "Rapport d'intervention - {} - {}",
        report.client_name, report.date
    );

    let status_line = if report.is_validated {
        "Validé".to_string()
    } else {
        report.status.to_string()
    };

    let body = format!(
        "Bonjour,\n\n\
         Vous trouverez ci-dessous le rapport d'intervention technique :\n\n\
         Agent: {}\n\
         Client: {}\n\
         Date: {}\n\
         Type d'intervention: {}\n\
         Durée: {}\n\
         Statut: {}\n\n\
         Objet de la mission:\n{}\n\n\
         Cordialement,\n{}",
        report.agent_name,
        report.client_name,
        report.date,
        report.intervention_type,
        report.duration,
        status_line,
        report.object,
        sender_name,
    );

    let href = format!(
        "mailto:?subject={}&body={}",
        urlencoding::encode(&subject),
        urlencoding::encode(&body)
    );

    MailtoLink {
        subject,
        body,
        href,
    }
}
