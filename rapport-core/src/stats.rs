//! Statistics aggregator.
//!
//! Pure computation over a report set. The clock is caller-supplied so
//! time-window results are reproducible in tests.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;

use rapport_data::{ReportRecord, ReportStatus};

/// Derived metrics for a report set.
///
/// `weekly` is a Monday→Sunday histogram of report dates falling inside
/// the calendar week of the supplied clock.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub total: u64,
    /// Reports dated within the trailing 7 days.
    pub week_count: u64,
    /// Reports dated within the trailing 30 days.
    pub month_count: u64,
    /// Reports still in progress.
    pub pending_count: u64,
    pub validated_count: u64,
    pub total_hours: f64,
    pub by_agent: BTreeMap<String, u64>,
    pub by_client: BTreeMap<String, u64>,
    pub by_software: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
    pub weekly: [u64; 7],
}

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(heure|jour)").unwrap())
}

/// Parse a duration display string ("2.5 heures", "1 jour") into hours.
/// A day counts as 8 working hours. Unparseable strings contribute zero.
pub fn parse_duration_hours(duration: &str) -> f64 {
    match duration_regex().captures(duration) {
        Some(caps) => {
            let value: f64 = caps[1].parse().unwrap_or(0.0);
            if caps[2].to_lowercase().starts_with("jour") {
                value * 8.0
            } else {
                value
            }
        }
        None => 0.0,
    }
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str, fallback: &str) {
    let key = if key.trim().is_empty() { fallback } else { key };
    *map.entry(key.to_string()).or_insert(0) += 1;
}

/// Aggregate a report set against the supplied clock.
pub fn aggregate(reports: &[ReportRecord], now: DateTime<Utc>) -> Stats {
    let mut stats = Stats::default();

    let today = now.date_naive();
    let week_ago = today - Duration::days(7);
    let month_ago = today - Duration::days(30);
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let sunday = monday + Duration::days(6);

    for report in reports {
        stats.total += 1;

        if report.status == ReportStatus::InProgress {
            stats.pending_count += 1;
        }
        if report.is_validated {
            stats.validated_count += 1;
        }

        bump(&mut stats.by_agent, &report.agent_name, "Inconnu");
        bump(&mut stats.by_client, &report.client_name, "Inconnu");
        bump(&mut stats.by_software, &report.software, "Inconnu");

        let tags = report.type_tags();
        if tags.is_empty() {
            bump(&mut stats.by_type, "Non spécifié", "Non spécifié");
        } else {
            for tag in tags {
                bump(&mut stats.by_type, tag, "Non spécifié");
            }
        }

        stats.total_hours += parse_duration_hours(&report.duration);

        if let Ok(date) = NaiveDate::parse_from_str(&report.date, "%Y-%m-%d") {
            if date >= week_ago {
                stats.week_count += 1;
            }
            if date >= month_ago {
                stats.month_count += 1;
            }
            if date >= monday && date <= sunday {
                stats.weekly[date.weekday().num_days_from_monday() as usize] += 1;
            }
        }
    }

    stats
}

/// Top `n` entries of a breakdown, highest count first (ties broken by
/// name), with the remainder collapsed into an "Autres" bucket. The shown
/// counts plus the residual always sum to the dimension total.
pub fn top_n(counts: &BTreeMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> =
        counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let total: u64 = entries.iter().map(|(_, v)| v).sum();
    let mut shown: Vec<(String, u64)> = entries.into_iter().take(n).collect();
    let shown_total: u64 = shown.iter().map(|(_, v)| v).sum();
    if shown_total < total {
        shown.push(("Autres".to_string(), total - shown_total));
    }
    shown
}

/// Percentage of `part` in `total`; zero when the total is zero.
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rapport_data::ReportInput;

    fn report(date: &str, kind: &str, status: ReportStatus, duration: &str) -> ReportRecord {
        ReportInput {
            agent_uid: "u-1".into(),
            agent_name: "Alice".into(),
            client_name: "Acme".into(),
            software: "ERP".into(),
            site: "Abidjan".into(),
            object: "Install".into(),
            date: date.into(),
            intervention_type: Some(kind.into()),
            duration: Some(duration.into()),
            status: Some(status),
            ..Default::default()
        }
        .into_record("r".into(), "2026-08-01T00:00:00Z".into())
    }

    // 2026-08-06 is a Thursday; the calendar week runs 08-03 (Mon) to 08-09 (Sun).
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 10, 0, 0).unwrap()
    }

    #[test]
    fn empty_set_is_all_zero() {
        let stats = aggregate(&[], now());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.week_count, 0);
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.total_hours, 0.0);
        assert!(stats.by_agent.is_empty());
        assert!(stats.by_type.is_empty());
        assert_eq!(stats.weekly, [0; 7]);
        assert_eq!(percentage(stats.validated_count, stats.total), 0.0);
    }

    #[test]
    fn trailing_week_window_and_histogram() {
        let reports = vec![
            report("2026-08-06", "Sur site", ReportStatus::Done, "1 heure"),
            report("2026-08-06", "Sur site", ReportStatus::Done, "1 heure"),
            report("2026-08-06", "Sur site", ReportStatus::Done, "1 heure"),
            // Last week, still inside the trailing 7 days
            report("2026-07-31", "En ligne", ReportStatus::Done, "1 heure"),
            report("2026-08-01", "En ligne", ReportStatus::Done, "1 heure"),
            // Eight days ago, outside the window
            report("2026-07-29", "En ligne", ReportStatus::Done, "1 heure"),
        ];
        let stats = aggregate(&reports, now());

        assert_eq!(stats.total, 6);
        assert_eq!(stats.week_count, 5);
        // Only the three Thursday reports fall inside the calendar week
        assert_eq!(stats.weekly, [0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn status_and_validation_counters() {
        let mut validated = report("2026-08-05", "Sur site", ReportStatus::Done, "1 heure");
        validated.is_validated = true;
        let reports = vec![
            validated,
            report("2026-08-05", "Sur site", ReportStatus::InProgress, ""),
            report("2026-08-05", "Sur site", ReportStatus::InProgress, ""),
        ];
        let stats = aggregate(&reports, now());
        assert_eq!(stats.pending_count, 2);
        assert_eq!(stats.validated_count, 1);
    }

    #[test]
    fn multi_tag_reports_increment_each_tag() {
        let reports = vec![
            report(
                "2026-08-05",
                "En ligne, Sur site",
                ReportStatus::Done,
                "1 heure",
            ),
            report("2026-08-05", "Sur site", ReportStatus::Done, "1 heure"),
        ];
        let stats = aggregate(&reports, now());
        assert_eq!(stats.by_type.get("Sur site"), Some(&2));
        assert_eq!(stats.by_type.get("En ligne"), Some(&1));
        // Two reports, three tag increments
        assert_eq!(stats.by_type.values().sum::<u64>(), 3);
    }

    #[test]
    fn duration_parsing_handles_units_and_noise() {
        assert_eq!(parse_duration_hours("2.5 heures"), 2.5);
        assert_eq!(parse_duration_hours("1 heure"), 1.0);
        assert_eq!(parse_duration_hours("2 jours"), 16.0);
        assert_eq!(parse_duration_hours("1 Jour"), 8.0);
        assert_eq!(parse_duration_hours("Non spécifié"), 0.0);
        assert_eq!(parse_duration_hours(""), 0.0);
    }

    #[test]
    fn total_hours_sums_days_as_eight_hours() {
        let reports = vec![
            report("2026-08-05", "Sur site", ReportStatus::Done, "2.5 heures"),
            report("2026-08-05", "Sur site", ReportStatus::Done, "1 jour"),
        ];
        let stats = aggregate(&reports, now());
        assert_eq!(stats.total_hours, 10.5);
    }

    #[test]
    fn top_n_residual_sums_to_total() {
        let mut counts = BTreeMap::new();
        for (name, count) in [
            ("A", 10u64),
            ("B", 8),
            ("C", 6),
            ("D", 4),
            ("E", 2),
            ("F", 1),
            ("G", 1),
        ] {
            counts.insert(name.to_string(), count);
        }
        let total: u64 = counts.values().sum();

        for n in 0..=counts.len() + 1 {
            let shown = top_n(&counts, n);
            let sum: u64 = shown.iter().map(|(_, v)| v).sum();
            assert_eq!(sum, total, "top_n({}) must preserve the total", n);
        }

        let top5 = top_n(&counts, 5);
        assert_eq!(top5.len(), 6);
        assert_eq!(top5[0], ("A".to_string(), 10));
        assert_eq!(top5.last().unwrap(), &("Autres".to_string(), 2));

        // No residual entry when everything is shown
        let all = top_n(&counts, counts.len());
        assert_eq!(all.len(), counts.len());
        assert!(all.iter().all(|(name, _)| name != "Autres"));
    }

    #[test]
    fn top_n_breaks_ties_by_name() {
        let mut counts = BTreeMap::new();
        counts.insert("Zeta".to_string(), 3u64);
        counts.insert("Alpha".to_string(), 3);
        let shown = top_n(&counts, 2);
        assert_eq!(shown[0].0, "Alpha");
        assert_eq!(shown[1].0, "Zeta");
    }

    #[test]
    fn percentage_guards_zero_total() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn unparseable_dates_skip_time_windows() {
        let reports = vec![report("not-a-date", "Sur site", ReportStatus::Done, "")];
        let stats = aggregate(&reports, now());
        assert_eq!(stats.total, 1);
        assert_eq!(stats.week_count, 0);
        assert_eq!(stats.weekly, [0; 7]);
    }
}
