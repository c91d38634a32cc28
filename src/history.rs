use chrono::{DateTime, Utc};

use crate::models::ApplicationRecord;

/// Display class for an application status. The same classification drives
/// the batch result table, the history list, the TUI colors and local stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Positive,
    Negative,
    Warning,
    Neutral,
}

/// The backend reports lowercase statuses (`success`, `failed`,
/// `in_progress`); older history entries carry display-cased ones
/// (`Applied`, `Failed`, `Error`, `In Progress`). Both spellings classify
/// the same; anything else is legacy/unknown data.
pub fn classify(status: &str) -> StatusClass {
    match status {
        "success" | "Applied" => StatusClass::Positive,
        "failed" | "Failed" | "error" | "Error" => StatusClass::Negative,
        "in_progress" | "In Progress" => StatusClass::Warning,
        _ => StatusClass::Neutral,
    }
}

pub fn status_text(status: &str) -> &'static str {
    match classify(status) {
        StatusClass::Positive => "Success",
        StatusClass::Negative => "Failed",
        StatusClass::Warning => "In Progress",
        StatusClass::Neutral => "Unknown",
    }
}

fn applied_ts(record: &ApplicationRecord) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&record.applied_at)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Newest first. Done once at load; filtering never reorders. Entries with
/// unparseable timestamps sink to the end.
pub fn sort_newest_first(records: &mut [ApplicationRecord]) {
    records.sort_by(|a, b| applied_ts(b).cmp(&applied_ts(a)));
}

/// Pure view over the stored sequence: case-insensitive substring match on
/// company/title/url, exact status match or "All". Stable.
pub fn filter<'a>(
    records: &'a [ApplicationRecord],
    search: &str,
    status: &str,
) -> Vec<&'a ApplicationRecord> {
    let needle = search.trim().to_lowercase();
    records
        .iter()
        .filter(|record| {
            needle.is_empty()
                || record.company_name.to_lowercase().contains(&needle)
                || record.job_title.to_lowercase().contains(&needle)
                || record.job_url.to_lowercase().contains(&needle)
        })
        .filter(|record| status.is_empty() || status == "All" || record.status == status)
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub in_progress: usize,
}

pub fn stats(records: &[ApplicationRecord]) -> HistoryStats {
    let mut stats = HistoryStats {
        total: records.len(),
        ..Default::default()
    };
    for record in records {
        match classify(&record.status) {
            StatusClass::Positive => stats.applied += 1,
            StatusClass::Negative => stats.failed += 1,
            StatusClass::Warning => stats.in_progress += 1,
            StatusClass::Neutral => {}
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(company: &str, title: &str, url: &str, status: &str) -> ApplicationRecord {
        serde_json::from_str(&format!(
            r#"{{"id": 1, "company_name": "{}", "job_title": "{}", "job_url": "{}", "status": "{}"}}"#,
            company, title, url, status
        ))
        .unwrap()
    }

    fn sample() -> Vec<ApplicationRecord> {
        vec![
            record("Acme", "Engineer", "https://acme.example.com/1", "Applied"),
            record("Globex", "Developer", "https://globex.example.com/2", "Failed"),
        ]
    }

    #[test]
    fn test_filter_by_text_is_case_insensitive() {
        let records = sample();
        let filtered = filter(&records, "acme", "All");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].company_name, "Acme");
    }

    #[test]
    fn test_filter_by_status_is_exact() {
        let records = sample();
        let filtered = filter(&records, "", "Failed");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].company_name, "Globex");
    }

    #[test]
    fn test_filter_combination_with_no_overlap_is_empty() {
        let records = sample();
        assert!(filter(&records, "acme", "Failed").is_empty());
    }

    #[test]
    fn test_filter_matches_title_and_url() {
        let records = sample();
        assert_eq!(filter(&records, "DEVELOPER", "All").len(), 1);
        assert_eq!(filter(&records, "globex.example", "All").len(), 1);
    }

    #[test]
    fn test_filter_preserves_order() {
        let mut records = sample();
        records.push(record("Acme", "Manager", "https://acme.example.com/3", "Failed"));

        let filtered = filter(&records, "acme", "All");
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].job_title, "Engineer");
        assert_eq!(filtered[1].job_title, "Manager");
    }

    #[test]
    fn test_sort_newest_first() {
        let mut records = sample();
        records[0].applied_at = "2026-08-01T10:00:00+00:00".to_string();
        records[1].applied_at = "2026-08-15T10:00:00+00:00".to_string();
        records.push(record("Initech", "Analyst", "https://c.com/3", "Applied"));
        records[2].applied_at = "not a date".to_string();

        sort_newest_first(&mut records);
        assert_eq!(records[0].company_name, "Globex");
        assert_eq!(records[1].company_name, "Acme");
        assert_eq!(records[2].company_name, "Initech");
    }

    #[test]
    fn test_classify_both_spellings() {
        assert_eq!(classify("success"), StatusClass::Positive);
        assert_eq!(classify("Applied"), StatusClass::Positive);
        assert_eq!(classify("failed"), StatusClass::Negative);
        assert_eq!(classify("Failed"), StatusClass::Negative);
        assert_eq!(classify("Error"), StatusClass::Negative);
        assert_eq!(classify("in_progress"), StatusClass::Warning);
        assert_eq!(classify("In Progress"), StatusClass::Warning);
        assert_eq!(classify("something-else"), StatusClass::Neutral);
        assert_eq!(classify(""), StatusClass::Neutral);
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text("success"), "Success");
        assert_eq!(status_text("failed"), "Failed");
        assert_eq!(status_text("In Progress"), "In Progress");
        assert_eq!(status_text("legacy"), "Unknown");
    }

    #[test]
    fn test_stats_counts_by_classification() {
        let mut records = sample();
        records.push(record("Initech", "Analyst", "https://c.com/3", "in_progress"));
        records.push(record("Umbrella", "Intern", "https://d.com/4", "mystery"));

        let stats = stats(&records);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.in_progress, 1);
    }
}
