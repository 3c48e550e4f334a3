use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of domains kept in [`AnalysisResult::domains`].
pub const TOP_DOMAINS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderStat {
    pub email: String,
    pub name: String,
    pub count: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainStat {
    pub domain: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub oldest: DateTime<Utc>,
    pub newest: DateTime<Utc>,
}

impl DateRange {
    /// Whole days between oldest and newest, rounded up.
    pub fn span_days(&self) -> i64 {
        let span = self.newest - self.oldest;
        let days = span.num_days();
        if span > chrono::Duration::days(days) {
            days + 1
        } else {
            days
        }
    }

    pub fn span_label(&self) -> String {
        match self.span_days() {
            0 => "today".to_string(),
            1 => "1 day".to_string(),
            days => format!("{} days", days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub total_emails: usize,
    pub unique_senders: usize,
    /// Distinct domains before `domains` is truncated.
    pub unique_domains: usize,
    /// `None` when no records were analyzed.
    pub date_range: Option<DateRange>,
    pub senders: Vec<SenderStat>,
    pub domains: Vec<DomainStat>,
}

impl AnalysisResult {
    pub fn is_empty(&self) -> bool {
        self.total_emails == 0
    }
}
