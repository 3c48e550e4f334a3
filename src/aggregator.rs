use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use crate::domain::sender_domain;
use crate::record::MessageRecord;
use crate::stats::{AnalysisResult, DateRange, DomainStat, SenderStat, TOP_DOMAINS};

/// Aggregates a fully materialized list of records in a single pass.
///
/// Senders and domains are sorted by descending count. Equal counts keep the
/// order in which the sender (or domain) first appeared in `records`.
pub fn analyze(records: &[MessageRecord]) -> AnalysisResult {
    let start_time = Instant::now();
    debug!(
        action = "start",
        component = "aggregator",
        record_count = records.len(),
        "Aggregating message records"
    );

    // Stats live in insertion order; the maps only hold positions into them.
    let mut senders: Vec<SenderStat> = Vec::new();
    let mut sender_index: HashMap<&str, usize> = HashMap::new();
    let mut domains: Vec<DomainStat> = Vec::new();
    let mut domain_index: HashMap<&str, usize> = HashMap::new();
    let mut date_range: Option<DateRange> = None;

    for record in records {
        let at = record.received_at;

        match sender_index.get(record.sender_email.as_str()) {
            Some(&idx) => {
                let sender = &mut senders[idx];
                sender.count += 1;
                sender.first_seen = sender.first_seen.min(at);
                sender.last_seen = sender.last_seen.max(at);
            }
            None => {
                sender_index.insert(&record.sender_email, senders.len());
                senders.push(SenderStat {
                    email: record.sender_email.clone(),
                    name: record.sender_name.clone(),
                    count: 1,
                    first_seen: at,
                    last_seen: at,
                });
            }
        }

        let domain = sender_domain(&record.sender_email);
        match domain_index.get(domain) {
            Some(&idx) => domains[idx].count += 1,
            None => {
                domain_index.insert(domain, domains.len());
                domains.push(DomainStat {
                    domain: domain.to_string(),
                    count: 1,
                });
            }
        }

        date_range = Some(match date_range {
            Some(range) => DateRange {
                oldest: range.oldest.min(at),
                newest: range.newest.max(at),
            },
            None => DateRange {
                oldest: at,
                newest: at,
            },
        });
    }

    // sort_by is stable, so ties stay in first-occurrence order
    senders.sort_by(|a, b| b.count.cmp(&a.count));
    domains.sort_by(|a, b| b.count.cmp(&a.count));

    let unique_domains = domains.len();
    domains.truncate(TOP_DOMAINS);

    let result = AnalysisResult {
        total_emails: records.len(),
        unique_senders: senders.len(),
        unique_domains,
        date_range,
        senders,
        domains,
    };

    info!(
        action = "complete",
        component = "aggregator",
        total_emails = result.total_emails,
        unique_senders = result.unique_senders,
        unique_domains = result.unique_domains,
        duration_ms = start_time.elapsed().as_millis(),
        "Aggregation completed"
    );

    result
}
