use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use mailparse::{MailAddr, MailHeaderMap};
use rayon::prelude::*;
use tracing::{debug, info};

use super::{warn_missing_dates, MessageSource, SourceError};
use crate::record::MessageRecord;

/// Local mbox transport. `path` is either a single mbox file or a directory
/// holding one mbox file per folder.
pub struct MboxSource {
    path: Option<PathBuf>,
    workers: Option<usize>,
}

impl MboxSource {
    pub fn new(path: Option<PathBuf>, workers: Option<usize>) -> Self {
        Self { path, workers }
    }

    fn resolve_folder(&self, folder: &str) -> Result<PathBuf, SourceError> {
        let path = self.path.as_deref().ok_or_else(|| {
            SourceError::Unavailable("no mbox path configured (use --mbox)".to_string())
        })?;

        if !path.is_dir() {
            if !path.exists() {
                return Err(SourceError::Unavailable(format!(
                    "mbox file not found at {:?}",
                    path
                )));
            }
            return Ok(path.to_path_buf());
        }

        let wanted = [folder.to_string(), format!("{}.mbox", folder)];
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if wanted.iter().any(|w| w.eq_ignore_ascii_case(&file_name)) && entry.path().is_file() {
                return Ok(entry.path());
            }
        }

        Err(SourceError::Unavailable(format!(
            "no mbox file for folder '{}' in {:?}",
            folder, path
        )))
    }
}

impl MessageSource for MboxSource {
    fn name(&self) -> &str {
        "mbox"
    }

    fn fetch(&self, folder: &str, limit: usize) -> Result<Vec<MessageRecord>, SourceError> {
        let start_time = Instant::now();
        let mbox_path = self.resolve_folder(folder)?;
        info!(action = "load", component = "mbox", file_path = ?mbox_path, "Reading mbox file");

        let content = fs::read(&mbox_path)?;
        let messages = split_messages(&content);
        if messages.is_empty() && !content.iter().all(u8::is_ascii_whitespace) {
            return Err(SourceError::Parse(format!(
                "no mbox separator lines found in {:?}",
                mbox_path
            )));
        }
        debug!(action = "split", component = "mbox", message_count = messages.len(), "Split mbox into messages");

        let workers = self
            .workers
            .unwrap_or_else(|| std::cmp::min(num_cpus::get(), 8));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| SourceError::Unavailable(format!("failed to start worker pool: {}", e)))?;

        let fetched_at = Utc::now();
        let parsed: Vec<(MessageRecord, bool)> = pool.install(|| {
            messages
                .par_iter()
                .map(|raw| parse_message(raw, fetched_at))
                .collect()
        });

        let missing_dates = parsed.iter().filter(|(_, dated)| !dated).count();
        warn_missing_dates("mbox", missing_dates);

        let mut records: Vec<MessageRecord> = parsed.into_iter().map(|(r, _)| r).collect();
        // stable, so equal timestamps keep file order
        records.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        records.truncate(limit);

        info!(
            action = "complete",
            component = "mbox",
            worker_count = workers,
            record_count = records.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Parsed mbox messages"
        );
        Ok(records)
    }
}

/// Splits raw mbox content on `From ` separator lines, dropping the separators.
pub fn split_messages(content: &[u8]) -> Vec<&[u8]> {
    let mut messages = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    while pos < content.len() {
        let line_end = content[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i + 1)
            .unwrap_or(content.len());

        if content[pos..].starts_with(b"From ") {
            if let Some(start) = current {
                messages.push(&content[start..pos]);
            }
            current = Some(line_end);
        }
        pos = line_end;
    }

    if let Some(start) = current {
        if start < content.len() {
            messages.push(&content[start..]);
        }
    }

    messages
}

/// Parses headers of one message. The flag is false when no usable `Date` was found.
fn parse_message(raw: &[u8], fetched_at: DateTime<Utc>) -> (MessageRecord, bool) {
    let Ok((headers, _)) = mailparse::parse_headers(raw) else {
        return (MessageRecord::new(None, None, None, fetched_at), false);
    };

    let (name, email) = headers
        .get_first_value("From")
        .and_then(|from| sender_of(&from))
        .unwrap_or((None, None));
    let subject = headers.get_first_value("Subject");
    let received_at = headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));

    let record = MessageRecord::new(
        name.as_deref(),
        email.as_deref(),
        subject.as_deref(),
        received_at.unwrap_or(fetched_at),
    );
    (record, received_at.is_some())
}

fn sender_of(from: &str) -> Option<(Option<String>, Option<String>)> {
    let addrs = mailparse::addrparse(from).ok()?;
    let info = match addrs.iter().next()? {
        MailAddr::Single(info) => info.clone(),
        MailAddr::Group(group) => group.addrs.first()?.clone(),
    };
    Some((info.display_name, Some(info.addr)))
}
