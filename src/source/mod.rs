//! Message sources: transports that fetch a bounded, newest-first page of
//! messages from a folder and normalize them into [`MessageRecord`]s.

pub mod ews;
pub mod mbox;
pub mod rest;
pub mod sqlite;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::record::MessageRecord;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Unavailable(String),

    #[error("authorization failed: {0}")]
    Token(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned an error: {0}")]
    Remote(String),

    #[error("malformed response: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub trait MessageSource {
    fn name(&self) -> &str;

    /// Returns at most `limit` records from `folder`, newest first.
    fn fetch(&self, folder: &str, limit: usize) -> Result<Vec<MessageRecord>, SourceError>;
}

/// Every source in a [`FetchChain`] failed (or the chain was empty).
#[derive(Debug, Error)]
#[error("{}", describe_attempts(.attempts))]
pub struct FetchError {
    pub attempts: Vec<(String, SourceError)>,
}

fn describe_attempts(attempts: &[(String, SourceError)]) -> String {
    if attempts.is_empty() {
        return "no message sources configured".to_string();
    }

    let failures: Vec<String> = attempts
        .iter()
        .map(|(name, err)| format!("{} ({})", name, err))
        .collect();
    format!("failed to fetch emails: {}", failures.join("; "))
}

#[derive(Debug)]
pub struct Fetched {
    pub source: String,
    pub records: Vec<MessageRecord>,
}

/// Ordered list of sources tried in sequence until one succeeds.
#[derive(Default)]
pub struct FetchChain {
    sources: Vec<Box<dyn MessageSource>>,
}

impl FetchChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl MessageSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn push(&mut self, source: Box<dyn MessageSource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn fetch(&self, folder: &str, limit: usize) -> Result<Fetched, FetchError> {
        let mut attempts = Vec::new();

        for source in &self.sources {
            let start_time = Instant::now();
            info!(action = "start", component = "fetch", source = source.name(), folder, limit, "Fetching messages");

            match source.fetch(folder, limit) {
                Ok(mut records) => {
                    records.truncate(limit);
                    info!(
                        action = "complete",
                        component = "fetch",
                        source = source.name(),
                        record_count = records.len(),
                        duration_ms = start_time.elapsed().as_millis(),
                        "Fetched messages"
                    );
                    return Ok(Fetched {
                        source: source.name().to_string(),
                        records,
                    });
                }
                Err(e) => {
                    warn!(action = "fallback", component = "fetch", source = source.name(), error = %e, "Message source failed");
                    attempts.push((source.name().to_string(), e));
                }
            }
        }

        Err(FetchError { attempts })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Ews,
    Rest,
    Mbox,
    Sqlite,
}

/// Settings shared by the sources, resolved from config and command line.
#[derive(Debug, Clone, Default)]
pub struct SourceSettings {
    pub token: Option<String>,
    pub timeout: Duration,
    pub workers: Option<usize>,
    pub temp_path: Option<std::path::PathBuf>,
}

pub fn build_chain(
    kinds: &[SourceKind],
    config: &Config,
    settings: &SourceSettings,
) -> Result<FetchChain> {
    let mut chain = FetchChain::new();

    for kind in kinds {
        let source: Box<dyn MessageSource> = match kind {
            SourceKind::Ews => Box::new(
                ews::EwsSource::new(&config.ews.url, settings.token.clone(), settings.timeout)
                    .context("Failed to set up EWS source")?,
            ),
            SourceKind::Rest => Box::new(
                rest::RestSource::new(&config.rest.url, settings.token.clone(), settings.timeout)
                    .context("Failed to set up REST source")?,
            ),
            SourceKind::Mbox => Box::new(mbox::MboxSource::new(
                config.mbox.path.clone(),
                settings.workers,
            )),
            SourceKind::Sqlite => Box::new(sqlite::CacheSource::new(
                config.cache.path.clone(),
                settings.temp_path.clone(),
            )),
        };
        chain.push(source);
    }

    info!(action = "configure", component = "fetch", source_count = chain.len(), "Message source chain ready");
    Ok(chain)
}

/// Bearer token check shared by the HTTP transports.
pub(crate) fn require_token(token: Option<&str>) -> Result<&str, SourceError> {
    match token {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(SourceError::Token(
            "no access token configured (use --token or INBOXEE_TOKEN)".to_string(),
        )),
    }
}

/// Maps HTTP auth rejections to token errors, other failures to transport errors.
pub(crate) fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, SourceError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SourceError::Token(format!("server rejected token ({})", status)));
    }
    Ok(response.error_for_status()?)
}

pub(crate) fn warn_missing_dates(source: &str, missing: usize) {
    if missing > 0 {
        warn!(action = "normalize", component = "fetch", source, missing_dates = missing, "Messages without a receive time use the fetch time");
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answers a single HTTP request with an empty-bodied `status` and returns
    /// the base URL to reach it.
    pub(crate) fn respond_once(status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
            stream.write_all(response.as_bytes()).unwrap();
        });

        format!("http://{}", addr)
    }

    // Drains headers and any declared body so the client never sees a reset.
    fn read_request(stream: &mut impl Read) {
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        let header_end = loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
        let body_len = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while request.len() < header_end + body_len {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct Failing(&'static str);

    impl MessageSource for Failing {
        fn name(&self) -> &str {
            self.0
        }

        fn fetch(&self, _folder: &str, _limit: usize) -> Result<Vec<MessageRecord>, SourceError> {
            Err(SourceError::Unavailable(format!("{} is down", self.0)))
        }
    }

    struct Fixed(&'static str, usize);

    impl MessageSource for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn fetch(&self, _folder: &str, _limit: usize) -> Result<Vec<MessageRecord>, SourceError> {
            let at = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
            Ok((0..self.1)
                .map(|_| MessageRecord::new(None, Some("a@x.com"), None, at))
                .collect())
        }
    }

    #[test]
    fn falls_back_in_order() {
        let chain = FetchChain::new()
            .with(Failing("ews"))
            .with(Fixed("rest", 2))
            .with(Fixed("mbox", 5));

        let fetched = chain.fetch("inbox", 10).unwrap();

        assert_eq!(fetched.source, "rest");
        assert_eq!(fetched.records.len(), 2);
    }

    #[test]
    fn empty_result_is_success() {
        let chain = FetchChain::new().with(Fixed("rest", 0)).with(Fixed("mbox", 3));

        let fetched = chain.fetch("inbox", 10).unwrap();

        assert_eq!(fetched.source, "rest");
        assert!(fetched.records.is_empty());
    }

    #[test]
    fn reports_every_failure() {
        let chain = FetchChain::new().with(Failing("ews")).with(Failing("rest"));

        let err = chain.fetch("inbox", 10).unwrap_err();

        assert_eq!(err.attempts.len(), 2);
        let message = err.to_string();
        assert!(message.contains("ews (ews is down)"));
        assert!(message.contains("rest (rest is down)"));
    }

    #[test]
    fn empty_chain_is_an_error() {
        let err = FetchChain::new().fetch("inbox", 10).unwrap_err();
        assert_eq!(err.to_string(), "no message sources configured");
    }

    #[test]
    fn truncates_to_limit() {
        let chain = FetchChain::new().with(Fixed("mbox", 8));

        let fetched = chain.fetch("inbox", 3).unwrap();

        assert_eq!(fetched.records.len(), 3);
    }

    #[test]
    fn missing_token_is_token_error() {
        assert!(matches!(require_token(None), Err(SourceError::Token(_))));
        assert!(matches!(require_token(Some("  ")), Err(SourceError::Token(_))));
        assert_eq!(require_token(Some("abc")).unwrap(), "abc");
    }
}
