use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{check_status, require_token, warn_missing_dates, MessageSource, SourceError};
use crate::record::MessageRecord;

/// Outlook REST (v2.0) transport.
pub struct RestSource {
    base: Url,
    token: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    value: Vec<RestMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestMessage {
    from: Option<Recipient>,
    subject: Option<String>,
    received_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Recipient {
    email_address: Option<EmailAddress>,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    name: Option<String>,
    address: Option<String>,
}

impl RestSource {
    pub fn new(base: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base,
            token,
            client,
        })
    }

    pub fn messages_url(&self, folder: &str, limit: usize) -> Result<Url, SourceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Unavailable(format!("invalid REST base URL: {}", self.base)))?
            .pop_if_empty()
            .extend(["v2.0", "me", "mailfolders", folder, "messages"]);
        url.query_pairs_mut()
            .append_pair("$top", &limit.to_string())
            .append_pair("$select", "from,subject,receivedDateTime")
            .append_pair("$orderby", "receivedDateTime desc");
        Ok(url)
    }
}

impl MessageSource for RestSource {
    fn name(&self) -> &str {
        "rest"
    }

    fn fetch(&self, folder: &str, limit: usize) -> Result<Vec<MessageRecord>, SourceError> {
        let token = require_token(self.token.as_deref())?;
        let url = self.messages_url(folder, limit)?;

        debug!(action = "request", component = "rest", url = %url, "Requesting messages");
        let response = self.client.get(url).bearer_auth(token).send()?;
        let body = check_status(response)?.text()?;

        parse_messages(&body, Utc::now())
    }
}

/// Parses a REST message page; messages without a receive time get `fetched_at`.
pub fn parse_messages(body: &str, fetched_at: DateTime<Utc>) -> Result<Vec<MessageRecord>, SourceError> {
    let page: MessagePage =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    let missing_dates = page
        .value
        .iter()
        .filter(|m| m.received_date_time.is_none())
        .count();
    warn_missing_dates("rest", missing_dates);

    let records = page
        .value
        .into_iter()
        .map(|msg| {
            let sender = msg.from.and_then(|f| f.email_address);
            let (name, address) = match &sender {
                Some(e) => (e.name.as_deref(), e.address.as_deref()),
                None => (None, None),
            };
            MessageRecord::new(
                name,
                address,
                msg.subject.as_deref(),
                msg.received_date_time.unwrap_or(fetched_at),
            )
        })
        .collect();

    Ok(records)
}
