use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use roxmltree::{Document, Node};
use tracing::debug;
use url::Url;

use super::{check_status, require_token, warn_missing_dates, MessageSource, SourceError};
use crate::record::MessageRecord;

const TYPES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/types";
const MESSAGES_NS: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";

/// Exchange Web Services transport using a `FindItem` request.
pub struct EwsSource {
    endpoint: Url,
    token: Option<String>,
    client: Client,
}

impl EwsSource {
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            token,
            client,
        })
    }
}

impl MessageSource for EwsSource {
    fn name(&self) -> &str {
        "ews"
    }

    fn fetch(&self, folder: &str, limit: usize) -> Result<Vec<MessageRecord>, SourceError> {
        let token = require_token(self.token.as_deref())?;
        let body = find_item_request(folder, limit);

        debug!(action = "request", component = "ews", endpoint = %self.endpoint, "Sending FindItem request");
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()?;
        let xml = check_status(response)?.text()?;

        parse_find_item_response(&xml, Utc::now())
    }
}

pub fn find_item_request(folder: &str, limit: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"
               xmlns:t="{types}"
               xmlns:m="{messages}">
  <soap:Header>
    <t:RequestServerVersion Version="Exchange2013"/>
  </soap:Header>
  <soap:Body>
    <m:FindItem Traversal="Shallow">
      <m:ItemShape>
        <t:BaseShape>Default</t:BaseShape>
        <t:AdditionalProperties>
          <t:FieldURI FieldURI="message:From"/>
          <t:FieldURI FieldURI="message:Sender"/>
          <t:FieldURI FieldURI="item:DateTimeReceived"/>
          <t:FieldURI FieldURI="item:Subject"/>
        </t:AdditionalProperties>
      </m:ItemShape>
      <m:IndexedPageItemView MaxEntriesReturned="{limit}" Offset="0" BasePoint="Beginning"/>
      <m:SortOrder>
        <t:FieldOrder Order="Descending">
          <t:FieldURI FieldURI="item:DateTimeReceived"/>
        </t:FieldOrder>
      </m:SortOrder>
      <m:ParentFolderIds>
        <t:DistinguishedFolderId Id="{folder}"/>
      </m:ParentFolderIds>
    </m:FindItem>
  </soap:Body>
</soap:Envelope>"#,
        types = TYPES_NS,
        messages = MESSAGES_NS,
        limit = limit,
        folder = escape_xml(folder),
    )
}

/// Parses a `FindItemResponse`; messages without a receive time get `fetched_at`.
pub fn parse_find_item_response(
    xml: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<MessageRecord>, SourceError> {
    let doc = Document::parse(xml).map_err(|e| SourceError::Parse(e.to_string()))?;

    if let Some(error) = doc.descendants().find(|n| {
        n.is_element()
            && n.tag_name().namespace() == Some(MESSAGES_NS)
            && n.attribute("ResponseClass") == Some("Error")
    }) {
        let message = child_text(error, MESSAGES_NS, "MessageText")
            .unwrap_or("unknown EWS error")
            .to_string();
        return Err(SourceError::Remote(message));
    }

    let mut records = Vec::new();
    let mut missing_dates = 0;

    for message in doc.descendants().filter(|n| n.has_tag_name((TYPES_NS, "Message"))) {
        let mailbox = child(message, "From").and_then(|from| child(from, "Mailbox"));
        let name = mailbox.and_then(|m| child_text(m, TYPES_NS, "Name"));
        let email = mailbox.and_then(|m| child_text(m, TYPES_NS, "EmailAddress"));
        let subject = child_text(message, TYPES_NS, "Subject");

        let received_at = child_text(message, TYPES_NS, "DateTimeReceived")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        if received_at.is_none() {
            missing_dates += 1;
        }

        records.push(MessageRecord::new(
            name,
            email,
            subject,
            received_at.unwrap_or(fetched_at),
        ));
    }

    warn_missing_dates("ews", missing_dates);
    Ok(records)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name((TYPES_NS, name)))
}

fn child_text<'a>(node: Node<'a, '_>, ns: &str, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name((ns, name)))
        .and_then(|n| n.text())
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_server::respond_once;
    use chrono::TimeZone;

    const RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <m:FindItemResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"
                        xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
      <m:ResponseMessages>
        <m:FindItemResponseMessage ResponseClass="Success">
          <m:ResponseCode>NoError</m:ResponseCode>
          <m:RootFolder TotalItemsInView="2" IncludesLastItemInRange="true">
            <t:Items>
              <t:Message>
                <t:Subject>Quarterly numbers</t:Subject>
                <t:DateTimeReceived>2024-04-02T10:15:00Z</t:DateTimeReceived>
                <t:From>
                  <t:Mailbox>
                    <t:Name>Dana Reyes</t:Name>
                    <t:EmailAddress>Dana.Reyes@Contoso.com</t:EmailAddress>
                  </t:Mailbox>
                </t:From>
              </t:Message>
              <t:Message>
                <t:Subject></t:Subject>
              </t:Message>
            </t:Items>
          </m:RootFolder>
        </m:FindItemResponseMessage>
      </m:ResponseMessages>
    </m:FindItemResponse>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn parses_messages() {
        let fetched_at = Utc.with_ymd_and_hms(2024, 4, 3, 0, 0, 0).unwrap();

        let records = parse_find_item_response(RESPONSE, fetched_at).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sender_name, "Dana Reyes");
        assert_eq!(records[0].sender_email, "dana.reyes@contoso.com");
        assert_eq!(records[0].subject, "Quarterly numbers");
        assert_eq!(
            records[0].received_at,
            Utc.with_ymd_and_hms(2024, 4, 2, 10, 15, 0).unwrap()
        );

        assert_eq!(records[1].sender_name, "Unknown");
        assert_eq!(records[1].sender_email, "unknown@unknown.com");
        assert_eq!(records[1].subject, "(No subject)");
        assert_eq!(records[1].received_at, fetched_at);
    }

    #[test]
    fn error_response_is_remote_error() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <m:FindItemResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages">
      <m:ResponseMessages>
        <m:FindItemResponseMessage ResponseClass="Error">
          <m:MessageText>The specified folder could not be found in the store.</m:MessageText>
          <m:ResponseCode>ErrorFolderNotFound</m:ResponseCode>
        </m:FindItemResponseMessage>
      </m:ResponseMessages>
    </m:FindItemResponse>
  </s:Body>
</s:Envelope>"#;

        let err = parse_find_item_response(xml, Utc::now()).unwrap_err();

        match err {
            SourceError::Remote(message) => assert!(message.contains("could not be found")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_xml_is_parse_error() {
        let err = parse_find_item_response("<Envelope>", Utc::now()).unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn request_escapes_folder_and_sets_limit() {
        let request = find_item_request("a<b", 50);
        assert!(request.contains(r#"MaxEntriesReturned="50""#));
        assert!(request.contains(r#"DistinguishedFolderId Id="a&lt;b""#));
    }

    #[test]
    fn forbidden_status_is_token_error() {
        let endpoint = respond_once("403 Forbidden");
        let source =
            EwsSource::new(&endpoint, Some("stale".to_string()), Duration::from_secs(5)).unwrap();

        let err = source.fetch("inbox", 10).unwrap_err();

        assert!(matches!(err, SourceError::Token(_)));
    }

    #[test]
    fn bad_gateway_status_is_http_error() {
        let endpoint = respond_once("502 Bad Gateway");
        let source =
            EwsSource::new(&endpoint, Some("token".to_string()), Duration::from_secs(5)).unwrap();

        let err = source.fetch("inbox", 10).unwrap_err();

        assert!(matches!(err, SourceError::Http(_)));
    }
}
