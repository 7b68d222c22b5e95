use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// The provider accepts at most this many messages per request.
const BATCH_SIZE: usize = 100;

/// Client for an Expo-style push API (`POST {api_url}/push/send`).
pub struct PushClient {
    client: Client,
    api_url: String,
    access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<&'static str>,
    pub badge: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Set on badge-only updates so iOS wakes the app without an alert.
    #[serde(rename = "_contentAvailable", skip_serializing_if = "std::ops::Not::not")]
    pub content_available: bool,
}

impl PushMessage {
    pub fn alert(to: String, title: &str, body: &str, badge: u32, link: Option<&str>) -> Self {
        Self {
            to,
            title: Some(title.to_string()),
            body: Some(body.to_string()),
            sound: Some("default"),
            badge,
            data: link.map(|link| serde_json::json!({ "link": link })),
            content_available: false,
        }
    }

    pub fn badge_only(to: String, badge: u32) -> Self {
        Self {
            to,
            title: None,
            body: None,
            sound: None,
            badge,
            data: None,
            content_available: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    data: Vec<Ticket>,
}

#[derive(Debug, Deserialize)]
struct Ticket {
    status: String,
    #[serde(default)]
    details: Option<TicketDetails>,
}

#[derive(Debug, Deserialize)]
struct TicketDetails {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PushReport {
    pub delivered: usize,
    /// Tokens the provider says no longer belong to an installed app.
    pub unregistered: Vec<String>,
}

impl PushClient {
    pub fn new(api_url: &str, access_token: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    pub async fn send(&self, messages: &[PushMessage]) -> Result<PushReport> {
        let mut report = PushReport::default();
        for batch in messages.chunks(BATCH_SIZE) {
            let mut request = self
                .client
                .post(format!("{}/push/send", self.api_url))
                .json(batch);
            if let Some(token) = &self.access_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.context("push request failed")?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("push provider returned {}: {}", status, body);
            }

            let parsed: SendResponse = response.json().await.context("invalid push response")?;
            merge_tickets(&mut report, batch, &parsed.data);
        }
        Ok(report)
    }
}

/// Tickets come back in the same order as the messages sent.
fn merge_tickets(report: &mut PushReport, batch: &[PushMessage], tickets: &[Ticket]) {
    for (message, ticket) in batch.iter().zip(tickets) {
        if ticket.status == "ok" {
            report.delivered += 1;
            continue;
        }
        let unregistered = ticket
            .details
            .as_ref()
            .and_then(|d| d.error.as_deref())
            .is_some_and(|e| e == "DeviceNotRegistered");
        if unregistered && !report.unregistered.contains(&message.to) {
            report.unregistered.push(message.to.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_tokens_are_reported() {
        let batch = vec![
            PushMessage::badge_only("ExponentPushToken[a]".into(), 1),
            PushMessage::badge_only("ExponentPushToken[b]".into(), 1),
            PushMessage::badge_only("ExponentPushToken[c]".into(), 1),
        ];
        let response: SendResponse = serde_json::from_str(
            r#"{"data":[
                {"status":"ok","id":"1"},
                {"status":"error","message":"gone","details":{"error":"DeviceNotRegistered"}},
                {"status":"error","message":"slow down","details":{"error":"MessageRateExceeded"}}
            ]}"#,
        )
        .unwrap();

        let mut report = PushReport::default();
        merge_tickets(&mut report, &batch, &response.data);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.unregistered, vec!["ExponentPushToken[b]".to_string()]);
    }

    #[test]
    fn badge_updates_are_silent() {
        let json = serde_json::to_value(PushMessage::badge_only("tok".into(), 3)).unwrap();
        assert_eq!(json["badge"], 3);
        assert_eq!(json["_contentAvailable"], true);
        assert!(json.get("title").is_none());

        let alert = serde_json::to_value(PushMessage::alert("tok".into(), "Hi", "There", 1, Some("/events/1"))).unwrap();
        assert!(alert.get("_contentAvailable").is_none());
        assert_eq!(alert["data"]["link"], "/events/1");
    }
}
