use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Serialize;

/// Client for a Resend-style transactional email API
/// (`POST {api_url}/emails` with a bearer key).
pub struct Mailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

impl Mailer {
    pub fn new(api_url: &str, api_key: String, from: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            from,
        })
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/emails", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&SendEmail {
                from: &self.from,
                to: [to],
                subject,
                text,
            })
            .send()
            .await
            .context("email request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("email provider returned {}: {}", status, body);
        }
        Ok(())
    }
}
