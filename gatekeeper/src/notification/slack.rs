use anyhow::Context;
use serde::Serialize;

use crate::models::AccessCode;

/// Tells administrators a new access code is waiting for them.
#[derive(Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn send_access_request(
        &self,
        code: &AccessCode,
        created_at: &chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<()> {
        let url = match &self.webhook_url {
            Some(u) => u,
            None => {
                tracing::debug!("No Slack webhook URL configured, skipping notification");
                return Ok(());
            }
        };

        let message = SlackMessage {
            text: format!(
                "*Access request pending*\n\nCode: `{}`\nRequested: {}\n\nSet its status to `approved` in `access_requests` to let them in.",
                code,
                created_at.to_rfc3339()
            ),
        };

        let resp = self
            .client
            .post(url)
            .json(&message)
            .send()
            .await
            .context("failed to send slack notification")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("slack returned error: status={}, body={}", status, body);
        }

        tracing::info!("Sent Slack notification for access code {}", code);
        Ok(())
    }
}

#[derive(Serialize)]
struct SlackMessage {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_unconfigured_notifier_is_noop() {
        let notifier = SlackNotifier::new(None);
        assert!(!notifier.is_configured());
        notifier
            .send_access_request(&AccessCode::new("40231"), &chrono::Utc::now())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_message_mentions_code() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = SlackNotifier::new(Some(format!("{}/hook", mock_server.uri())));
        notifier
            .send_access_request(&AccessCode::new("40231"), &chrono::Utc::now())
            .await
            .unwrap();

        let received = mock_server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body["text"].as_str().unwrap().contains("`40231`"));
    }

    #[tokio::test]
    async fn test_webhook_error_is_reported() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("no_service"))
            .mount(&mock_server)
            .await;

        let notifier = SlackNotifier::new(Some(mock_server.uri()));
        let err = notifier
            .send_access_request(&AccessCode::new("40231"), &chrono::Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no_service"));
    }
}
