use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};
use url::Url;

use crate::alert::AlertMessage;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound channel for position alerts.
pub trait Notifier {
    fn send(&self, message: &AlertMessage) -> impl Future<Output = Result<()>>;
}

/// Emit an alert as a single JSON line to stdout.
pub fn report_event(message: &AlertMessage) {
    if let Ok(json) = serde_json::to_string(message) {
        println!("{json}");
    }
}

/// Posts alerts to a Discord-compatible webhook.
///
/// Without a URL, alerts are written to stdout instead and sending always succeeds.
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Option<Url>,
}

impl WebhookNotifier {
    pub fn new(url: Option<&str>) -> Result<Self> {
        let url = url
            .map(|u| Url::parse(u).with_context(|| format!("invalid webhook URL: {u}")))
            .transpose()?;
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, url })
    }

    pub fn is_active(&self) -> bool {
        self.url.is_some()
    }
}

impl Notifier for WebhookNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<()> {
        let Some(url) = &self.url else {
            info!("No webhook configured, writing alert to stdout");
            report_event(message);
            return Ok(());
        };

        let resp = self
            .http
            .post(url.clone())
            .json(message)
            .send()
            .await
            .context("webhook request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            bail!("webhook returned {status}: {preview}");
        }
        debug!("Webhook accepted alert ({status})");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_url() {
        assert!(WebhookNotifier::new(Some("not a url")).is_err());
    }

    #[test]
    fn inactive_without_url() {
        assert!(!WebhookNotifier::new(None).unwrap().is_active());
        assert!(
            WebhookNotifier::new(Some("https://discord.com/api/webhooks/1/abc"))
                .unwrap()
                .is_active()
        );
    }

    #[tokio::test]
    async fn send_without_url_is_noop() {
        let notifier = WebhookNotifier::new(None).unwrap();
        let msg = AlertMessage {
            username: "test".to_string(),
            embeds: vec![],
        };
        assert!(notifier.send(&msg).await.is_ok());
    }
}
