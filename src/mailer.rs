use axum::async_trait;
use serde_json::json;

use crate::config::MailConfig;

/// Outbound mail seam, injected like storage so tests can swap a no-op in.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Delivers through a transactional-mail HTTP API.
pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(cfg: &MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            from: cfg.from.clone(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let resp = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("mail API returned {}", resp.status());
        }
        tracing::info!(%to, %subject, "mail sent");
        Ok(())
    }
}

/// Logs instead of sending; used when no mail API is configured and in tests.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> anyhow::Result<()> {
        tracing::info!(%to, %subject, "mail delivery skipped (no mail API configured)");
        Ok(())
    }
}
