use axum::async_trait;
use serde::Deserialize;

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Seam for captcha checks; production hits Google's siteverify endpoint.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> anyhow::Result<bool>;
}

pub struct Recaptcha {
    http: reqwest::Client,
    secret: String,
}

impl Recaptcha {
    pub fn new(secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
}

#[async_trait]
impl CaptchaVerifier for Recaptcha {
    async fn verify(&self, token: &str) -> anyhow::Result<bool> {
        let resp: SiteVerifyResponse = self
            .http
            .post(SITEVERIFY_URL)
            .form(&[("secret", self.secret.as_str()), ("response", token)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp.success)
    }
}
