//! Transactional email
//!
//! Sends mail through the Resend HTTP API. When no API key is configured,
//! sending is skipped with a warning so local setups work without mail.

use std::time::Duration;

use crate::config::Config;

const RESEND_API_BASE: &str = "https://api.resend.com";

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Resend API key
    pub resend_api_key: String,
    /// From address for emails
    pub email_from: String,
    /// Base URL of the CRM frontend, used for links
    pub dashboard_url: String,
    /// Resend API base URL
    pub api_base_url: String,
}

impl EmailConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            resend_api_key: config.resend_api_key.clone(),
            email_from: config.email_from.clone(),
            dashboard_url: config.public_url.clone(),
            api_base_url: RESEND_API_BASE.to_string(),
        }
    }

    /// Check if email sending is enabled
    pub fn is_enabled(&self) -> bool {
        !self.resend_api_key.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Email transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Email provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outcome of a send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped,
}

/// Email service
#[derive(Clone)]
pub struct MailService {
    config: EmailConfig,
    client: reqwest::Client,
}

impl MailService {
    /// Create a new email service
    pub fn new(config: EmailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Check if email sending is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<Delivery, MailError> {
        if !self.config.is_enabled() {
            tracing::warn!(subject = %subject, "Email not configured, skipping");
            return Ok(Delivery::Skipped);
        }

        let body = serde_json::json!({
            "from": self.config.email_from,
            "to": [to],
            "subject": subject,
            "html": html
        });

        let resp = self
            .client
            .post(format!("{}/emails", self.config.api_base_url))
            .bearer_auth(&self.config.resend_api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to = %to, subject = %subject, "Email sent");
        Ok(Delivery::Sent)
    }

    /// Welcome mail for a freshly registered internal user
    pub async fn send_welcome_email(&self, to: &str, full_name: &str) -> Result<Delivery, MailError> {
        let name = escape_html(full_name);
        let login_link = format!("{}/login", self.config.dashboard_url);

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #f59e0b;">Willkommen bei Sternblitz</h2>
    <p>Hallo {name},</p>
    <p>dein Zugang zum Sternblitz-Vertriebsportal ist eingerichtet. Du kannst dich ab sofort mit deiner E-Mail-Adresse anmelden.</p>
    <p>
        <a href="{login_link}" style="display: inline-block; padding: 12px 24px; background-color: #f59e0b; color: white; text-decoration: none; border-radius: 6px; font-weight: bold;">
            Zum Login
        </a>
    </p>
    <hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;">
    <p style="color: #999; font-size: 12px;">Sternblitz</p>
</body>
</html>"#
        );

        self.send_email(to, "Willkommen bei Sternblitz", &html).await
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
