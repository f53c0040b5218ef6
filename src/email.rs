//! Fulfillment email delivery.
//!
//! Sends the post-payment email (product, cover image, claim link) through
//! the Resend API. Transient transport failures (network, 5xx, 429) are
//! retried with exponential backoff; anything left over surfaces as a
//! notification error so the caller can decide what the gateway retry
//! should re-drive.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Everything the fulfillment email needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfillment {
    pub buyer: String,
    pub to_email: String,
    /// Product title
    pub product: String,
    /// Absolute URL of the product cover image
    pub image_url: String,
    /// Claim link carrying the encrypted download token
    pub claim_link: String,
}

/// Outbound mail transport for fulfillment notifications.
/// Injected as a trait object so tests can substitute a fake.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the fulfillment email, returning the transport's message id.
    async fn send_fulfillment(&self, fulfillment: &Fulfillment) -> Result<String>;
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    id: String,
}

/// Email service using the Resend API.
#[derive(Clone)]
pub struct EmailService {
    api_key: String,
    from_email: String,
    subject: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: String, from_email: String, subject: String) -> Self {
        Self {
            api_key,
            from_email,
            subject,
            http_client: Client::new(),
        }
    }

    fn render_text(fulfillment: &Fulfillment) -> String {
        format!(
            "Hi {},\n\nThanks for your purchase! Your copy of {} is ready.\n\nDownload it here:\n{}\n\nKeep this link - you can re-download your e-book with it anytime.\n\nIf you didn't make this purchase, please contact support.",
            fulfillment.buyer, fulfillment.product, fulfillment.claim_link
        )
    }

    fn render_html(fulfillment: &Fulfillment) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Thanks for your purchase, {}!</h2>
<p>Your copy of <strong>{}</strong> is ready.</p>
<div style="text-align: center; margin: 24px 0;">
<img src="{}" alt="{}" style="max-width: 240px; border-radius: 8px;">
</div>
<div style="text-align: center; margin-bottom: 24px;">
<a href="{}" style="background: #1a73e8; color: #fff; padding: 12px 28px; border-radius: 8px; text-decoration: none; font-weight: bold;">Download your e-book</a>
</div>
<p style="color: #666;">Keep this link - you can re-download your e-book with it anytime.</p>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">If you didn't make this purchase, please contact support.</p>
</body>
</html>"#,
            fulfillment.buyer,
            fulfillment.product,
            fulfillment.image_url,
            fulfillment.product,
            fulfillment.claim_link
        )
    }

    /// Send a single request to the Resend API.
    ///
    /// Returns the message id, or Err((error, is_transient)) on failure.
    async fn send_resend_request(
        &self,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<String, (AppError, bool)> {
        let response = self
            .http_client
            .post(RESEND_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                // Network errors are transient
                (AppError::Notification(e.to_string()), true)
            })?;

        let status = response.status();

        if status.is_success() {
            let result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                (AppError::Notification("invalid transport response".into()), false)
            })?;
            Ok(result.id)
        } else {
            let body = response.text().await.unwrap_or_default();
            let is_transient = status.as_u16() == 429 || status.is_server_error();

            if is_transient {
                tracing::warn!(status = %status, body = %body, "Resend API returned transient error");
            } else {
                tracing::error!(status = %status, body = %body, "Resend API returned non-transient error");
            }

            Err((
                AppError::Notification(format!("{} - {}", status, body)),
                is_transient,
            ))
        }
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send_fulfillment(&self, fulfillment: &Fulfillment) -> Result<String> {
        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![fulfillment.to_email.as_str()],
            subject: &self.subject,
            text: Self::render_text(fulfillment),
            html: Self::render_html(fulfillment),
        };

        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tracing::warn!(
                    attempt,
                    delay_secs,
                    "Retrying fulfillment email after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(&request).await {
                Ok(message_id) => {
                    tracing::info!(
                        to = %fulfillment.to_email,
                        message_id = %message_id,
                        "Fulfillment email sent"
                    );
                    return Ok(message_id);
                }
                Err((error, is_transient)) => {
                    if !is_transient {
                        return Err(error);
                    }
                    last_error = Some(error);
                }
            }
        }

        tracing::error!(
            to = %fulfillment.to_email,
            attempts = RETRY_DELAYS.len() + 1,
            "Fulfillment email failed after all retries"
        );
        Err(last_error
            .unwrap_or_else(|| AppError::Notification("all retries exhausted".into())))
    }
}
