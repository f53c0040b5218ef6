//! Invoice gateway client.
//!
//! Thin wrapper over the Xendit invoice API: create an invoice for a
//! purchase and fetch the authoritative invoice object during webhook
//! reconciliation. Both calls sit on the critical path, so transient
//! failures (network, 429, 5xx, timeouts) are retried a bounded number of
//! times with jittered backoff before surfacing a gateway error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s)
const RETRY_DELAYS: &[u64] = &[1, 2, 4];

/// Per-request timeout for gateway calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const XENDIT_API_URL: &str = "https://api.xendit.co";

/// Buyer contact details attached to the invoice so the gateway can send
/// its own payment notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCustomer {
    pub given_names: String,
    pub email: String,
    pub mobile_number: String,
}

/// A single invoice line item. `reference_id` carries the product id and is
/// how webhook reconciliation finds its way back to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub reference_id: String,
    pub name: String,
    pub price: i64,
    pub quantity: i64,
    pub category: String,
}

/// Invoice creation request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateInvoice {
    pub external_id: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub customer: InvoiceCustomer,
    pub items: Vec<InvoiceItem>,
}

/// Gateway-side invoice object. `status` is kept as the raw string; parse
/// with `InvoiceStatus::parse` (unrecognized values are handled, not
/// rejected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub external_id: String,
    pub status: String,
    pub amount: i64,
    pub invoice_url: String,
    #[serde(default)]
    pub items: Vec<InvoiceItem>,
}

/// Payment gateway operations the lifecycle engine depends on.
/// Injected as a trait object so tests can substitute a fake.
#[async_trait]
pub trait InvoiceGateway: Send + Sync {
    async fn create_invoice(&self, spec: &CreateInvoice) -> Result<Invoice>;
    async fn get_invoice(&self, id: &str) -> Result<Invoice>;
}

/// Wire request: the creation spec plus the deployment's redirect URLs.
#[derive(Serialize)]
struct CreateInvoiceBody<'a> {
    #[serde(flatten)]
    spec: &'a CreateInvoice,
    success_redirect_url: &'a str,
    failure_redirect_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct XenditClient {
    client: Client,
    base_url: String,
    api_key: String,
    success_redirect_url: String,
    failure_redirect_url: String,
}

impl XenditClient {
    pub fn new(
        api_key: String,
        success_redirect_url: String,
        failure_redirect_url: String,
    ) -> Self {
        Self::with_base_url(
            XENDIT_API_URL.to_string(),
            api_key,
            success_redirect_url,
            failure_redirect_url,
        )
    }

    /// Point the client at a different host (dev sandboxes).
    pub fn with_base_url(
        base_url: String,
        api_key: String,
        success_redirect_url: String,
        failure_redirect_url: String,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static config");
        Self {
            client,
            base_url,
            api_key,
            success_redirect_url,
            failure_redirect_url,
        }
    }

    /// Run one request attempt, classifying failures as transient or not.
    ///
    /// Returns Ok(invoice), or Err((error, is_transient)).
    async fn send_request(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
        lookup_id: Option<&str>,
    ) -> std::result::Result<Invoice, (AppError, bool)> {
        let response = build().send().await.map_err(|e| {
            if e.is_timeout() {
                (AppError::GatewayTimeout(e.to_string()), true)
            } else {
                // Network errors are transient
                (AppError::PaymentGateway(e.to_string()), true)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Invoice>().await.map_err(|e| {
                (
                    AppError::PaymentGateway(format!("Invalid gateway response: {}", e)),
                    false,
                )
            });
        }

        let body = response.text().await.unwrap_or_default();

        // A lookup miss is a business outcome, not a transport failure.
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = lookup_id {
                return Err((
                    AppError::NotFound(format!("Invoice not found with id {}", id)),
                    false,
                ));
            }
        }

        let is_transient = status.as_u16() == 429 || status.is_server_error();
        Err((
            AppError::PaymentGateway(format!("{} - {}", status, body)),
            is_transient,
        ))
    }

    /// Retry loop shared by both operations: jittered exponential backoff on
    /// transient failures, immediate surfacing otherwise.
    async fn request_with_retry(
        &self,
        operation: &'static str,
        build: impl Fn() -> reqwest::RequestBuilder,
        lookup_id: Option<&str>,
    ) -> Result<Invoice> {
        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                let jitter_ms = {
                    use rand::Rng;
                    rand::thread_rng().gen_range(0..500)
                };
                tracing::warn!(
                    attempt,
                    delay_secs,
                    operation,
                    "Retrying gateway call after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs) + Duration::from_millis(jitter_ms))
                    .await;
            }

            match self.send_request(&build, lookup_id).await {
                Ok(invoice) => {
                    if attempt > 0 {
                        tracing::info!(attempt, operation, "Gateway call succeeded after retry");
                    }
                    return Ok(invoice);
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
            operation,
            attempts = RETRY_DELAYS.len() + 1,
            "Gateway call failed after all retries"
        );
        Err(last_error
            .unwrap_or_else(|| AppError::PaymentGateway("all retries exhausted".into())))
    }
}

#[async_trait]
impl InvoiceGateway for XenditClient {
    async fn create_invoice(&self, spec: &CreateInvoice) -> Result<Invoice> {
        let url = format!("{}/v2/invoices", self.base_url);
        let body = CreateInvoiceBody {
            spec,
            success_redirect_url: &self.success_redirect_url,
            failure_redirect_url: &self.failure_redirect_url,
        };
        let payload = serde_json::to_value(&body)?;

        self.request_with_retry(
            "create_invoice",
            || {
                self.client
                    .post(&url)
                    .basic_auth(&self.api_key, None::<&str>)
                    .json(&payload)
            },
            None,
        )
        .await
    }

    async fn get_invoice(&self, id: &str) -> Result<Invoice> {
        let url = format!("{}/v2/invoices/{}", self.base_url, id);

        self.request_with_retry(
            "get_invoice",
            || self.client.get(&url).basic_auth(&self.api_key, None::<&str>),
            Some(id),
        )
        .await
    }
}
