//! Transaction lifecycle engine.
//!
//! Two entry points: `create_purchase` opens a transaction and its gateway
//! invoice, `process_webhook` reconciles an asynchronous gateway callback
//! onto transaction state and drives at-most-once fulfillment.
//!
//! Webhook handling never trusts the callback payload: the invoice is
//! re-fetched from the gateway and its status is the only input to the
//! state machine. Duplicate and out-of-order deliveries are expected; a
//! per-externalId lock plus conditional status updates keep fulfillment
//! from running twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

use crate::crypto::ClaimToken;
use crate::db::{queries, AppState};
use crate::email::Fulfillment;
use crate::error::{AppError, OptionExt, Result};
use crate::id;
use crate::models::{CreateTransaction, Product, Transaction, TransactionStatus, UpdateTransaction};
use crate::payments::{CreateInvoice, Invoice, InvoiceCustomer, InvoiceItem, InvoiceStatus};

/// Per-externalId async locks.
///
/// Concurrent webhook deliveries for the same invoice serialize here, so
/// the status-check / email / status-update sequence never interleaves.
/// Entries are dropped again once uncontended via `gc`.
#[derive(Default)]
pub struct SettleLocks {
    inner: StdMutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl SettleLocks {
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut map = self.inner.lock().expect("settle lock map poisoned");
            map.entry(key.to_string()).or_default().clone()
        };
        mutex.lock_owned().await
    }

    /// Drop the map entry when nobody is holding or waiting on it.
    pub fn gc(&self, key: &str) {
        let mut map = self.inner.lock().expect("settle lock map poisoned");
        if map.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
            map.remove(key);
        }
    }
}

/// Response to a successful purchase creation: where to send the buyer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub invoice_url: String,
}

/// Gateway webhook body. Only the invoice id is read; everything else the
/// gateway sends is ignored in favor of the fetched invoice.
#[derive(Debug, Deserialize)]
pub struct WebhookCallback {
    pub id: String,
}

/// Acknowledgement returned to the gateway.
#[derive(Debug, Serialize)]
pub struct WebhookReply {
    pub status: &'static str,
    pub message: &'static str,
}

/// Create a transaction and its gateway invoice.
///
/// The PENDING row is persisted before the gateway call; if invoice
/// creation fails the row stays behind without an external id (accepted,
/// see DESIGN.md) and the gateway error surfaces to the buyer.
pub async fn create_purchase(
    state: &AppState,
    request: CreateTransaction,
) -> Result<PurchaseReceipt> {
    request.validate()?;

    let (transaction, product) = {
        let conn = state.db.get()?;
        let product = queries::get_product_by_id(&conn, request.product_id)?.or_not_found(
            format!("Product not found with id {}", request.product_id),
        )?;
        let transaction = queries::create_transaction(&conn, &request)?;
        (transaction, product)
    };

    let spec = CreateInvoice {
        external_id: id::gen_external_id(transaction.id),
        amount: product.discount_price,
        currency: "IDR".to_string(),
        description: format!("Invoice of {} payment", product.title),
        customer: InvoiceCustomer {
            given_names: transaction.name.clone(),
            email: transaction.email.clone(),
            mobile_number: transaction.phone.clone(),
        },
        items: vec![InvoiceItem {
            reference_id: product.id.to_string(),
            name: product.title.clone(),
            price: product.discount_price,
            quantity: 1,
            category: "Ebook".to_string(),
        }],
    };

    let invoice = state.gateway.create_invoice(&spec).await?;

    {
        let conn = state.db.get()?;
        queries::update_transaction(
            &conn,
            transaction.id,
            &UpdateTransaction {
                external_id: Some(invoice.external_id.clone()),
                invoice_id: Some(invoice.id.clone()),
                invoice_url: Some(invoice.invoice_url.clone()),
                ..Default::default()
            },
        )?;
    }

    tracing::info!(
        transaction_id = transaction.id,
        external_id = %invoice.external_id,
        invoice_id = %invoice.id,
        "Invoice created for purchase"
    );

    Ok(PurchaseReceipt {
        invoice_url: invoice.invoice_url,
    })
}

/// Process a gateway webhook callback.
///
/// The shared-secret check happens before any external call or database
/// access: a missing token is 401, a mismatch 400. The compare is
/// constant-time.
pub async fn process_webhook(
    state: &AppState,
    token: Option<&str>,
    callback: &WebhookCallback,
) -> Result<WebhookReply> {
    let provided = token.ok_or(AppError::Unauthorized)?;
    if !bool::from(
        provided
            .as_bytes()
            .ct_eq(state.callback_token.as_bytes()),
    ) {
        return Err(AppError::Forbidden("Token invalid".into()));
    }

    // Authoritative status lives on the gateway, not in the callback body.
    let invoice = state.gateway.get_invoice(&callback.id).await?;

    let item = invoice
        .items
        .first()
        .or_not_found("Invoice has no line items")?;
    let product_id: i64 = item.reference_id.parse().map_err(|_| {
        AppError::NotFound(format!(
            "Product not found with reference {}",
            item.reference_id
        ))
    })?;

    let (product, transaction) = {
        let conn = state.db.get()?;
        let product = queries::get_product_by_id(&conn, product_id)?
            .or_not_found(format!("Product not found with id {}", product_id))?;
        let transaction = queries::get_transaction_by_external_id(&conn, &invoice.external_id)?
            .or_not_found(format!(
                "Transaction not found with externalId {}",
                invoice.external_id
            ))?;
        (product, transaction)
    };

    match InvoiceStatus::parse(&invoice.status) {
        InvoiceStatus::Paid => {
            let reply = WebhookReply {
                status: "PAID",
                message: "Payment success",
            };
            fulfill(state, &invoice, &transaction, &product, reply).await
        }
        InvoiceStatus::Settled => {
            let reply = WebhookReply {
                status: "SETTLED",
                message: "Payment already processed",
            };
            fulfill(state, &invoice, &transaction, &product, reply).await
        }
        InvoiceStatus::Pending => Ok(WebhookReply {
            status: "PENDING",
            message: "Payment on process [PENDING]",
        }),
        InvoiceStatus::Expired => {
            let guard = state.settle_locks.lock(&invoice.external_id).await;
            let result = state
                .db
                .get()
                .map_err(AppError::from)
                .and_then(|conn| queries::try_fail_transaction(&conn, &invoice.external_id));
            drop(guard);
            state.settle_locks.gc(&invoice.external_id);

            if result? {
                tracing::info!(external_id = %invoice.external_id, "Transaction failed: invoice expired");
            }
            // Expiry is reported, not silently acknowledged; the terminal
            // state never regresses on re-delivery.
            Err(AppError::PaymentExpired)
        }
        InvoiceStatus::Unknown => Err(AppError::UnknownStatus(invoice.status.clone())),
    }
}

/// Idempotently ensure fulfillment for a paid invoice.
///
/// Commit order is email first, status second: if the email fails the row
/// stays PENDING and the gateway's retry re-drives the whole sequence. The
/// per-externalId lock makes the re-read below trustworthy under
/// concurrent deliveries.
async fn fulfill(
    state: &AppState,
    invoice: &Invoice,
    transaction: &Transaction,
    product: &Product,
    reply: WebhookReply,
) -> Result<WebhookReply> {
    let guard = state.settle_locks.lock(&invoice.external_id).await;
    let result = fulfill_locked(state, invoice, transaction, product, reply).await;
    drop(guard);
    state.settle_locks.gc(&invoice.external_id);
    result
}

async fn fulfill_locked(
    state: &AppState,
    invoice: &Invoice,
    transaction: &Transaction,
    product: &Product,
    reply: WebhookReply,
) -> Result<WebhookReply> {
    // Re-read under the lock: an earlier delivery may have settled already.
    let current = {
        let conn = state.db.get()?;
        queries::get_transaction_by_external_id(&conn, &invoice.external_id)?.or_not_found(
            format!("Transaction not found with externalId {}", invoice.external_id),
        )?
    };

    match current.status {
        TransactionStatus::Settled => {
            // Already fulfilled: acknowledge without resending the email.
            tracing::debug!(
                external_id = %invoice.external_id,
                "Duplicate webhook for settled transaction, skipping fulfillment"
            );
            return Ok(reply);
        }
        TransactionStatus::Failed => {
            tracing::warn!(
                external_id = %invoice.external_id,
                invoice_status = %invoice.status,
                "Paid invoice for a FAILED transaction, leaving terminal state untouched"
            );
            return Ok(reply);
        }
        TransactionStatus::Pending => {}
    }

    let token = state
        .claim_key
        .seal_claim(&ClaimToken { product_id: product.id })?;
    let fulfillment = Fulfillment {
        buyer: transaction.name.clone(),
        to_email: transaction.email.clone(),
        product: product.title.clone(),
        image_url: format!("{}/static/{}", state.server_origin, product.image),
        claim_link: format!("{}/claim/{}", state.frontend_origin, token),
    };

    let message_id = state.mailer.send_fulfillment(&fulfillment).await?;

    let settled = {
        let conn = state.db.get()?;
        queries::try_settle_transaction(&conn, &invoice.external_id)?
    };
    if settled {
        tracing::info!(
            external_id = %invoice.external_id,
            message_id = %message_id,
            "Transaction settled and fulfillment email sent"
        );
    } else {
        // Unreachable while the lock is held; logged in case of manual edits.
        tracing::warn!(
            external_id = %invoice.external_id,
            "Transaction was no longer PENDING at settle time"
        );
    }

    Ok(reply)
}
